//! End-to-end scenarios driving the public
//! `EventFilter`/`LoadScheduler`/`RegexRegistry` API the way a real agent
//! would, rather than poking at internals.

use std::sync::Arc;
use std::time::Duration;

use sichek_core::{EventFilter, EventRule, Level, LoadScheduler, RegexRegistry};

fn cycling_13_line_file(path: &std::path::Path) {
    // "test0".."test9" then wraps to "test0","test1","test2" — 13 lines, 6
    // bytes each ("testN\n"), so every byte offset below is exact.
    let mut content = String::new();
    for i in 0..13 {
        content.push_str(&format!("test{}\n", i % 10));
    }
    std::fs::write(path, content).unwrap();
}

fn rule(name: &str, needle: &str, path: &std::path::Path) -> EventRule {
    EventRule {
        name: name.into(),
        regexp_source: needle.into(),
        log_files: path.display().to_string(),
        level: Level::Warning,
        description: String::new(),
        suggestion: String::new(),
    }
}

fn fired_checker_names(path: &std::path::Path, rules: Vec<EventRule>, skip_percent: i32) -> Vec<String> {
    let registry = RegexRegistry::new();
    let scheduler = LoadScheduler::new();
    let loader = scheduler.get_or_create_loader(path, 100, skip_percent).unwrap();
    loader.load().unwrap();
    let mut filter = EventFilter::new("scenario", None, rules, &registry, scheduler, 100, skip_percent).unwrap();
    let result = filter.check().unwrap();
    let mut names: Vec<String> = result.checkers.into_iter().map(|c| c.name).collect();
    names.sort();
    names
}

#[test]
fn skip_percent_10_matches_only_test2() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cycling.log");
    cycling_13_line_file(&path);

    let rules = vec![
        rule("test2", "test2", &path),
        rule("test10", "test10", &path),
    ];
    assert_eq!(fired_checker_names(&path, rules, 10), vec!["test2".to_string()]);
}

#[test]
fn skip_percent_60_matches_only_test9() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cycling.log");
    cycling_13_line_file(&path);

    let rules = vec![rule("test4", "test4", &path), rule("test9", "test9", &path)];
    assert_eq!(fired_checker_names(&path, rules, 60), vec!["test9".to_string()]);
}

#[test]
fn skip_percent_10_multi_rule_matches_test2_and_test9() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cycling.log");
    cycling_13_line_file(&path);

    let rules = vec![rule("test2", "test2", &path), rule("test9", "test9", &path)];
    assert_eq!(
        fired_checker_names(&path, rules, 10),
        vec!["test2".to_string(), "test9".to_string()]
    );
}

#[test]
fn rotation_reports_only_post_rotation_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rotating.log");
    std::fs::write(&path, "error: a\nerror: b\nerror: c\nerror: d\nerror: e\n").unwrap();

    let registry = RegexRegistry::new();
    let scheduler = LoadScheduler::new();
    let loader = scheduler.get_or_create_loader(&path, 100, 0).unwrap();
    loader.load().unwrap();
    let rules = vec![rule("ErrLine", "error:", &path)];
    let mut filter = EventFilter::new("rot", None, rules, &registry, scheduler, 100, 0).unwrap();

    let first = filter.check().unwrap();
    assert_eq!(first.checkers[0].curr, "5");

    // Replace the file with a new inode and two different matching lines.
    std::fs::remove_file(&path).unwrap();
    std::fs::write(&path, "error: x\nerror: y\n").unwrap();
    loader.load().unwrap();

    let second = filter.check().unwrap();
    assert_eq!(second.checkers.len(), 1);
    assert_eq!(second.checkers[0].curr, "2");
    assert!(second.checkers[0].detail.contains("error: x"));
    assert!(second.checkers[0].detail.contains("error: y"));
    assert!(!second.checkers[0].detail.contains("error: a"));
}

#[tokio::test(flavor = "multi_thread")]
async fn continuous_growth_under_the_load_scheduler() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("growing.log");
    std::fs::write(&path, "").unwrap();

    let registry = RegexRegistry::new();
    let scheduler = LoadScheduler::new();
    scheduler.set_interval(Duration::from_millis(20)).unwrap();
    scheduler.start();

    let rules = vec![rule("Growing", "boom", &path)];
    let mut filter = EventFilter::new("grow", None, rules, &registry, scheduler.clone(), 100, 0).unwrap();

    let mut last_curr = 0u32;
    for i in 0..3 {
        {
            let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
            use std::io::Write;
            writeln!(f, "boom {i}").unwrap();
        }
        tokio::time::sleep(Duration::from_millis(60)).await;

        let result = filter.check().unwrap();
        if let Some(checker) = result.checkers.first() {
            let curr: u32 = checker.curr.parse().unwrap();
            assert!(curr > last_curr, "curr must strictly increase: {curr} vs {last_curr}");
            last_curr = curr;
        }
    }
    assert!(last_curr > 0, "expected at least one matching cycle");

    scheduler.stop().await;
}
