//! Event Filter: binds a set of regex rules to one or more `FileLoader`s;
//! on demand, consumes all new lines since its last cursor, classifies
//! matches into checker results, and aggregates them into a single
//! `CheckResult`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;

use crate::error::{Result, SichekError};
use crate::registry::RegexRegistry;
use crate::result::{CheckResult, CheckerResult, Status};
use crate::rule::{EventRule, FileEntry, RegexEntry};
use crate::scheduler::LoadScheduler;

pub struct EventFilter {
    id: String,
    node: Option<String>,
    regex_entries: Vec<RegexEntry>,
    files: HashMap<PathBuf, FileEntry>,
    scheduler: Arc<LoadScheduler>,
    /// Running per-rule tally, kept across calls to `check` for the whole
    /// lifetime of this filter (in-memory only; nothing is durable across a
    /// restart). Once a rule has matched at least once it stays in the
    /// emitted `CheckResult`, and its `curr` keeps growing, for as long as
    /// the filter lives, not just the cycle in which the match happened,
    /// except that a rule's tally is dropped and restarted from zero when
    /// one of the files it reads rotates, since a new inode is a new log,
    /// not a continuation.
    state: HashMap<String, CheckerResult>,
}

impl EventFilter {
    /// Builds a filter from `(id, rule_set, cache_size, skip_percent)`.
    /// Rules missing a name, regex source, or file list are dropped with a
    /// logged warning, as are rules whose regex fails to compile. A filter
    /// with zero surviving rules fails construction.
    pub fn new(
        id: impl Into<String>,
        node: Option<String>,
        rules: Vec<EventRule>,
        regex_registry: &RegexRegistry,
        scheduler: Arc<LoadScheduler>,
        cache_size: usize,
        skip_percent: i32,
    ) -> Result<Self> {
        let id = id.into();
        let mut regex_entries = Vec::new();
        let mut files: HashMap<PathBuf, FileEntry> = HashMap::new();

        for rule in rules {
            if !rule.is_valid() {
                tracing::warn!(filter = %id, rule = %rule.name, "dropping invalid event rule");
                continue;
            }

            let regex = regex_registry.get_or_create(&rule.name, &rule.regexp_source);
            if let Err(err) = regex.compile() {
                tracing::warn!(
                    filter = %id,
                    rule = %rule.name,
                    error = %err,
                    "dropping rule with unparseable regex"
                );
                continue;
            }

            let mut rule_files = Vec::new();
            let mut ok = true;
            for file_str in rule.files() {
                let path = PathBuf::from(file_str);
                rule_files.push(path.clone());
                if !files.contains_key(&path) {
                    match scheduler.get_or_create_loader(&path, cache_size, skip_percent) {
                        Ok(loader) => {
                            files.insert(path.clone(), FileEntry::new(path.clone(), loader));
                        }
                        Err(err) => {
                            tracing::warn!(
                                filter = %id,
                                rule = %rule.name,
                                path = %path.display(),
                                error = %err,
                                "dropping rule: could not open tracked file"
                            );
                            ok = false;
                            break;
                        }
                    }
                }
            }
            if !ok {
                continue;
            }

            regex_entries.push(RegexEntry {
                rule,
                regex,
                files: rule_files,
            });
        }

        if regex_entries.is_empty() {
            return Err(SichekError::NoValidRules(id));
        }

        Ok(EventFilter {
            id,
            node,
            regex_entries,
            files,
            scheduler,
            state: HashMap::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Consumes every new line across every tracked file exactly once (unless
    /// the cursor fell more than `cache_size` lines behind, in which case the
    /// dropped prefix is logged and skipped), classifies each against the
    /// filter's rules (first match wins, declaration order), and returns the
    /// aggregated `CheckResult`.
    pub fn check(&mut self) -> Result<CheckResult> {
        let files = &mut self.files;
        let regex_entries = &self.regex_entries;
        let state = &mut self.state;

        for (path, entry) in files.iter_mut() {
            let total = entry.loader.total_lines_read();
            let cache_size = entry.loader.cache_size() as u64;
            let oldest_cached = total.saturating_sub(cache_size);

            if entry.check_line_cursor > total {
                // The file was rotated: the loader's line count reset to zero
                // (a new inode), so a cursor left over from the old file is
                // now past the end of the new one. Treat every line read so
                // far under the new inode as unseen.
                tracing::info!(
                    filter = %self.id,
                    path = %path.display(),
                    "file rotated, resetting cursor and tally for rules reading this file"
                );
                entry.check_line_cursor = 0;
                for regex_entry in regex_entries {
                    if regex_entry.files.iter().any(|f| f == path) {
                        state.remove(&regex_entry.rule.name);
                    }
                }
            } else if entry.check_line_cursor < oldest_cached {
                tracing::warn!(
                    filter = %self.id,
                    path = %path.display(),
                    dropped = oldest_cached - entry.check_line_cursor,
                    "cursor fell behind cache window, dropping stale prefix"
                );
                entry.check_line_cursor = oldest_cached;
            }

            let start = entry.check_line_cursor;
            for idx in start..total {
                let Some(line) = entry.loader.line_at(idx) else {
                    continue;
                };
                for regex_entry in regex_entries {
                    if !regex_entry.files.iter().any(|f| f == path) {
                        continue;
                    }
                    if regex_entry.regex.is_match(&line) {
                        apply_match(state, regex_entry, path, &line);
                        break; // first match wins
                    }
                }
            }
            entry.check_line_cursor = total;
        }

        let checkers: Vec<CheckerResult> = self
            .regex_entries
            .iter()
            .filter_map(|e| self.state.get(&e.rule.name).cloned())
            .collect();

        Ok(CheckResult::aggregate(
            self.id.clone(),
            self.node.clone(),
            checkers,
            Utc::now(),
        ))
    }

    /// Releases this filter's interest in every `FileLoader` it holds.
    /// Always succeeds: releasing interest can only decrement a counter or
    /// remove a map entry, never fail.
    pub fn close(&mut self) -> bool {
        for path in self.files.keys() {
            self.scheduler.release_interest(path);
        }
        self.files.clear();
        true
    }
}

impl Drop for EventFilter {
    fn drop(&mut self) {
        if !self.files.is_empty() {
            self.close();
        }
    }
}

/// Applies one matching line to the rule's running `CheckerResult`: first
/// match creates the result; later matches increment `curr`, append to
/// `detail` while the pre-increment count is below 3 (so `detail` ends up
/// with `min(M, 3)` lines for `M` matches), and extend `device` with any new
/// contributing file, first-occurrence order.
fn apply_match(
    aggregation: &mut HashMap<String, CheckerResult>,
    regex_entry: &RegexEntry,
    path: &Path,
    line: &str,
) {
    let device = path.display().to_string();
    match aggregation.get_mut(&regex_entry.rule.name) {
        None => {
            aggregation.insert(
                regex_entry.rule.name.clone(),
                CheckerResult {
                    name: regex_entry.rule.name.clone(),
                    description: regex_entry.rule.description.clone(),
                    spec: String::new(),
                    curr: "1".to_string(),
                    device,
                    status: Status::Abnormal,
                    level: regex_entry.rule.level,
                    error_name: regex_entry.rule.name.clone(),
                    detail: line.to_string(),
                    suggestion: regex_entry.rule.suggestion.clone(),
                },
            );
        }
        Some(existing) => {
            let count_before: u64 = existing.curr.parse().unwrap_or(1);
            if count_before < 3 {
                existing.detail.push('\n');
                existing.detail.push_str(line);
            }
            existing.curr = (count_before + 1).to_string();
            if !existing.device.split(',').any(|d| d == device) {
                existing.device.push(',');
                existing.device.push_str(&device);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::Level;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn rule(name: &str, regexp: &str, path: &Path, level: Level) -> EventRule {
        EventRule {
            name: name.into(),
            regexp_source: regexp.into(),
            log_files: path.display().to_string(),
            level,
            description: format!("{name} description"),
            suggestion: "check it".into(),
        }
    }

    #[test]
    fn construction_fails_with_zero_valid_rules() {
        let registry = RegexRegistry::new();
        let scheduler = LoadScheduler::new();
        let bad = EventRule {
            name: String::new(),
            regexp_source: "x".into(),
            log_files: "/tmp/a.log".into(),
            level: Level::Info,
            description: String::new(),
            suggestion: String::new(),
        };
        let err = EventFilter::new("f1", None, vec![bad], &registry, scheduler, 10, 0).unwrap_err();
        assert!(matches!(err, SichekError::NoValidRules(_)));
    }

    #[test]
    fn check_aggregates_repeated_matches_with_capped_detail() {
        let tmp = NamedTempFile::new().unwrap();
        {
            let mut f = std::fs::OpenOptions::new().append(true).open(tmp.path()).unwrap();
            for i in 0..5 {
                writeln!(f, "error: boom {i}").unwrap();
            }
        }
        let registry = RegexRegistry::new();
        let scheduler = LoadScheduler::new();
        let loader = scheduler.get_or_create_loader(tmp.path(), 100, 0).unwrap();
        loader.load().unwrap();

        let rules = vec![rule("TestErr", "^error:", tmp.path(), Level::Warning)];
        let mut filter = EventFilter::new("f1", None, rules, &registry, scheduler, 100, 0).unwrap();

        let result = filter.check().unwrap();
        assert_eq!(result.checkers.len(), 1);
        let c = &result.checkers[0];
        assert_eq!(c.curr, "5");
        assert_eq!(c.detail.lines().count(), 3);
        assert_eq!(c.device, tmp.path().display().to_string());
        assert_eq!(result.status, Status::Abnormal);
        assert_eq!(result.level, Level::Warning);

        // No new lines: the tally persists for the filter's lifetime, so the
        // same checker is reported again with the same curr.
        let result2 = filter.check().unwrap();
        assert_eq!(result2.checkers.len(), 1);
        assert_eq!(result2.checkers[0].curr, "5");
        assert_eq!(result2.status, Status::Abnormal);
    }

    #[test]
    fn first_match_wins_among_rules_on_same_line() {
        let tmp = NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "critical: fatal disk error\n").unwrap();
        let registry = RegexRegistry::new();
        let scheduler = LoadScheduler::new();
        let loader = scheduler.get_or_create_loader(tmp.path(), 10, 0).unwrap();
        loader.load().unwrap();

        // Declaration order: "Any" matches first, so "Critical" never fires.
        let rules = vec![
            rule("AnyLine", ".*", tmp.path(), Level::Info),
            rule("CriticalLine", "critical", tmp.path(), Level::Critical),
        ];
        let mut filter = EventFilter::new("f1", None, rules, &registry, scheduler, 10, 0).unwrap();
        let result = filter.check().unwrap();
        assert_eq!(result.checkers.len(), 1);
        assert_eq!(result.checkers[0].name, "AnyLine");
    }

    #[test]
    fn close_releases_loader_interest() {
        let tmp = NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "error: x\n").unwrap();
        let registry = RegexRegistry::new();
        let scheduler = LoadScheduler::new();
        let rules = vec![rule("R", "error", tmp.path(), Level::Warning)];
        let mut filter =
            EventFilter::new("f1", None, rules, &registry, scheduler.clone(), 10, 0).unwrap();
        assert_eq!(scheduler.registered_count(), 1);
        assert!(filter.close());
        assert_eq!(scheduler.registered_count(), 0);
    }
}
