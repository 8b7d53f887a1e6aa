//! Event-rule data types: immutable-after-load rule definitions, plus the
//! per-`EventFilter` bookkeeping types (`RegexEntry`, `FileEntry`) that bind
//! rules to interned regexes and loaders.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::level::Level;
use crate::registry::RegexFilter;
use crate::file_loader::FileLoader;

/// A named regex-plus-metadata rule, as loaded from an event-rule YAML file.
/// Immutable once constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRule {
    pub name: String,
    #[serde(rename = "regexp")]
    pub regexp_source: String,
    /// Comma-joined list of tracked log file paths.
    #[serde(rename = "log_file")]
    pub log_files: String,
    pub level: Level,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub suggestion: String,
}

impl EventRule {
    /// A rule is valid only if it has a non-empty name, a non-empty regex
    /// source, and at least one non-empty log file path.
    pub fn is_valid(&self) -> bool {
        !self.name.trim().is_empty()
            && !self.regexp_source.trim().is_empty()
            && self.files().next().is_some()
    }

    /// The individual log file paths this rule tracks, trimmed and with
    /// empty segments dropped.
    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.log_files
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// One rule bound to its interned regex and the set of files it tracks,
/// inside a constructed `EventFilter`.
pub struct RegexEntry {
    pub rule: EventRule,
    pub regex: Arc<RegexFilter>,
    pub files: Vec<PathBuf>,
}

/// Per-`EventFilter` cursor into one `FileLoader`'s line counter.
pub struct FileEntry {
    pub file_name: PathBuf,
    pub loader: Arc<FileLoader>,
    pub check_line_cursor: u64,
}

impl FileEntry {
    pub fn new(file_name: impl Into<PathBuf>, loader: Arc<FileLoader>) -> Self {
        FileEntry {
            file_name: file_name.into(),
            loader,
            check_line_cursor: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.file_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(name: &str, regexp: &str, log_files: &str) -> EventRule {
        EventRule {
            name: name.into(),
            regexp_source: regexp.into(),
            log_files: log_files.into(),
            level: Level::Warning,
            description: String::new(),
            suggestion: String::new(),
        }
    }

    #[test]
    fn validity_requires_name_regex_and_files() {
        assert!(rule("n", "e.*", "/tmp/a.log").is_valid());
        assert!(!rule("", "e.*", "/tmp/a.log").is_valid());
        assert!(!rule("n", "", "/tmp/a.log").is_valid());
        assert!(!rule("n", "e.*", "").is_valid());
        assert!(!rule("n", "e.*", "   ,  ").is_valid());
    }

    #[test]
    fn files_splits_and_trims_comma_list() {
        let r = rule("n", "e.*", " /tmp/a.log, /tmp/b.log ,");
        let files: Vec<&str> = r.files().collect();
        assert_eq!(files, vec!["/tmp/a.log", "/tmp/b.log"]);
    }
}
