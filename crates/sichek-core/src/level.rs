use serde::{Deserialize, Serialize};

/// Severity level, ordered `Info < Warning < Critical < Fatal`. The derived
/// `Ord` relies on declaration order, so the variants must stay in this
/// exact sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Warning,
    Critical,
    Fatal,
}

impl Level {
    /// Highest-priority level among an iterator of abnormal-checker levels,
    /// falling back to `Info` when nothing is abnormal.
    pub fn highest<I: IntoIterator<Item = Level>>(levels: I) -> Level {
        levels.into_iter().max().unwrap_or(Level::Info)
    }
}

impl Default for Level {
    fn default() -> Self {
        Level::Info
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Level::Info => "info",
            Level::Warning => "warning",
            Level::Critical => "critical",
            Level::Fatal => "fatal",
        };
        f.write_str(s)
    }
}
