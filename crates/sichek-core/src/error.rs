use thiserror::Error;

/// Crate-wide error type. One variant per failure class: config errors abort
/// construction, transient I/O is logged and surfaces as a skipped cycle,
/// compile errors drop only the offending rule, and so on. Call sites that
/// only need to propagate use `?`; call sites that need to branch match on
/// the variant.
#[derive(Debug, Error)]
pub enum SichekError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("regex compile error for `{source_expr}`: {cause}")]
    Regex { source_expr: String, cause: String },

    #[error("config error: {0}")]
    Config(String),

    #[error("component `{0}` did not return within {1:?}")]
    Timeout(String, std::time::Duration),

    #[error("remediation failed for `{checker}`: {cause}")]
    Remediation { checker: String, cause: String },

    #[error("construction failed: {0}")]
    Construction(String),

    #[error("event filter `{0}` has no valid rules")]
    NoValidRules(String),
}

pub type Result<T> = std::result::Result<T, SichekError>;
