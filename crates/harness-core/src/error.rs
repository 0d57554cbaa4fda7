use thiserror::Error;

/// Raised before a sandbox is ever acquired: a `CONFIG_INVALID` error.
/// Never appears in a `Verdict`.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("duplicate parameter name: {0}")]
    DuplicateParameter(String),

    #[error("source code is {len} bytes, exceeding the {max} byte limit")]
    SourceTooLarge { len: usize, max: usize },

    #[error("literal for parameter {param} does not conform to its declared type: {reason}")]
    MalformedLiteral { param: String, reason: String },

    #[error("malformed document: {0}")]
    Malformed(String),
}
