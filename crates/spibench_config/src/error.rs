//! Error types for bench file loading and validation.

/// Errors that can occur when loading or validating a `spibench.toml` file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The bench file could not be read.
    #[error("cannot read bench file: {0}")]
    IoError(#[from] std::io::Error),

    /// The file is not valid TOML or does not match the bench schema.
    #[error("invalid bench file: {0}")]
    ParseError(String),

    /// A required field is absent or empty.
    #[error("missing required field: {0}")]
    MissingField(String),

    /// A value is out of range or inconsistent.
    #[error("validation error: {0}")]
    ValidationError(String),
}
