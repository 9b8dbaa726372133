//! Error types for the seikyu-core library.

use thiserror::Error;

/// Main error type for the seikyu library.
///
/// Extraction itself never returns errors across the public API; failed
/// fields degrade to `None`. Errors here surface only from configuration
/// loading and pattern compilation.
#[derive(Error, Debug)]
pub enum SeikyuError {
    /// Invalid regex in a pattern-table override.
    #[error("pattern error: {0}")]
    Pattern(#[from] regex::Error),

    /// JSON (de)serialization error.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// I/O error while reading or writing a config file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors recognized during extraction. These are internal signals: the
/// coordinator maps each of them to a `None` field plus a diagnostic note
/// instead of surfacing it to the caller.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// Input text is empty or all-whitespace.
    #[error("input is empty")]
    EmptyInput,

    /// Too little of the input survived mojibake recovery.
    #[error("input unreadable: ratio {ratio:.2}")]
    UnreadableInput { ratio: f64 },

    /// A matched numeric literal failed integer parsing.
    #[error("failed to parse numeric literal: {literal}")]
    Parse { literal: String },
}

/// Result type for the seikyu library.
pub type Result<T> = std::result::Result<T, SeikyuError>;
