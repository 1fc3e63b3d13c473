//! Error taxonomy for the MLT framework core.

use thiserror::Error;

/// Flat error taxonomy shared by every core crate.
///
/// Mirrors the kinds enumerated in the framework's error handling design: all
/// values are cheap, non-exception signals. Property coercion failures do not
/// use this type; they set a sentinel and report failure through a plain
/// `bool`/error-code return per the propagation policy.
#[derive(Error, Debug)]
pub enum MltError {
    #[error("bad argument: {0}")]
    BadArgument(String),

    #[error("parse error at offset {offset}: {message}")]
    ParseError { message: String, offset: isize },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("format unsupported: {0}")]
    FormatUnsupported(String),

    #[error("allocation failed: {0}")]
    AllocationFailed(String),

    #[error("fatal: {0}")]
    Fatal(String),
}

/// Result type alias used throughout the workspace.
pub type MltResult<T> = Result<T, MltError>;

impl MltError {
    pub fn parse(message: impl Into<String>, offset: isize) -> Self {
        MltError::ParseError {
            message: message.into(),
            offset,
        }
    }
}
