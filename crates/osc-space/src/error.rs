//! Error types for the OSC address space

use thiserror::Error;

/// Result type alias for address space operations
pub type Result<T> = std::result::Result<T, Error>;

/// Address space error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Address has no path components (`""` or `"/"`)
    #[error("empty address")]
    EmptyAddress,

    /// Path component cannot be used as a node name
    #[error("invalid name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    /// Bracket range whose start sorts after its end, e.g. `[z-a]`
    #[error("invalid character range: {start}-{end}")]
    InvalidRange { start: char, end: char },

    /// Configuration could not be loaded
    #[error("configuration error: {0}")]
    InvalidConfig(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::InvalidConfig(e.to_string())
    }
}
