//! Error types shared across the flotilla crates.

/// The result type used throughout flotilla-core.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the core types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An identifier string could not be parsed.
    #[error("invalid identifier: {message}")]
    InvalidId {
        /// Description of the parse failure.
        message: String,
    },
}
