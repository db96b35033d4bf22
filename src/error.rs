//! Unified error handling for the newswire crate
//!
//! Domain-specific errors live next to the code that produces them
//! (`UrlError`, `IndexError`, `QueryError`, `FeedError`); this module
//! collects them into a single [`Error`] enum so callers can hold one
//! error type across module boundaries.

use std::io;
use thiserror::Error;

pub use crate::feed::FeedError;
pub use crate::fetch::FetchError;
pub use crate::index::IndexError;
pub use crate::search::QueryError;
pub use crate::url::UrlError;

/// Unified error type for the newswire crate
#[derive(Error, Debug)]
pub enum Error {
    /// URL parsing and resolution errors
    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    /// HTTP client construction errors
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// On-disk index errors; fatal to the current operation
    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    /// Query parsing errors; reported to the CLI only
    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    /// Feed parsing errors
    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    /// Frontier file and other I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
