//! newswire - Business-news crawler and full-text search backend
//!
//! A focused, domain-restricted web crawler that fetches business-news
//! articles, extracts their metadata, and stores them in an on-disk
//! inverted full-text index keyed by a stable URL fingerprint. Text
//! queries with optional date-range predicates run against the same
//! index.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`url`] - URL normalization and RFC 3986 reference resolution
//! - [`fetch`] - Blocking HTTP transfer with selected-header capture
//! - [`parser`] - HTML parsing with streamed text accumulation
//! - [`dates`] - Publication-date extraction and free-text date parsing
//! - [`page`] - The [`page::Webpage`] bundle of url, title, date, text and links
//! - [`index`] - The on-disk inverted index with upsert and shrink
//! - [`crawler`] - Bounded, interruptible breadth-first crawl engine
//! - [`search`] - Text + date-range queries over the index
//! - [`feed`] - RSS 2.0 / Atom ingestion for the updater
//! - [`config`] - Configuration, including per-host crawl rules
//!
//! # Example
//!
//! ```no_run
//! use newswire::config::Config;
//! use newswire::crawler::Crawler;
//! use newswire::index::NewsIndex;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     let index = NewsIndex::open("./newsdb")?;
//!     let mut crawler = Crawler::from_seeds(index, "./queue.bin", &config)?;
//!     crawler.run()?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod crawler;
pub mod dates;
pub mod error;
pub mod feed;
pub mod fetch;
pub mod index;
pub mod page;
pub mod parser;
pub mod search;
pub mod url;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::crawler::Crawler;
    pub use crate::error::{Error, Result};
    pub use crate::index::NewsIndex;
    pub use crate::page::Webpage;
    pub use crate::search::Searcher;
    pub use crate::url::NewsUrl;
}

pub use error::{Error, Result};
