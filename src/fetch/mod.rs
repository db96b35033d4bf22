//! Blocking HTTP transfer
//!
//! [`Fetcher`] wraps one blocking HTTP client that is reused across
//! calls, so requests to the same host ride the same keep-alive
//! connection. The crawl is serial: a `Fetcher` is owned exclusively by
//! its crawler and is not safe for concurrent use.
//!
//! A transfer never raises. Transport failures yield an empty body and
//! no headers; the crawler treats empty bodies as "skip this URL".

use std::collections::HashMap;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::redirect::Policy;
use thiserror::Error;

use crate::url::NewsUrl;

/// A realistic desktop browser string; some news sites refuse obvious
/// bot agents.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Redirect chains longer than this are abandoned.
const MAX_REDIRECTS: usize = 50;

/// Average size of a pure-text HTML article; reserving it up front
/// avoids the first few buffer reallocations without wasting much on
/// small pages.
const BODY_RESERVE: usize = 64 * 1024;

/// Errors raised while constructing the HTTP client
#[derive(Error, Debug)]
pub enum FetchError {
    /// The underlying HTTP client could not be built
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

/// The outcome of one transfer: the raw body plus the response headers
/// the caller asked for, keyed by lowercase name
#[derive(Debug, Default)]
pub struct FetchResult {
    /// Raw response body; empty on any transport failure
    pub body: Vec<u8>,

    /// Requested headers that were present in the response
    pub headers: HashMap<String, String>,
}

/// The transfer seam the crawler fetches through
///
/// [`Fetcher`] is the production implementation; tests substitute a
/// canned-page source.
pub trait Transfer {
    /// Perform one GET and capture the wanted response headers
    fn transfer(&mut self, url: &NewsUrl, wanted_headers: &[&str]) -> FetchResult;
}

/// Blocking HTTP fetcher with one reused connection handle
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    /// Create a fetcher with the fixed crawl configuration: realistic
    /// User-Agent, up to 50 redirects followed, TCP keep-alive on
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Client`] if the HTTP client cannot be
    /// created.
    pub fn new() -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(Policy::limited(MAX_REDIRECTS))
            .tcp_keepalive(Duration::from_secs(60))
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self { client })
    }
}

impl Transfer for Fetcher {
    fn transfer(&mut self, url: &NewsUrl, wanted_headers: &[&str]) -> FetchResult {
        let mut result = FetchResult::default();

        let mut response = match self.client.get(url.as_str()).send() {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "transfer failed");
                return result;
            }
        };

        for name in wanted_headers {
            if let Some(value) = response.headers().get(*name) {
                if let Ok(value) = value.to_str() {
                    result
                        .headers
                        .insert(name.to_ascii_lowercase(), value.to_string());
                }
            }
        }

        let mut body = Vec::with_capacity(BODY_RESERVE);
        if let Err(e) = response.copy_to(&mut body) {
            tracing::debug!(url = %url, error = %e, "body read failed");
            return FetchResult::default();
        }

        result.body = body;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetcher_creation() {
        assert!(Fetcher::new().is_ok());
    }

    #[test]
    fn test_transfer_failure_yields_empty_result() {
        // reserved TLD, guaranteed unresolvable
        let mut fetcher = Fetcher::new().unwrap();
        let url = NewsUrl::parse("https://no-such-host.invalid/page").unwrap();
        let result = fetcher.transfer(&url, &["date"]);
        assert!(result.body.is_empty());
        assert!(result.headers.is_empty());
    }

    #[test]
    fn test_fetch_result_default_is_empty() {
        let result = FetchResult::default();
        assert!(result.body.is_empty());
        assert!(result.headers.is_empty());
    }
}
