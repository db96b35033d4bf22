//! The webpage bundle
//!
//! [`Webpage`] ties together everything the index and the crawler need
//! from one page: its URL, title, publication date, visible text, and
//! the outbound links resolved to absolute URLs.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::dates::{extract_date, DateFinder};
use crate::parser::HtmlDoc;
use crate::url::NewsUrl;

/// A fetched (or feed-announced) webpage
///
/// Invariants: `url` is absolute; `outbound` contains only
/// successfully resolved absolute URLs with query and fragment
/// stripped. Duplicates may appear in `outbound`; the crawler
/// de-duplicates.
#[derive(Debug, Clone)]
pub struct Webpage {
    pub url: NewsUrl,
    pub title: String,
    pub date: NaiveDate,
    pub text: String,
    pub outbound: Vec<NewsUrl>,
}

impl Webpage {
    /// Metadata-only construction, used for feed items: no text, no
    /// outbound links
    pub fn from_metadata(url: NewsUrl, title: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            url,
            title: title.into(),
            date,
            text: String::new(),
            outbound: Vec::new(),
        }
    }

    /// Assemble a webpage from a fetched document
    ///
    /// The date comes from the response headers, the page content, or
    /// today, in that order. Each href is resolved against `url`;
    /// references that fail to resolve are dropped.
    pub fn from_fetched(
        url: NewsUrl,
        doc: &HtmlDoc,
        headers: &HashMap<String, String>,
        html: &str,
        finder: &DateFinder,
    ) -> Self {
        let date = extract_date(headers, html, &url, finder);

        let outbound = doc
            .hrefs()
            .iter()
            .filter_map(|href| url.resolve(href).ok())
            .collect();

        Self {
            title: doc.title().to_string(),
            text: doc.text().to_string(),
            date,
            outbound,
            url,
        }
    }

    /// True when the page carries neither a title nor any text; such
    /// pages are never stored
    pub fn is_empty(&self) -> bool {
        self.title.is_empty() && self.text.is_empty()
    }
}
