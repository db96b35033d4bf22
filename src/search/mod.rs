//! The query engine
//!
//! [`Searcher`] opens the index read-only and answers text queries
//! with optional date-range predicates. The same stemming analyzer
//! used at index time drives the query parser; `title:` and `text:`
//! prefixes address the corresponding fields, and any other term
//! searches both.
//!
//! Date ranges are written `A..B` inside the query, preferring the
//! American `MM/DD/YYYY` reading. Two-digit years are anchored at 1860
//! so they never collide with modern dates. Either end may be empty
//! for an open range.

use std::collections::BTreeSet;
use std::path::Path;

use chrono::NaiveDate;
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::Value;
use tantivy::tokenizer::TokenStream;
use tantivy::{Index, IndexReader, ReloadPolicy, TantivyDocument};
use thiserror::Error;

use crate::dates::{from_slot_u64, to_slot_u64};
use crate::index::{IndexError, NewsSchema, TOKENIZER_NAME};

/// Hits returned when the caller does not say how many it wants.
pub const DEFAULT_MAX_RESULTS: usize = 64;

/// Terms sampled from a document for display.
const MAX_KEYWORDS: usize = 150;

/// Two-digit years count from here, so `60..99` land in the
/// nineteenth century and `00..59` in the twentieth.
const RANGE_EPOCH_YEAR: i32 = 1860;

/// Malformed user query; reported to the CLI only
#[derive(Error, Debug)]
pub enum QueryError {
    /// The query text could not be parsed
    #[error("malformed query: {0}")]
    Parse(String),

    /// The index engine failed while searching
    #[error("search failed: {0}")]
    Engine(#[from] tantivy::TantivyError),
}

/// One search hit
#[derive(Debug, Clone)]
pub struct SearchHit {
    /// Engine relevance score
    pub score: f32,
    /// The stored display blob `"<url>\t<title>"`
    pub data: String,
    /// Full URL, the part of `data` before the first tab
    pub url: String,
    pub title: String,
    pub date: NaiveDate,
    /// Stored body text backing keyword sampling
    pub text: String,
}

/// Read-only query interface over an index directory
pub struct Searcher {
    index: Index,
    reader: IndexReader,
    fields: NewsSchema,
    max_results: usize,
}

impl Searcher {
    /// Open the index read-only
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] when the store cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IndexError> {
        let index = Index::open_in_dir(path.as_ref())?;
        NewsSchema::register_tokenizer(&index);
        let fields = NewsSchema::for_index(&index)?;

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        Ok(Self {
            index,
            reader,
            fields,
            max_results: DEFAULT_MAX_RESULTS,
        })
    }

    /// Override the default result cap for this searcher
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    /// See changes committed since the index was opened
    pub fn refresh(&self) -> Result<(), IndexError> {
        self.reader.reload()?;
        Ok(())
    }

    /// Parse a text query and return the top matches by relevance
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Parse`] for malformed queries, including
    /// queries reduced to nothing.
    pub fn query(&self, text: &str, max_results: Option<usize>) -> Result<Vec<SearchHit>, QueryError> {
        let (terms, ranges) = extract_date_ranges(text);
        let rewritten = rewrite_query(&terms, &ranges)
            .ok_or_else(|| QueryError::Parse("empty query".to_string()))?;

        let parser = QueryParser::for_index(&self.index, vec![self.fields.title, self.fields.text]);
        let query = parser
            .parse_query(&rewritten)
            .map_err(|e| QueryError::Parse(e.to_string()))?;

        let searcher = self.reader.searcher();
        let limit = max_results.unwrap_or(self.max_results);
        let hits = searcher.search(&query, &TopDocs::with_limit(limit))?;

        let mut results = Vec::with_capacity(hits.len());
        for (score, address) in hits {
            let stored: TantivyDocument = searcher.doc(address)?;
            results.push(self.hit_from_document(score, &stored));
        }
        Ok(results)
    }

    /// Sample display keywords from a hit
    ///
    /// The stored body is run back through the index analyzer; the
    /// unique stemmed terms that look like English words (lowercase
    /// alphabetic, at least two characters) are evenly sampled down to
    /// at most 150.
    pub fn keywords(&self, hit: &SearchHit) -> Vec<String> {
        let Some(mut analyzer) = self.index.tokenizers().get(TOKENIZER_NAME) else {
            return Vec::new();
        };

        let mut terms = BTreeSet::new();
        let mut stream = analyzer.token_stream(&hit.text);
        while stream.advance() {
            terms.insert(stream.token().text.clone());
        }

        let words: Vec<String> = terms.into_iter().filter(|t| is_english_like(t)).collect();

        // evenly sample instead of truncating, so keywords come from
        // the whole document
        if words.len() <= MAX_KEYWORDS {
            return words;
        }
        let step = words.len() as f32 / MAX_KEYWORDS as f32;
        let mut sampled = Vec::with_capacity(MAX_KEYWORDS);
        let mut i = 0f32;
        while (i as usize) < words.len() {
            sampled.push(words[i as usize].clone());
            i += step;
        }
        sampled
    }

    fn hit_from_document(&self, score: f32, stored: &TantivyDocument) -> SearchHit {
        let data = stored
            .get_first(self.fields.data)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let url = data.split('\t').next().unwrap_or_default().to_string();

        SearchHit {
            score,
            url,
            title: stored
                .get_first(self.fields.title)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            date: stored
                .get_first(self.fields.date)
                .and_then(|v| v.as_u64())
                .and_then(from_slot_u64)
                .unwrap_or_default(),
            text: stored
                .get_first(self.fields.text)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            data,
        }
    }
}

/// Allow only lowercase alphabetic terms of at least two characters
fn is_english_like(term: &str) -> bool {
    term.len() >= 2 && term.bytes().all(|b| b.is_ascii_lowercase())
}

/// An inclusive date-slot range; `None` leaves that end open
type SlotRange = (Option<u64>, Option<u64>);

/// Split `A..B` tokens out of the query text
///
/// Returns the remaining free-text part and the recognized date-slot
/// ranges. Tokens that look like ranges but do not parse stay in the
/// text part.
fn extract_date_ranges(query: &str) -> (String, Vec<SlotRange>) {
    let mut terms = Vec::new();
    let mut ranges = Vec::new();

    for token in query.split_whitespace() {
        match parse_range_token(token) {
            Some(range) => ranges.push(range),
            None => terms.push(token),
        }
    }

    (terms.join(" "), ranges)
}

/// Compile the free-text part and the date ranges into one parser
/// query: the terms as one required group, each range as a required
/// filter on the date slot
fn rewrite_query(terms: &str, ranges: &[SlotRange]) -> Option<String> {
    let terms = terms.trim();
    if terms.is_empty() && ranges.is_empty() {
        return None;
    }
    if ranges.is_empty() {
        return Some(terms.to_string());
    }

    let mut parts = Vec::with_capacity(1 + ranges.len());
    if !terms.is_empty() {
        parts.push(format!("+({terms})"));
    }
    for (lower, upper) in ranges {
        let lower = lower.map_or_else(|| "*".to_string(), |v| v.to_string());
        let upper = upper.map_or_else(|| "*".to_string(), |v| v.to_string());
        parts.push(format!("+date:[{lower} TO {upper}]"));
    }
    Some(parts.join(" "))
}

fn parse_range_token(token: &str) -> Option<SlotRange> {
    let (low, high) = token.split_once("..")?;
    if low.is_empty() && high.is_empty() {
        return None;
    }

    let lower = if low.is_empty() {
        None
    } else {
        Some(to_slot_u64(parse_range_date(low)?))
    };
    let upper = if high.is_empty() {
        None
    } else {
        Some(to_slot_u64(parse_range_date(high)?))
    };

    Some((lower, upper))
}

/// Parse one end of a date range, preferring the `MM/DD/YYYY` reading
fn parse_range_date(s: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = s.split('/').collect();
    if parts.len() == 3 {
        let month: u32 = parts[0].parse().ok()?;
        let day: u32 = parts[1].parse().ok()?;
        let year = parse_range_year(parts[2])?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

fn parse_range_year(s: &str) -> Option<i32> {
    let year: i32 = s.parse().ok()?;
    if s.len() > 2 {
        return Some(year);
    }
    // two-digit years fill 1860..=1959
    if year >= RANGE_EPOCH_YEAR % 100 {
        Some(1800 + year)
    } else {
        Some(1900 + year)
    }
}
