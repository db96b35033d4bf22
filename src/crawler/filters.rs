//! Crawl filters
//!
//! Two filter pairs gate every crawl decision: cheap URL-level filters
//! screen links before any fetch, and page-level filters look at the
//! parsed page. Per-host rules are data, not code: a [`HostRule`]
//! describes which paths on a host are worth recursing into and which
//! look like indexable articles. Hosts without a rule are neither
//! indexed nor recursed.
//!
//! By convention the recurse condition is a superset of the index
//! condition: a page we index, we also explore.

use std::collections::HashMap;

use chrono::Datelike;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::page::Webpage;
use crate::url::NewsUrl;

/// Crawl rules for one host
///
/// An article path must start with one of `index_prefixes` (when any
/// are given) and satisfy every enabled shape requirement. A rule with
/// no prefixes and no requirements indexes the whole host.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostRule {
    /// Path prefixes that are worth exploring for links. `"/"` opens
    /// the whole host.
    #[serde(default)]
    pub recurse_prefixes: Vec<String>,

    /// Path prefixes that indicate article pages
    #[serde(default)]
    pub index_prefixes: Vec<String>,

    /// Substrings the path must contain to be indexed
    #[serde(default)]
    pub index_substrings: Vec<String>,

    /// Article paths must embed a date, like `/2025/01/15/` or
    /// `2025-01-15`
    #[serde(default)]
    pub index_requires_date: bool,

    /// Article paths must contain a word-word-word slug
    #[serde(default)]
    pub index_requires_slug: bool,

    /// Whether indexable pages are also explored (the usual
    /// convention)
    #[serde(default = "default_true")]
    pub recurse_includes_index: bool,
}

fn default_true() -> bool {
    true
}

/// The full filter set used by one crawl
pub struct CrawlFilters {
    rules: HashMap<String, HostRule>,
    dated_path: Regex,
    slug: Regex,
    min_index_year: i32,
}

impl CrawlFilters {
    /// Build filters from a host-rule table
    ///
    /// `min_index_year` is the oldest publication year still worth
    /// indexing.
    pub fn new(rules: HashMap<String, HostRule>, min_index_year: i32) -> Self {
        Self {
            rules,
            // a date encoded in a path segment, year first or last
            dated_path: Regex::new(
                r"(?:^|/)\d{4}[-/]\d{1,2}[-/]\d{1,2}(?:$|/)|(?:^|/)\d{1,2}[-/]\d{1,2}[-/]\d{4}(?:$|/)",
            )
            .unwrap(),
            // at least three words in a word-word-word pattern, common
            // in news article addresses
            slug: Regex::new(r"[A-Za-z](-[A-Za-z]+){2,}").unwrap(),
            min_index_year,
        }
    }

    /// Should this URL's page be stored in the index?
    pub fn url_index(&self, url: &NewsUrl) -> bool {
        let Some(rule) = self.rules.get(url.host()) else {
            return false;
        };
        self.index_condition(rule, url.path())
    }

    /// Should this URL's outbound links feed the frontier?
    pub fn url_recurse(&self, url: &NewsUrl) -> bool {
        let Some(rule) = self.rules.get(url.host()) else {
            return false;
        };
        let path = url.path();

        if rule.recurse_prefixes.iter().any(|p| path.starts_with(p.as_str())) {
            return true;
        }
        rule.recurse_includes_index && self.index_condition(rule, path)
    }

    /// Page-level index filter: recent enough, and not empty
    pub fn page_index(&self, page: &Webpage) -> bool {
        page.date.year() >= self.min_index_year && !page.text.is_empty()
    }

    /// Page-level recurse filter: both a title and text are present
    pub fn page_recurse(&self, page: &Webpage) -> bool {
        !page.text.is_empty() && !page.title.is_empty()
    }

    fn index_condition(&self, rule: &HostRule, path: &str) -> bool {
        if !rule.index_prefixes.is_empty()
            && !rule.index_prefixes.iter().any(|p| path.starts_with(p.as_str()))
        {
            return false;
        }
        if !rule.index_substrings.is_empty()
            && !rule.index_substrings.iter().any(|s| path.contains(s.as_str()))
        {
            return false;
        }
        if rule.index_requires_date && !self.dated_path.is_match(path) {
            return false;
        }
        if rule.index_requires_slug && !self.slug.is_match(path) {
            return false;
        }
        true
    }
}

/// The built-in rule table: the hosts this crawler was written for
///
/// Callers can replace or extend the table through configuration.
pub fn default_rules() -> HashMap<String, HostRule> {
    let mut rules = HashMap::new();

    rules.insert(
        "hbr.org".to_string(),
        HostRule {
            recurse_prefixes: vec!["/topic".into(), "/the-latest".into()],
            index_requires_slug: true,
            ..Default::default()
        },
    );
    rules.insert(
        "www.cnbc.com".to_string(),
        HostRule {
            recurse_prefixes: vec!["/business".into(), "/investing".into(), "/markets".into()],
            index_requires_date: true,
            index_requires_slug: true,
            ..Default::default()
        },
    );
    rules.insert(
        "www.ft.com".to_string(),
        HostRule {
            recurse_prefixes: vec!["/".into()],
            index_prefixes: vec!["/content".into()],
            // "/content" alone is too general to drive recursion
            recurse_includes_index: false,
            ..Default::default()
        },
    );
    rules.insert(
        "edition.cnn.com".to_string(),
        HostRule {
            recurse_prefixes: vec!["/".into()],
            index_substrings: vec!["/business".into()],
            index_requires_date: true,
            index_requires_slug: true,
            ..Default::default()
        },
    );
    rules.insert(
        "www.economist.com".to_string(),
        HostRule {
            recurse_prefixes: vec!["/topics".into()],
            index_requires_date: true,
            index_requires_slug: true,
            ..Default::default()
        },
    );
    rules.insert(
        "fortune.com".to_string(),
        HostRule {
            recurse_prefixes: vec!["/the-latest".into(), "/section".into()],
            index_requires_slug: true,
            ..Default::default()
        },
    );
    rules.insert(
        "www.theguardian.com".to_string(),
        HostRule {
            recurse_prefixes: vec![
                "/business".into(),
                "/money".into(),
                "/uk/business".into(),
                "/uk/money".into(),
            ],
            index_prefixes: vec![
                "/business".into(),
                "/money".into(),
                "/uk/business".into(),
                "/uk/money".into(),
            ],
            index_requires_date: true,
            ..Default::default()
        },
    );
    rules.insert(
        "www.theatlantic.com".to_string(),
        HostRule {
            recurse_prefixes: vec!["/economy".into()],
            index_prefixes: vec!["/economy".into()],
            index_requires_date: true,
            recurse_includes_index: false,
            ..Default::default()
        },
    );
    rules.insert(
        "www.ibtimes.com".to_string(),
        HostRule {
            recurse_prefixes: vec!["/economy-markets".into()],
            index_requires_slug: true,
            ..Default::default()
        },
    );
    rules.insert(
        "www.forbes.com".to_string(),
        HostRule {
            recurse_prefixes: vec!["/business".into()],
            index_prefixes: vec!["/sites".into()],
            ..Default::default()
        },
    );
    rules.insert(
        "www.nytimes.com".to_string(),
        HostRule {
            recurse_prefixes: vec!["/section".into()],
            index_substrings: vec!["business".into(), "market".into()],
            index_requires_date: true,
            ..Default::default()
        },
    );
    rules.insert(
        "www.inc.com".to_string(),
        HostRule {
            recurse_prefixes: vec!["/section".into()],
            index_requires_slug: true,
            ..Default::default()
        },
    );
    rules.insert(
        "www.entrepreneur.com".to_string(),
        HostRule {
            recurse_prefixes: vec!["/business-news".into()],
            index_requires_slug: true,
            ..Default::default()
        },
    );
    rules.insert(
        "www.foxbusiness.com".to_string(),
        HostRule {
            recurse_prefixes: vec!["/".into()],
            index_requires_slug: true,
            ..Default::default()
        },
    );

    rules
}
