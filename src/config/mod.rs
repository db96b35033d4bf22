//! Configuration for the crawler, updater, and maintenance tools
//!
//! Everything that is data rather than code lives here: the seed URLs
//! the crawl starts from, the RSS/Atom feeds the updater pulls, the
//! per-host crawl rules, and the per-host eviction probabilities the
//! purge tool applies. A built-in default covers the news sources this
//! crawler was written for; a TOML file can replace any part of it.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::crawler::{default_rules, HostRule};
use crate::error::{Error, Result};
use crate::url::NewsUrl;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Crawler tuning
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// URLs the crawl frontier is seeded with
    #[serde(default)]
    pub seeds: Vec<String>,

    /// RSS/Atom feed URLs the updater ingests
    #[serde(default)]
    pub feeds: Vec<String>,

    /// Per-host crawl rules; empty means the built-in table
    #[serde(default)]
    pub hosts: HashMap<String, HostRule>,

    /// Host → eviction probability applied by `remove ... purge`
    #[serde(default)]
    pub purge: HashMap<String, f32>,
}

/// Crawler-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Oldest publication year still worth indexing
    pub min_index_year: i32,

    /// Stop after this many newly indexed documents
    pub index_limit: Option<u64>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            min_index_year: 2024,
            index_limit: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the given file, or fall back to the built-in default
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// The host-rule table, falling back to the built-in one
    pub fn host_rules(&self) -> HashMap<String, HostRule> {
        if self.hosts.is_empty() {
            default_rules()
        } else {
            self.hosts.clone()
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        for seed in &self.seeds {
            NewsUrl::parse(seed)
                .map_err(|e| Error::config(format!("seed {seed}: {e}")))?;
        }
        for feed in &self.feeds {
            NewsUrl::parse(feed)
                .map_err(|e| Error::config(format!("feed {feed}: {e}")))?;
        }
        for (host, p) in &self.purge {
            if !(0.0..=1.0).contains(p) {
                return Err(Error::config(format!(
                    "purge probability for {host} out of range: {p}"
                )));
            }
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            crawler: CrawlerConfig::default(),
            seeds: [
                "https://hbr.org/topic/subject/strategy",
                "https://hbr.org/topic/subject/marketing",
                "https://hbr.org/topic/subject/economics",
                "https://www.cnbc.com/business",
                "https://www.ft.com",
                "https://edition.cnn.com/business",
                "https://www.economist.com",
                "https://fortune.com/the-latest",
                "https://www.theguardian.com/business",
                "https://www.theatlantic.com/economy",
                "https://www.ibtimes.com/economy-markets",
                "https://www.forbes.com/business",
            ]
            .map(String::from)
            .to_vec(),
            feeds: [
                "https://feeds.a.dj.com/rss/WSJcomUSBusiness.xml",
                "https://feeds.a.dj.com/rss/RSSMarketsMain.xml",
                "http://rss.nytimes.com/services/xml/rss/nyt/Business.xml",
                "http://www.economist.com/feeds/print-sections/77/business.xml",
                "http://www.business-standard.com/rss/latest.rss",
                "http://feeds.harvardbusiness.org/harvardbusiness?format=xml",
                "https://economictimes.indiatimes.com/rssfeedsdefault.cms",
            ]
            .map(String::from)
            .to_vec(),
            hosts: default_rules(),
            purge: HashMap::from([("www.businessinsider.com".to_string(), 0.95f32)]),
        }
    }
}
