//! The crawl engine
//!
//! A bounded, interruptible, breadth-first crawl over a FIFO frontier
//! of URLs. Each tick pops one URL, fetches and parses it, stores the
//! page if the index filters accept it and it is not already indexed,
//! and enqueues its outbound links if the recurse filters accept it.
//!
//! The crawl is serial: one sequential loop, one fetcher, one index
//! writer. Per-URL failures are swallowed (a failed fetch yields an
//! empty page that both page filters reject); index errors propagate
//! and end the crawl.
//!
//! On drop the frontier is serialized to its configured path and the
//! index, dropped right after, commits. Interrupting (for example from
//! a SIGINT handler) lets the current iteration finish and then stops
//! the loop, so a crawl can always be resumed from the saved frontier.

pub mod filters;
pub mod frontier;

use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::Config;
use crate::dates::DateFinder;
use crate::error::Result;
use crate::fetch::{Fetcher, Transfer};
use crate::index::NewsIndex;
use crate::page::Webpage;
use crate::parser::HtmlParser;
use crate::url::NewsUrl;

pub use filters::{default_rules, CrawlFilters, HostRule};

/// The response headers the crawler asks the fetcher to capture.
const WANTED_HEADERS: &[&str] = &["date"];

/// Counters for one crawl session
#[derive(Debug, Default, Clone)]
pub struct CrawlStats {
    /// URLs popped from the frontier and fetched
    pub fetched: u64,

    /// Pages newly stored in the index
    pub indexed: u64,

    /// Indexable pages skipped because the index already had them
    pub skipped_known: u64,

    /// Fetches that produced no title and no text
    pub empty_pages: u64,

    /// Outbound links added to the frontier
    pub enqueued: u64,
}

/// Breadth-first crawler over one index
pub struct Crawler<F: Transfer = Fetcher> {
    index: NewsIndex,
    fetcher: F,
    parser: HtmlParser,
    date_finder: DateFinder,
    filters: CrawlFilters,
    frontier: VecDeque<NewsUrl>,
    queue_path: PathBuf,
    // per-crawl on purpose: pages change between runs, and the index
    // itself is the cross-session memory
    visited_recurse: HashSet<String>,
    stats: CrawlStats,
    index_limit: u64,
    interrupted: Arc<AtomicBool>,
}

impl Crawler<Fetcher> {
    /// Start a crawl from the configured seed URLs
    ///
    /// # Errors
    ///
    /// Fails when the HTTP client cannot be built or a seed URL does
    /// not parse.
    pub fn from_seeds(
        index: NewsIndex,
        queue_path: impl Into<PathBuf>,
        config: &Config,
    ) -> Result<Self> {
        let mut frontier = VecDeque::with_capacity(config.seeds.len());
        for seed in &config.seeds {
            frontier.push_back(NewsUrl::parse(seed)?);
        }

        Ok(Self::with_transfer(
            index,
            Fetcher::new()?,
            CrawlFilters::new(config.host_rules(), config.crawler.min_index_year),
            frontier,
            queue_path,
            config.crawler.index_limit.unwrap_or(u64::MAX),
        ))
    }

    /// Resume a crawl from a frontier saved by a previous run
    ///
    /// # Errors
    ///
    /// Fails when the queue file does not exist or cannot be read.
    pub fn resume(
        index: NewsIndex,
        queue_path: impl Into<PathBuf>,
        config: &Config,
    ) -> Result<Self> {
        let queue_path = queue_path.into();
        let frontier = frontier::load(&queue_path)?;
        tracing::info!(urls = frontier.len(), path = %queue_path.display(), "frontier resumed");

        Ok(Self::with_transfer(
            index,
            Fetcher::new()?,
            CrawlFilters::new(config.host_rules(), config.crawler.min_index_year),
            frontier,
            queue_path,
            config.crawler.index_limit.unwrap_or(u64::MAX),
        ))
    }
}

impl<F: Transfer> Crawler<F> {
    /// Assemble a crawler from its parts; this is the seam tests and
    /// embedders inject a transfer implementation through
    pub fn with_transfer(
        index: NewsIndex,
        fetcher: F,
        filters: CrawlFilters,
        frontier: VecDeque<NewsUrl>,
        queue_path: impl Into<PathBuf>,
        index_limit: u64,
    ) -> Self {
        Self {
            index,
            fetcher,
            parser: HtmlParser::new(),
            date_finder: DateFinder::new(),
            filters,
            frontier,
            queue_path: queue_path.into(),
            visited_recurse: HashSet::new(),
            stats: CrawlStats::default(),
            index_limit,
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The flag a signal handler flips to stop the crawl
    ///
    /// The flag is sampled at the top of each iteration; the current
    /// iteration completes, then the loop stops.
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupted)
    }

    /// Request the crawl to stop after the current iteration
    pub fn interrupt(&self) {
        self.interrupted.store(true, Ordering::Relaxed);
    }

    /// Documents stored by this crawl so far
    pub fn num_indexed(&self) -> u64 {
        self.stats.indexed
    }

    /// Counters for this crawl session
    pub fn stats(&self) -> &CrawlStats {
        &self.stats
    }

    /// URLs still awaiting processing
    pub fn frontier_len(&self) -> usize {
        self.frontier.len()
    }

    /// The transfer implementation this crawler fetches through
    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Run until the frontier drains, the index limit is reached, or
    /// an interrupt arrives
    ///
    /// # Errors
    ///
    /// Per-URL fetch and parse failures are swallowed; only index
    /// errors propagate.
    pub fn run(&mut self) -> Result<()> {
        loop {
            if self.interrupted.load(Ordering::Relaxed) {
                tracing::info!(remaining = self.frontier.len(), "crawl interrupted");
                break;
            }
            if self.stats.indexed >= self.index_limit {
                tracing::info!(indexed = self.stats.indexed, "index limit reached");
                break;
            }
            let Some(url) = self.frontier.pop_front() else {
                tracing::info!(indexed = self.stats.indexed, "frontier exhausted");
                break;
            };

            self.step(url)?;
        }

        tracing::info!(
            fetched = self.stats.fetched,
            indexed = self.stats.indexed,
            skipped_known = self.stats.skipped_known,
            empty_pages = self.stats.empty_pages,
            enqueued = self.stats.enqueued,
            "crawl finished"
        );
        Ok(())
    }

    fn step(&mut self, url: NewsUrl) -> Result<()> {
        let page = self.fetch_and_parse(url.clone());
        self.stats.fetched += 1;
        if page.is_empty() {
            self.stats.empty_pages += 1;
        }

        if self.filters.url_index(&url) && self.filters.page_index(&page) {
            if self.index.contains(&url)? {
                self.stats.skipped_known += 1;
            } else {
                self.index.add(&page)?;
                self.stats.indexed += 1;
                tracing::info!(n = self.stats.indexed, url = %url, "indexed");
            }
        }

        let essential = url.essential();
        if !self.visited_recurse.contains(&essential)
            && self.filters.url_recurse(&url)
            && self.filters.page_recurse(&page)
        {
            self.visited_recurse.insert(essential);

            for link in &page.outbound {
                // already captured: nothing new to learn from it here
                if self.index.contains(link)? {
                    continue;
                }
                // neither indexable nor explorable: not worth queue space
                if !self.filters.url_index(link) && !self.filters.url_recurse(link) {
                    continue;
                }
                self.frontier.push_back(link.clone());
                self.stats.enqueued += 1;
            }
        }

        Ok(())
    }

    fn fetch_and_parse(&mut self, url: NewsUrl) -> Webpage {
        let result = self.fetcher.transfer(&url, WANTED_HEADERS);
        let html = self.parser.decode(&result.body);
        let doc = self.parser.parse_str(&html);
        Webpage::from_fetched(url, &doc, &result.headers, &html, &self.date_finder)
    }
}

impl<F: Transfer> Drop for Crawler<F> {
    fn drop(&mut self) {
        match frontier::save(&self.queue_path, &self.frontier) {
            Ok(()) => {
                tracing::debug!(
                    urls = self.frontier.len(),
                    path = %self.queue_path.display(),
                    "frontier saved"
                );
            }
            Err(e) => {
                tracing::error!(path = %self.queue_path.display(), error = %e, "frontier save failed");
            }
        }
        // the index field drops right after this and commits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchResult;
    use std::collections::HashMap;
    use tempfile::TempDir;

    /// Serves canned pages; counts how often each URL is fetched.
    struct StubTransfer {
        pages: HashMap<String, String>,
        fetch_counts: HashMap<String, u32>,
    }

    impl StubTransfer {
        fn new(pages: &[(&str, &str)]) -> Self {
            Self {
                pages: pages
                    .iter()
                    .map(|(u, h)| (u.to_string(), h.to_string()))
                    .collect(),
                fetch_counts: HashMap::new(),
            }
        }

        fn fetches(&self, url: &str) -> u32 {
            self.fetch_counts.get(url).copied().unwrap_or(0)
        }
    }

    impl Transfer for StubTransfer {
        fn transfer(&mut self, url: &NewsUrl, _wanted: &[&str]) -> FetchResult {
            *self.fetch_counts.entry(url.to_string()).or_insert(0) += 1;
            match self.pages.get(url.as_str()) {
                Some(html) => FetchResult {
                    body: html.clone().into_bytes(),
                    headers: HashMap::new(),
                },
                None => FetchResult::default(),
            }
        }
    }

    fn open_host_filters(host: &str) -> CrawlFilters {
        let mut rules = HashMap::new();
        rules.insert(
            host.to_string(),
            HostRule {
                recurse_prefixes: vec!["/".to_string()],
                ..Default::default()
            },
        );
        CrawlFilters::new(rules, 2000)
    }

    fn page_html(title: &str, links: &[&str]) -> String {
        let anchors: String = links
            .iter()
            .map(|l| format!(r#"<a href="{l}">link</a>"#))
            .collect();
        format!("<html><head><title>{title}</title></head><body><p>Body text.</p>{anchors}</body></html>")
    }

    #[test]
    fn test_crawl_dedup_cycle() {
        let dir = TempDir::new().unwrap();
        let index = NewsIndex::open(dir.path().join("db")).unwrap();

        let u = "https://news.example/one";
        let v = "https://news.example/two";
        let stub = StubTransfer::new(&[
            // u links back to itself and on to v
            (u, &page_html("One", &[u, v])),
            // v links back to u
            (v, &page_html("Two", &[u])),
        ]);

        let seed = NewsUrl::parse(u).unwrap();
        let mut crawler = Crawler::with_transfer(
            index,
            stub,
            open_host_filters("news.example"),
            VecDeque::from([seed]),
            dir.path().join("queue.bin"),
            u64::MAX,
        );
        crawler.run().unwrap();

        assert_eq!(crawler.num_indexed(), 2);
        assert_eq!(crawler.index.num_documents().unwrap(), 2);
        assert!(crawler
            .index
            .contains(&NewsUrl::parse(u).unwrap())
            .unwrap());
        assert!(crawler
            .index
            .contains(&NewsUrl::parse(v).unwrap())
            .unwrap());

        // the cycle collapses: each page fetched exactly once
        assert_eq!(crawler.fetcher.fetches(u), 1);
        assert_eq!(crawler.fetcher.fetches(v), 1);

        let stats = crawler.stats();
        assert_eq!(stats.fetched, 2);
        assert_eq!(stats.indexed, 2);
        // only v was ever enqueued; the self-link was already indexed
        assert_eq!(stats.enqueued, 1);
        assert_eq!(stats.skipped_known, 0);
    }

    #[test]
    fn test_failed_fetch_is_skipped() {
        let dir = TempDir::new().unwrap();
        let index = NewsIndex::open(dir.path().join("db")).unwrap();

        let u = "https://news.example/alive";
        let dead = "https://news.example/dead";
        let stub = StubTransfer::new(&[(u, &page_html("Alive", &[dead]))]);

        let mut crawler = Crawler::with_transfer(
            index,
            stub,
            open_host_filters("news.example"),
            VecDeque::from([NewsUrl::parse(u).unwrap()]),
            dir.path().join("queue.bin"),
            u64::MAX,
        );
        crawler.run().unwrap();

        // the dead link was fetched, produced an empty page, and was
        // rejected by both page filters
        assert_eq!(crawler.fetcher.fetches(dead), 1);
        assert_eq!(crawler.num_indexed(), 1);
        assert_eq!(crawler.stats().empty_pages, 1);
    }

    #[test]
    fn test_index_limit_stops_crawl() {
        let dir = TempDir::new().unwrap();
        let index = NewsIndex::open(dir.path().join("db")).unwrap();

        let a = "https://news.example/a";
        let b = "https://news.example/b";
        let c = "https://news.example/c";
        let stub = StubTransfer::new(&[
            (a, &page_html("A", &[b, c])),
            (b, &page_html("B", &[])),
            (c, &page_html("C", &[])),
        ]);

        let mut crawler = Crawler::with_transfer(
            index,
            stub,
            open_host_filters("news.example"),
            VecDeque::from([NewsUrl::parse(a).unwrap()]),
            dir.path().join("queue.bin"),
            2,
        );
        crawler.run().unwrap();

        assert_eq!(crawler.num_indexed(), 2);
        // c never left the frontier
        assert_eq!(crawler.frontier_len(), 1);
    }

    #[test]
    fn test_interrupt_stops_promptly() {
        let dir = TempDir::new().unwrap();
        let index = NewsIndex::open(dir.path().join("db")).unwrap();

        let u = "https://news.example/one";
        let stub = StubTransfer::new(&[(u, &page_html("One", &[]))]);

        let mut crawler = Crawler::with_transfer(
            index,
            stub,
            open_host_filters("news.example"),
            VecDeque::from([NewsUrl::parse(u).unwrap()]),
            dir.path().join("queue.bin"),
            u64::MAX,
        );

        crawler.interrupt();
        crawler.run().unwrap();

        // nothing was processed: the flag is sampled before each pop
        assert_eq!(crawler.num_indexed(), 0);
        assert_eq!(crawler.frontier_len(), 1);
        assert_eq!(crawler.fetcher.fetches(u), 0);
    }

    #[test]
    fn test_frontier_saved_on_drop() {
        let dir = TempDir::new().unwrap();
        let queue_path = dir.path().join("queue.bin");

        {
            let index = NewsIndex::open(dir.path().join("db")).unwrap();
            let stub = StubTransfer::new(&[]);
            let crawler = Crawler::with_transfer(
                index,
                stub,
                open_host_filters("news.example"),
                VecDeque::from([
                    NewsUrl::parse("https://news.example/a").unwrap(),
                    NewsUrl::parse("https://news.example/b").unwrap(),
                ]),
                &queue_path,
                u64::MAX,
            );
            drop(crawler);
        }

        let restored = frontier::load(&queue_path).unwrap();
        assert_eq!(restored.len(), 2);
        assert_eq!(restored[0].to_string(), "https://news.example/a");
    }

    #[test]
    fn test_recrawl_skips_indexed_urls() {
        let dir = TempDir::new().unwrap();
        let queue_path = dir.path().join("queue.bin");
        let db_path = dir.path().join("db");

        let u = "https://news.example/one";

        {
            let index = NewsIndex::open(&db_path).unwrap();
            let stub = StubTransfer::new(&[(u, &page_html("One", &[]))]);
            let mut crawler = Crawler::with_transfer(
                index,
                stub,
                open_host_filters("news.example"),
                VecDeque::from([NewsUrl::parse(u).unwrap()]),
                &queue_path,
                u64::MAX,
            );
            crawler.run().unwrap();
            assert_eq!(crawler.num_indexed(), 1);
        }

        // second run over the same seed: the document is already there
        let index = NewsIndex::open(&db_path).unwrap();
        let stub = StubTransfer::new(&[(u, &page_html("One", &[]))]);
        let mut crawler = Crawler::with_transfer(
            index,
            stub,
            open_host_filters("news.example"),
            VecDeque::from([NewsUrl::parse(u).unwrap()]),
            &queue_path,
            u64::MAX,
        );
        crawler.run().unwrap();

        assert_eq!(crawler.num_indexed(), 0);
        assert_eq!(crawler.index.num_documents().unwrap(), 1);
    }

    #[test]
    fn test_outbound_links_enqueued_in_document_order() {
        let dir = TempDir::new().unwrap();
        let index = NewsIndex::open(dir.path().join("db")).unwrap();

        let a = "https://news.example/a";
        let stub = StubTransfer::new(&[(
            a,
            &page_html(
                "A",
                &[
                    "https://news.example/first",
                    "https://news.example/second",
                    "https://news.example/third",
                ],
            ),
        )]);

        let mut crawler = Crawler::with_transfer(
            index,
            stub,
            open_host_filters("news.example"),
            VecDeque::from([NewsUrl::parse(a).unwrap()]),
            dir.path().join("queue.bin"),
            // stop right after the seed so the frontier stays inspectable
            1,
        );
        crawler.run().unwrap();

        let queued: Vec<String> = crawler.frontier.iter().map(ToString::to_string).collect();
        assert_eq!(
            queued,
            vec![
                "https://news.example/first",
                "https://news.example/second",
                "https://news.example/third",
            ]
        );
    }
}
