use std::path::PathBuf;
use std::sync::atomic::Ordering;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use newswire::config::Config;
use newswire::crawler::Crawler;
use newswire::feed::parse_feed;
use newswire::fetch::{Fetcher, Transfer};
use newswire::index::{NewsIndex, ShrinkPolicy};
use newswire::search::Searcher;
use newswire::url::NewsUrl;

#[derive(Parser)]
#[command(
    name = "newswire",
    version,
    about = "Business-news crawler and full-text search backend",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (TOML); built-in defaults otherwise
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl the configured news sources into the index
    Crawl {
        /// Index directory
        db_path: PathBuf,

        /// Where the frontier is saved on interrupt
        queue_path: PathBuf,

        /// Resume from the saved frontier instead of the seed list
        #[arg(long)]
        load_queue: bool,

        /// Stop after this many newly indexed documents
        #[arg(long)]
        limit: Option<u64>,
    },

    /// Search the index
    Search {
        /// Index directory
        db_path: PathBuf,

        /// Query terms; date ranges as MM/DD/YYYY..MM/DD/YYYY
        #[arg(required = true)]
        terms: Vec<String>,

        /// Number of results to return
        #[arg(short = 'n', long, default_value_t = 24)]
        max_results: usize,
    },

    /// Ingest RSS/Atom feeds, then evict the oldest documents
    Update {
        /// Index directory
        db_path: PathBuf,

        /// Maximum number of feed items to add
        #[arg(long, default_value_t = 1000)]
        num_to_add: u64,

        /// Shrink the index to at most this many documents
        #[arg(long, default_value_t = 100_000)]
        max_num: u64,
    },

    /// Remove documents: named URLs, or a probabilistic purge
    Remove {
        /// Index directory
        db_path: PathBuf,

        /// "purge", or one or more URLs to remove
        #[arg(required = true)]
        targets: Vec<String>,
    },

    /// Print the per-host distribution of indexed documents
    Stats {
        /// Index directory
        db_path: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_tracing(cli.verbose);

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Crawl {
            db_path,
            queue_path,
            load_queue,
            limit,
        } => crawl(&config, db_path, queue_path, load_queue, limit),
        Commands::Search {
            db_path,
            terms,
            max_results,
        } => search(db_path, &terms, max_results),
        Commands::Update {
            db_path,
            num_to_add,
            max_num,
        } => update(&config, db_path, num_to_add, max_num),
        Commands::Remove { db_path, targets } => remove(&config, db_path, &targets),
        Commands::Stats { db_path } => stats(db_path),
    }
}

fn setup_tracing(verbose: bool) {
    let default = if verbose {
        "newswire=debug,info"
    } else {
        "newswire=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn crawl(
    config: &Config,
    db_path: PathBuf,
    queue_path: PathBuf,
    load_queue: bool,
    limit: Option<u64>,
) -> Result<()> {
    let mut config = config.clone();
    if limit.is_some() {
        config.crawler.index_limit = limit;
    }

    let index = NewsIndex::open(&db_path)
        .with_context(|| format!("opening index at {}", db_path.display()))?;

    let mut crawler = if load_queue {
        Crawler::resume(index, &queue_path, &config)?
    } else {
        Crawler::from_seeds(index, &queue_path, &config)?
    };

    let interrupted = crawler.interrupt_handle();
    ctrlc::set_handler(move || {
        interrupted.store(true, Ordering::Relaxed);
    })
    .context("installing SIGINT handler")?;

    println!("Indexing started. Press Ctrl+C to interrupt.");
    crawler.run()?;
    println!("indexed {} documents", crawler.num_indexed());

    // dropping the crawler saves the frontier and commits the index
    Ok(())
}

fn search(db_path: PathBuf, terms: &[String], max_results: usize) -> Result<()> {
    let searcher = Searcher::open(&db_path)
        .with_context(|| format!("opening index at {}", db_path.display()))?
        .with_max_results(max_results);

    let query = terms.join(" ");
    let hits = searcher
        .query(&query, None)
        .with_context(|| format!("query: {query}"))?;

    println!("found {} results", hits.len());
    for hit in &hits {
        println!("{}", hit.data);
        println!("{}", searcher.keywords(hit).join(" "));
        println!();
    }

    Ok(())
}

fn update(config: &Config, db_path: PathBuf, num_to_add: u64, max_num: u64) -> Result<()> {
    if max_num < 10_000 {
        bail!("refusing to shrink the index below 10000 documents (got {max_num})");
    }

    let mut index = NewsIndex::open(&db_path)
        .with_context(|| format!("opening index at {}", db_path.display()))?;
    let mut fetcher = Fetcher::new()?;

    let mut added = 0u64;
    'feeds: for feed in &config.feeds {
        let feed_url = NewsUrl::parse(feed)?;
        let result = fetcher.transfer(&feed_url, &[]);
        if result.body.is_empty() {
            tracing::warn!(feed = %feed_url, "feed fetch failed");
            continue;
        }

        let xml = String::from_utf8_lossy(&result.body);
        let pages = match parse_feed(&xml, &feed_url) {
            Ok(pages) => pages,
            Err(e) => {
                tracing::warn!(feed = %feed_url, error = %e, "feed parse failed");
                continue;
            }
        };

        for page in pages {
            if added >= num_to_add {
                break 'feeds;
            }
            if index.contains(&page.url)? {
                continue;
            }
            index.add(&page)?;
            added += 1;
            tracing::info!(url = %page.url, "feed item indexed");
        }
    }

    let evicted = index.shrink(max_num, ShrinkPolicy::OldestFirst)?;
    println!("added {added} documents, evicted {evicted}");

    Ok(())
}

fn remove(config: &Config, db_path: PathBuf, targets: &[String]) -> Result<()> {
    let mut index = NewsIndex::open(&db_path)
        .with_context(|| format!("opening index at {}", db_path.display()))?;

    if targets.len() == 1 && targets[0] == "purge" {
        use rand::Rng;

        let probabilities = config.purge.clone();
        let mut rng = rand::thread_rng();

        println!("purging...");
        let removed = index.remove_if(|doc| {
            let Ok(url) = NewsUrl::parse(&doc.url) else {
                return false;
            };
            probabilities
                .get(url.host())
                .is_some_and(|p| rng.gen::<f32>() < *p)
        })?;
        println!("purged {removed} documents");
        return Ok(());
    }

    for target in targets {
        let url = NewsUrl::parse(target)?;
        if index.get_by_url(&url)?.is_none() {
            eprintln!("{target} not found");
            continue;
        }
        index.remove(&url)?;
        println!("rm {target}");
    }

    Ok(())
}

fn stats(db_path: PathBuf) -> Result<()> {
    use std::collections::HashMap;

    let mut index = NewsIndex::open(&db_path)
        .with_context(|| format!("opening index at {}", db_path.display()))?;

    let total = index.num_documents()?;
    println!("{total} documents total");
    if total == 0 {
        return Ok(());
    }

    let mut host_counts: HashMap<String, u64> = HashMap::new();
    // a read-only pass: the predicate never selects anything
    index.remove_if(|doc| {
        if let Ok(url) = NewsUrl::parse(&doc.url) {
            *host_counts.entry(url.host().to_string()).or_insert(0) += 1;
        }
        false
    })?;

    let mut ranked: Vec<(String, u64)> = host_counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    for (host, count) in ranked {
        let share = 100.0 * count as f64 / total as f64;
        println!("{host}: {count} ({share:.1}%)");
    }

    Ok(())
}
