//! The on-disk inverted full-text index
//!
//! [`NewsIndex`] is the single writer over one index directory. A
//! document's identity is the hash of its essential URL: adding a page
//! whose URL is already present replaces the stored document
//! atomically, and empty pages (no title, no text) are never stored.
//!
//! Reads inside this process see their own writes: mutating operations
//! mark the index dirty and the next read flushes pending changes
//! before searching. Separate read-only opens of the same directory see
//! the last committed snapshot. Changes are additionally flushed every
//! `NEWSWIRE_FLUSH_THRESHOLD` additions (default 10 000) and on drop.

pub mod schema;

use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use tantivy::collector::{Count, TopDocs};
use tantivy::query::TermQuery;
use tantivy::schema::{IndexRecordOption, Value};
use tantivy::{doc, DocAddress, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use thiserror::Error;

use crate::dates::{from_slot_u64, to_date_slot, to_slot_u64};
use crate::page::Webpage;
use crate::url::NewsUrl;

pub use schema::{hashid, NewsSchema, TOKENIZER_NAME};

/// Additions between automatic flushes, unless overridden by
/// `NEWSWIRE_FLUSH_THRESHOLD`.
const DEFAULT_FLUSH_THRESHOLD: u32 = 10_000;

/// Heap given to the tantivy writer before it spills segments.
const WRITER_HEAP_BYTES: usize = 50_000_000;

/// On-disk index errors; fatal to the current operation
#[derive(Error, Debug)]
pub enum IndexError {
    /// Directory creation or other filesystem failure
    #[error("index I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure inside the index engine
    #[error("index engine error: {0}")]
    Engine(#[from] tantivy::TantivyError),
}

/// Result type alias for index operations
pub type IndexResult<T> = std::result::Result<T, IndexError>;

/// Which end of the date order [`NewsIndex::shrink`] evicts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShrinkPolicy {
    /// Evict the documents with the smallest date slots
    OldestFirst,
    /// Evict the documents with the largest date slots
    NewestFirst,
}

/// A document as stored in the index
#[derive(Debug, Clone)]
pub struct IndexedDocument {
    /// Engine-assigned identifier, stable until the next commit
    pub docid: u64,
    /// The unique term the document is stored under
    pub hashid: String,
    /// Full URL, the part of `data` before the first tab
    pub url: String,
    pub title: String,
    pub date: NaiveDate,
    pub text: String,
    /// The display blob `"<url>\t<title>"`
    pub data: String,
}

impl IndexedDocument {
    /// The 8-character sortable `YYYYMMDD` form of the date slot
    pub fn date_slot(&self) -> String {
        to_date_slot(self.date)
    }
}

/// The mutable view of a document handed to update mutators
#[derive(Debug, Clone)]
pub struct DocUpdate {
    pub title: String,
    pub date: NaiveDate,
    pub text: String,
}

/// Single-writer handle over one on-disk index directory
pub struct NewsIndex {
    writer: IndexWriter,
    reader: IndexReader,
    fields: NewsSchema,
    dirty: bool,
    pending_adds: u32,
    flush_threshold: u32,
}

impl NewsIndex {
    /// Open an index directory, creating it if missing
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] when the directory cannot be created or
    /// the store cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> IndexResult<Self> {
        let path = path.as_ref();

        let index = if path.join("meta.json").exists() {
            Index::open_in_dir(path)?
        } else {
            fs::create_dir_all(path)?;
            let (schema, _) = NewsSchema::build();
            Index::create_in_dir(path, schema)?
        };

        NewsSchema::register_tokenizer(&index);
        let fields = NewsSchema::for_index(&index)?;

        let writer = index.writer(WRITER_HEAP_BYTES)?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        let flush_threshold = std::env::var("NEWSWIRE_FLUSH_THRESHOLD")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_FLUSH_THRESHOLD);

        Ok(Self {
            writer,
            reader,
            fields,
            dirty: false,
            pending_adds: 0,
            flush_threshold,
        })
    }

    /// Flush in-memory changes to disk and refresh the reader
    pub fn commit(&mut self) -> IndexResult<()> {
        self.writer.commit()?;
        self.reader.reload()?;
        self.dirty = false;
        self.pending_adds = 0;
        Ok(())
    }

    /// Make pending writes visible before a read
    fn refresh(&mut self) -> IndexResult<()> {
        if self.dirty {
            self.commit()?;
        }
        Ok(())
    }

    /// Number of stored documents
    pub fn num_documents(&mut self) -> IndexResult<u64> {
        self.refresh()?;
        Ok(self.reader.searcher().num_docs())
    }

    /// Add a webpage, replacing any existing document with the same
    /// essential URL
    ///
    /// Pages with neither title nor text are not stored.
    pub fn add(&mut self, page: &Webpage) -> IndexResult<()> {
        if page.is_empty() {
            return Ok(());
        }

        let hid = hashid(&page.url.essential());
        self.writer
            .delete_term(Term::from_field_text(self.fields.hashid, &hid));

        let data = format!("{}\t{}", page.url, page.title);
        self.writer.add_document(doc!(
            self.fields.hashid => hid,
            self.fields.title => page.title.clone(),
            self.fields.text => page.text.clone(),
            self.fields.date => to_slot_u64(page.date),
            self.fields.data => data,
        ))?;

        self.dirty = true;
        self.pending_adds += 1;
        if self.pending_adds >= self.flush_threshold {
            self.commit()?;
        }

        Ok(())
    }

    /// Whether a document with this URL is stored
    pub fn contains(&mut self, url: &NewsUrl) -> IndexResult<bool> {
        self.refresh()?;
        let query = self.hashid_query(url);
        let count = self.reader.searcher().search(&query, &Count)?;
        Ok(count > 0)
    }

    /// Look up a document by its URL
    pub fn get_by_url(&mut self, url: &NewsUrl) -> IndexResult<Option<IndexedDocument>> {
        self.refresh()?;
        let searcher = self.reader.searcher();
        let query = self.hashid_query(url);
        let hits = searcher.search(&query, &TopDocs::with_limit(1))?;

        match hits.first() {
            Some((_, address)) => Ok(Some(self.read_document(&searcher, *address)?)),
            None => Ok(None),
        }
    }

    /// Look up a document by the engine-assigned identifier returned
    /// in [`IndexedDocument::docid`]; valid until the next commit
    pub fn get_by_id(&mut self, docid: u64) -> IndexResult<Option<IndexedDocument>> {
        self.refresh()?;
        let searcher = self.reader.searcher();

        let segment_ord = (docid >> 32) as u32;
        let doc_id = docid as u32;
        let Some(segment) = searcher.segment_readers().get(segment_ord as usize) else {
            return Ok(None);
        };
        if doc_id >= segment.max_doc() {
            return Ok(None);
        }
        if let Some(alive) = segment.alive_bitset() {
            if alive.is_deleted(doc_id) {
                return Ok(None);
            }
        }

        let address = DocAddress::new(segment_ord, doc_id);
        Ok(Some(self.read_document(&searcher, address)?))
    }

    /// Delete the document with this URL; silently succeeds if absent
    pub fn remove(&mut self, url: &NewsUrl) -> IndexResult<()> {
        let hid = hashid(&url.essential());
        self.writer
            .delete_term(Term::from_field_text(self.fields.hashid, &hid));
        self.dirty = true;
        Ok(())
    }

    /// Delete every document the predicate selects
    ///
    /// The predicate runs over all documents first; deletion happens
    /// only after the iteration finishes. Returns the number of
    /// documents deleted.
    pub fn remove_if(
        &mut self,
        mut predicate: impl FnMut(&IndexedDocument) -> bool,
    ) -> IndexResult<u64> {
        self.refresh()?;
        let searcher = self.reader.searcher();

        let mut doomed = Vec::new();
        self.for_each_document(&searcher, |doc| {
            if predicate(&doc) {
                doomed.push(doc.hashid);
            }
            Ok(())
        })?;

        let count = doomed.len() as u64;
        for hid in doomed {
            self.writer
                .delete_term(Term::from_field_text(self.fields.hashid, &hid));
        }
        if count > 0 {
            self.dirty = true;
            self.commit()?;
        }

        Ok(count)
    }

    /// Apply a mutator to the document with this URL, replacing the
    /// stored document only if the mutator reports a modification
    ///
    /// Returns whether a replacement happened.
    pub fn update(
        &mut self,
        url: &NewsUrl,
        mutator: impl FnOnce(&mut DocUpdate) -> bool,
    ) -> IndexResult<bool> {
        let Some(stored) = self.get_by_url(url)? else {
            return Ok(false);
        };

        let mut fields = DocUpdate {
            title: stored.title,
            date: stored.date,
            text: stored.text,
        };
        if !mutator(&mut fields) {
            return Ok(false);
        }

        self.replace(url.clone(), fields)?;
        Ok(true)
    }

    /// Apply a mutator to every document, replacing those it modifies
    ///
    /// Returns the number of replaced documents.
    pub fn update_all(
        &mut self,
        mut mutator: impl FnMut(&mut DocUpdate) -> bool,
    ) -> IndexResult<u64> {
        self.refresh()?;
        let searcher = self.reader.searcher();

        let mut modified = Vec::new();
        self.for_each_document(&searcher, |doc| {
            let mut fields = DocUpdate {
                title: doc.title,
                date: doc.date,
                text: doc.text,
            };
            if mutator(&mut fields) {
                modified.push((doc.url, fields));
            }
            Ok(())
        })?;

        let mut count = 0;
        for (url, fields) in modified {
            match NewsUrl::parse(&url) {
                Ok(url) => {
                    self.replace(url, fields)?;
                    count += 1;
                }
                Err(e) => tracing::warn!(url = %url, error = %e, "stored URL unparsable, skipped"),
            }
        }

        Ok(count)
    }

    /// Evict documents by date order until at most `max_n` remain
    ///
    /// `OldestFirst` deletes the smallest date slots, `NewestFirst`
    /// the largest. Returns the number of evicted documents.
    pub fn shrink(&mut self, max_n: u64, policy: ShrinkPolicy) -> IndexResult<u64> {
        self.refresh()?;
        let searcher = self.reader.searcher();

        let num = searcher.num_docs();
        if num <= max_n {
            return Ok(0);
        }

        let mut ranked: Vec<(u64, DocAddress)> = Vec::with_capacity(num as usize);
        for (segment_ord, segment) in searcher.segment_readers().iter().enumerate() {
            let dates = segment.fast_fields().u64("date")?;
            let alive = segment.alive_bitset();
            for doc_id in 0..segment.max_doc() {
                if alive.map_or(false, |a| a.is_deleted(doc_id)) {
                    continue;
                }
                let slot = dates.first(doc_id).unwrap_or_default();
                ranked.push((slot, DocAddress::new(segment_ord as u32, doc_id)));
            }
        }

        match policy {
            ShrinkPolicy::OldestFirst => ranked.sort_by_key(|(slot, _)| *slot),
            ShrinkPolicy::NewestFirst => ranked.sort_by_key(|(slot, _)| std::cmp::Reverse(*slot)),
        }

        let excess = (num - max_n) as usize;
        for (_, address) in ranked.iter().take(excess) {
            let stored: TantivyDocument = searcher.doc(*address)?;
            let hid = get_str(&stored, self.fields.hashid);
            self.writer
                .delete_term(Term::from_field_text(self.fields.hashid, &hid));
        }

        self.dirty = true;
        self.commit()?;

        tracing::info!(evicted = excess, remaining = max_n, "index shrunk");
        Ok(excess as u64)
    }

    fn replace(&mut self, url: NewsUrl, fields: DocUpdate) -> IndexResult<()> {
        let page = Webpage {
            url,
            title: fields.title,
            date: fields.date,
            text: fields.text,
            outbound: Vec::new(),
        };
        if page.is_empty() {
            // A document reduced to nothing is no longer stored.
            return self.remove(&page.url);
        }
        self.add(&page)
    }

    fn hashid_query(&self, url: &NewsUrl) -> TermQuery {
        let hid = hashid(&url.essential());
        TermQuery::new(
            Term::from_field_text(self.fields.hashid, &hid),
            IndexRecordOption::Basic,
        )
    }

    fn read_document(
        &self,
        searcher: &tantivy::Searcher,
        address: DocAddress,
    ) -> IndexResult<IndexedDocument> {
        let stored: TantivyDocument = searcher.doc(address)?;
        let data = get_str(&stored, self.fields.data);
        let url = data.split('\t').next().unwrap_or_default().to_string();

        Ok(IndexedDocument {
            docid: (u64::from(address.segment_ord) << 32) | u64::from(address.doc_id),
            hashid: get_str(&stored, self.fields.hashid),
            url,
            title: get_str(&stored, self.fields.title),
            date: from_slot_u64(get_u64(&stored, self.fields.date)).unwrap_or_default(),
            text: get_str(&stored, self.fields.text),
            data,
        })
    }

    fn for_each_document(
        &self,
        searcher: &tantivy::Searcher,
        mut f: impl FnMut(IndexedDocument) -> IndexResult<()>,
    ) -> IndexResult<()> {
        for (segment_ord, segment) in searcher.segment_readers().iter().enumerate() {
            let alive = segment.alive_bitset();
            for doc_id in 0..segment.max_doc() {
                if alive.map_or(false, |a| a.is_deleted(doc_id)) {
                    continue;
                }
                let address = DocAddress::new(segment_ord as u32, doc_id);
                f(self.read_document(searcher, address)?)?;
            }
        }
        Ok(())
    }
}

impl Drop for NewsIndex {
    fn drop(&mut self) {
        if self.dirty {
            if let Err(e) = self.writer.commit() {
                tracing::error!(error = %e, "commit on teardown failed");
            }
        }
    }
}

fn get_str(doc: &TantivyDocument, field: tantivy::schema::Field) -> String {
    doc.get_first(field)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

fn get_u64(doc: &TantivyDocument, field: tantivy::schema::Field) -> u64 {
    doc.get_first(field)
        .and_then(|v| v.as_u64())
        .unwrap_or_default()
}
