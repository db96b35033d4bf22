//! Index schema and analyzer
//!
//! One document per page. The `hashid` field holds the unique term
//! `Q<sha256(essential url)>` under which a document is stored and
//! replaced; `title` and `text` are indexed with positions through a
//! stemming analyzer and both participate in untagged free-text
//! search; `date` is the sortable date slot backing range queries and
//! shrink ordering; `data` is the stored `"<url>\t<title>"` display
//! blob.

use sha2::{Digest, Sha256};
use tantivy::schema::{
    IndexRecordOption, Schema, TextFieldIndexing, TextOptions, FAST, INDEXED, STORED, STRING,
};
use tantivy::schema::Field;
use tantivy::tokenizer::{Language, LowerCaser, SimpleTokenizer, Stemmer, TextAnalyzer};

/// Name under which the stemming analyzer is registered. The same
/// analyzer is attached at index time and at query time; they must
/// match.
pub const TOKENIZER_NAME: &str = "en_stem";

/// Resolved fields of the news schema
#[derive(Debug, Clone, Copy)]
pub struct NewsSchema {
    pub hashid: Field,
    pub title: Field,
    pub text: Field,
    pub date: Field,
    pub data: Field,
}

impl NewsSchema {
    /// Build the schema for a fresh index
    pub fn build() -> (Schema, Self) {
        let mut builder = Schema::builder();

        let stemmed = TextOptions::default().set_indexing_options(
            TextFieldIndexing::default()
                .set_tokenizer(TOKENIZER_NAME)
                .set_index_option(IndexRecordOption::WithFreqsAndPositions),
        );

        // Exact-match boolean term, never tokenized.
        let hashid = builder.add_text_field("hashid", STRING | STORED);

        // Stored so documents can be rebuilt for replace-style updates.
        let title = builder.add_text_field("title", stemmed.clone().set_stored());
        let text = builder.add_text_field("text", stemmed.set_stored());

        let date = builder.add_u64_field("date", INDEXED | STORED | FAST);

        // Display blob only; never searched.
        let data = builder.add_text_field("data", STORED);

        let schema = builder.build();
        let fields = Self {
            hashid,
            title,
            text,
            date,
            data,
        };

        (schema, fields)
    }

    /// Resolve the fields from an already-opened index
    pub fn for_index(index: &tantivy::Index) -> tantivy::Result<Self> {
        let schema = index.schema();
        Ok(Self {
            hashid: schema.get_field("hashid")?,
            title: schema.get_field("title")?,
            text: schema.get_field("text")?,
            date: schema.get_field("date")?,
            data: schema.get_field("data")?,
        })
    }

    /// Register the stemming analyzer on an index handle
    ///
    /// Must be called right after creating or opening the index, on
    /// the write side and the read side alike.
    pub fn register_tokenizer(index: &tantivy::Index) {
        let analyzer = TextAnalyzer::builder(SimpleTokenizer::default())
            .filter(LowerCaser)
            .filter(Stemmer::new(Language::English))
            .build();

        index.tokenizers().register(TOKENIZER_NAME, analyzer);
    }
}

/// The unique boolean term under which a document is stored:
/// `"Q" ++ sha256(essential url)` in lowercase hex
pub fn hashid(essential: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(essential.as_bytes());
    format!("Q{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hashid_is_stable_and_prefixed() {
        let a = hashid("example.com/story");
        let b = hashid("example.com/story");
        assert_eq!(a, b);
        assert!(a.starts_with('Q'));
        assert_eq!(a.len(), 1 + 64);
    }

    #[test]
    fn test_hashid_distinguishes_urls() {
        assert_ne!(hashid("example.com/a"), hashid("example.com/b"));
    }

    #[test]
    fn test_schema_builds() {
        let (schema, fields) = NewsSchema::build();
        assert_eq!(schema.get_field("hashid").unwrap(), fields.hashid);
        assert_eq!(schema.get_field("date").unwrap(), fields.date);
    }
}
