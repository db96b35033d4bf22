//! HTML parsing with streamed text accumulation
//!
//! [`HtmlParser`] is a reusable handle (its selectors are compiled
//! once) that turns raw response bytes into an [`HtmlDoc`]: the page
//! title, every `href` in document order, and the concatenation of all
//! text nodes in document order. Malformed HTML is accepted; the result
//! is best-effort. Empty input yields an empty document.

use encoding_rs::{UTF_8, WINDOWS_1252};
use scraper::{Html, Selector};

/// A parsed page reduced to the parts the crawler cares about
///
/// Owned by the producing parse call; dropped with the containing
/// webpage.
#[derive(Debug, Default, Clone)]
pub struct HtmlDoc {
    title: String,
    text: String,
    hrefs: Vec<String>,
}

impl HtmlDoc {
    /// Content of the `<title>` element, or empty
    pub fn title(&self) -> &str {
        &self.title
    }

    /// All text node character data, concatenated in document order
    ///
    /// Case is preserved; the index lowercases at term time.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The `href` attribute of every `<a>` element in document order,
    /// including malformed ones; filtering happens in the webpage
    pub fn hrefs(&self) -> &[String] {
        &self.hrefs
    }

    /// True when the page carries neither a title nor any text
    pub fn is_empty(&self) -> bool {
        self.title.is_empty() && self.text.is_empty()
    }
}

/// Reusable HTML parser handle
pub struct HtmlParser {
    title: Selector,
    anchors: Selector,
}

impl HtmlParser {
    #[must_use]
    pub fn new() -> Self {
        Self {
            title: Selector::parse("title").unwrap(),
            anchors: Selector::parse("a").unwrap(),
        }
    }

    /// Decode fetched bytes to UTF-8
    ///
    /// Tries UTF-8 first; bodies that clearly are not UTF-8 fall back
    /// to Windows-1252, which covers the remaining western news sites.
    pub fn decode(&self, bytes: &[u8]) -> String {
        if bytes.is_empty() {
            return String::new();
        }

        let (text, _, had_errors) = UTF_8.decode(bytes);
        if !had_errors {
            return text.into_owned();
        }

        let (text, _, _) = WINDOWS_1252.decode(bytes);
        text.into_owned()
    }

    /// Parse raw response bytes into an [`HtmlDoc`]
    pub fn parse(&self, bytes: &[u8]) -> HtmlDoc {
        self.parse_str(&self.decode(bytes))
    }

    /// Parse an already-decoded HTML string
    pub fn parse_str(&self, html: &str) -> HtmlDoc {
        if html.is_empty() {
            return HtmlDoc::default();
        }

        let dom = Html::parse_document(html);

        let title = dom
            .select(&self.title)
            .next()
            .map(|t| t.text().collect::<String>().trim().to_string())
            .unwrap_or_default();

        // One pass over the tree; the accumulated string is the only
        // per-document allocation that grows with page size.
        let text: String = dom.root_element().text().collect();

        let hrefs = dom
            .select(&self.anchors)
            .filter_map(|a| a.value().attr("href"))
            .map(str::to_string)
            .collect();

        HtmlDoc { title, text, hrefs }
    }
}

impl Default for HtmlParser {
    fn default() -> Self {
        Self::new()
    }
}
