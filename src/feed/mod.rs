//! RSS 2.0 and Atom feed ingestion
//!
//! The updater pulls article announcements out of the RSS/Atom feeds
//! of the configured news sources. Only three things matter per item:
//! the link, a title, and a publication date. Items without a usable
//! link are dropped; missing dates fall back to today. Item links are
//! resolved against the feed URL, so the occasional relative link
//! still works.

use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

use crate::dates::{parse_date_str, today};
use crate::page::Webpage;
use crate::url::NewsUrl;

/// Feed parsing errors
#[derive(Error, Debug)]
pub enum FeedError {
    /// The document is not well-formed XML
    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),
}

/// Which element of the current item is being read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemField {
    Title,
    Link,
    Date,
}

#[derive(Debug, Default)]
struct PendingItem {
    title: String,
    link: String,
    date_text: String,
}

/// Parse a feed document into metadata-only webpages
///
/// Handles RSS 2.0 (`rss > channel > item` with `title`, `link`,
/// `pubDate`) and Atom (`feed > entry` with `title`, `link href`,
/// `updated`). A document with neither shape yields an empty list.
///
/// # Errors
///
/// Returns [`FeedError::Xml`] when the document is not well-formed.
pub fn parse_feed(xml: &str, feed_url: &NewsUrl) -> Result<Vec<Webpage>, FeedError> {
    let mut reader = Reader::from_str(xml);

    let mut pages = Vec::new();
    let mut item: Option<PendingItem> = None;
    let mut field: Option<ItemField> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = e.local_name();
                match name.as_ref() {
                    b"item" | b"entry" => {
                        item = Some(PendingItem::default());
                        field = None;
                    }
                    b"title" if item.is_some() => field = Some(ItemField::Title),
                    b"link" if item.is_some() => {
                        field = Some(ItemField::Link);
                        // Atom carries the target in the href attribute
                        if let Some(href) = href_attribute(&e) {
                            if let Some(current) = item.as_mut() {
                                if current.link.is_empty() {
                                    current.link = href;
                                }
                            }
                        }
                    }
                    b"pubDate" | b"updated" if item.is_some() => field = Some(ItemField::Date),
                    _ => field = None,
                }
            }
            Event::Empty(e) => {
                // Atom's <link href="..."/> is usually self-closing
                if e.local_name().as_ref() == b"link" {
                    if let (Some(current), Some(href)) = (item.as_mut(), href_attribute(&e)) {
                        if current.link.is_empty() {
                            current.link = href;
                        }
                    }
                }
            }
            Event::Text(t) => {
                if let (Some(current), Some(field)) = (item.as_mut(), field) {
                    let text = t.unescape().unwrap_or_default();
                    append_field(current, field, &text);
                }
            }
            Event::CData(t) => {
                if let (Some(current), Some(field)) = (item.as_mut(), field) {
                    let text = String::from_utf8_lossy(&t).into_owned();
                    append_field(current, field, &text);
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"item" | b"entry" => {
                    if let Some(done) = item.take() {
                        if let Some(page) = finish_item(done, feed_url) {
                            pages.push(page);
                        }
                    }
                    field = None;
                }
                _ => field = None,
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(pages)
}

fn append_field(item: &mut PendingItem, field: ItemField, text: &str) {
    match field {
        ItemField::Title => item.title.push_str(text),
        ItemField::Link => item.link.push_str(text.trim()),
        ItemField::Date => item.date_text.push_str(text),
    }
}

fn href_attribute(e: &quick_xml::events::BytesStart<'_>) -> Option<String> {
    for attr in e.attributes().flatten() {
        if attr.key.local_name().as_ref() == b"href" {
            return Some(String::from_utf8_lossy(&attr.value).into_owned());
        }
    }
    None
}

fn finish_item(item: PendingItem, feed_url: &NewsUrl) -> Option<Webpage> {
    // the link is the one thing an item cannot do without
    if item.link.is_empty() {
        return None;
    }
    let url = match feed_url.resolve(&item.link) {
        Ok(url) => url,
        Err(e) => {
            tracing::debug!(link = %item.link, error = %e, "feed item link dropped");
            return None;
        }
    };

    let date = parse_date_str(&item.date_text).unwrap_or_else(today);
    Some(Webpage::from_metadata(url, item.title.trim(), date))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn feed_url() -> NewsUrl {
        NewsUrl::parse("https://feeds.example.com/business.xml").unwrap()
    }

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Business News</title>
    <link>https://news.example.com</link>
    <item>
      <title>Markets Rally</title>
      <link>https://news.example.com/2024/06/03/markets-rally</link>
      <pubDate>Mon, 03 Jun 2024 09:30:00 GMT</pubDate>
    </item>
    <item>
      <title><![CDATA[Fed Holds Rates]]></title>
      <link>https://news.example.com/2024/06/04/fed-holds</link>
      <pubDate>Tue, 04 Jun 2024 10:00:00 GMT</pubDate>
    </item>
    <item>
      <title>No link, dropped</title>
      <pubDate>Tue, 04 Jun 2024 10:00:00 GMT</pubDate>
    </item>
  </channel>
</rss>"#;

    const ATOM: &str = r#"<?xml version="1.0"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Business Feed</title>
  <entry>
    <title>Earnings Season Opens</title>
    <link href="https://news.example.com/2024/07/01/earnings-open"/>
    <updated>2024-07-01T08:00:00Z</updated>
  </entry>
  <entry>
    <title>Relative Link Entry</title>
    <link href="/2024/07/02/relative-entry"/>
    <updated>2024-07-02T08:00:00Z</updated>
  </entry>
</feed>"#;

    #[test]
    fn test_rss_items() {
        let pages = parse_feed(RSS, &feed_url()).unwrap();
        assert_eq!(pages.len(), 2);

        assert_eq!(pages[0].title, "Markets Rally");
        assert_eq!(
            pages[0].url.to_string(),
            "https://news.example.com/2024/06/03/markets-rally"
        );
        assert_eq!(pages[0].date, NaiveDate::from_ymd_opt(2024, 6, 3).unwrap());
        assert!(pages[0].text.is_empty());

        // CDATA title survives
        assert_eq!(pages[1].title, "Fed Holds Rates");
    }

    #[test]
    fn test_atom_entries() {
        let pages = parse_feed(ATOM, &feed_url()).unwrap();
        assert_eq!(pages.len(), 2);

        assert_eq!(pages[0].title, "Earnings Season Opens");
        assert_eq!(
            pages[0].url.to_string(),
            "https://news.example.com/2024/07/01/earnings-open"
        );
        assert_eq!(pages[0].date, NaiveDate::from_ymd_opt(2024, 7, 1).unwrap());

        // relative href resolves against the feed URL
        assert_eq!(
            pages[1].url.to_string(),
            "https://feeds.example.com/2024/07/02/relative-entry"
        );
    }

    #[test]
    fn test_missing_date_falls_back_to_today() {
        let xml = r#"<rss version="2.0"><channel><item>
            <title>T</title>
            <link>https://news.example.com/x</link>
            </item></channel></rss>"#;
        let pages = parse_feed(xml, &feed_url()).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].date, today());
    }

    #[test]
    fn test_not_a_feed() {
        let pages = parse_feed("<html><body>hello</body></html>", &feed_url()).unwrap();
        assert!(pages.is_empty());
    }

    #[test]
    fn test_malformed_xml_errors() {
        assert!(parse_feed("<rss><channel><item></rss>", &feed_url()).is_err());
    }

    #[test]
    fn test_feed_level_title_not_mistaken_for_item() {
        // the channel title sits outside any item and must not leak in
        let pages = parse_feed(RSS, &feed_url()).unwrap();
        assert!(pages.iter().all(|p| p.title != "Business News"));
    }
}
