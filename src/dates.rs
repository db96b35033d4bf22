//! Publication-date extraction
//!
//! Dates come from three places, tried in order: the HTTP `Date`
//! response header, a best-effort heuristic over the page itself
//! ([`DateFinder`]), and finally today's date so a page never fails for
//! want of a date.
//!
//! The free-text parser also serves the RSS/Atom updater, which sees
//! `pubDate`/`updated` strings in a wide range of English formats.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, Local, NaiveDate};
use regex::Regex;
use scraper::{Html, Selector};

use crate::url::NewsUrl;

/// The date formats accepted by [`parse_date_str`], tried in order.
/// `%B`/`%A` also accept the abbreviated month/weekday names when
/// parsing.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d", // 2025-02-01
    "%m/%d/%Y", // 01/02/2025 (American)
    "%B %d %Y",    // Feb 1 2025
    "%B %d, %Y",   // Feb 1, 2025
    "%d %B %Y",    // 1 Feb 2025
    "%d %B, %Y",   // 1 Feb, 2025
    "%A %d %B %Y",    // Sat 1 Feb 2025
    "%A, %d %B %Y",   // Sat, 1 Feb 2025
    "%A %B %d %Y",    // Sat Feb 1 2025
    "%A, %B %d %Y",   // Sat, Feb 1 2025
    "%A, %B %d, %Y",  // Sat, Feb 1, 2025
];

/// Try to parse a string that may hold a calendar date
///
/// The string is trimmed, runs of whitespace are collapsed to one
/// space, and ordinal suffixes (`1st`, `2nd`, `23rd`, `11th`) are
/// stripped before each format in [`DATE_FORMATS`] is attempted. The
/// first format that matches wins. RFC 2822 timestamps (RSS `pubDate`)
/// are accepted as a fallback.
pub fn parse_date_str(s: &str) -> Option<NaiveDate> {
    let spaces = Regex::new(r"\s+").unwrap();
    let ordinals = Regex::new(r"(\d)(st|nd|rd|th)\b").unwrap();

    let collapsed = spaces.replace_all(s.trim(), " ");
    let cleaned = ordinals.replace_all(&collapsed, "$1");

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(&cleaned, fmt) {
            return Some(date);
        }
    }

    // RSS pubDate carries a full RFC 2822 timestamp after the date.
    DateTime::parse_from_rfc2822(&cleaned)
        .ok()
        .map(|dt| dt.date_naive())
}

/// Parse the HTTP `Date` response header (RFC 7231)
///
/// The header is an RFC 2822 timestamp like
/// `Sat, 01 Feb 2025 12:00:00 GMT`; the time of day is discarded.
pub fn parse_http_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.date_naive());
    }
    // Tolerate a missing or mangled time part.
    NaiveDate::parse_from_str(s.get(..16)?.trim_end(), "%a, %d %b %Y").ok()
}

/// Format a date as the lexicographically sortable 8-character
/// `YYYYMMDD` form held in the index's date slot
pub fn to_date_slot(date: NaiveDate) -> String {
    format!("{:04}{:02}{:02}", date.year(), date.month(), date.day())
}

/// Numeric form of the date slot, used for the fast field and range
/// queries
pub fn to_slot_u64(date: NaiveDate) -> u64 {
    date.year() as u64 * 10_000 + date.month() as u64 * 100 + date.day() as u64
}

/// Parse the numeric slot form back into a date
pub fn from_slot_u64(slot: u64) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt((slot / 10_000) as i32, (slot / 100 % 100) as u32, (slot % 100) as u32)
}

/// Today, floored to days, in local time
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Best-effort publication-date heuristic over raw HTML and the URL
///
/// Inspects common metadata tags, `<time datetime>` attributes and
/// date-shaped URL path components. All calls are total: any internal
/// failure yields `None`.
pub struct DateFinder {
    meta: Selector,
    time: Selector,
    path_date: Regex,
}

/// Meta attributes that commonly carry the publication date, most
/// specific first.
const META_DATE_KEYS: &[&str] = &[
    "article:published_time",
    "datePublished",
    "parsely-pub-date",
    "publish-date",
    "pubdate",
    "date",
];

impl DateFinder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            meta: Selector::parse("meta[content]").unwrap(),
            time: Selector::parse("time[datetime]").unwrap(),
            path_date: Regex::new(r"(?:^|/)(\d{4})[-/](\d{1,2})[-/](\d{1,2})(?:$|/)").unwrap(),
        }
    }

    /// Derive a publication date from the page content and its URL
    pub fn find_date(&self, html: &str, url: &NewsUrl) -> Option<NaiveDate> {
        if html.is_empty() {
            return self.date_from_path(url.path());
        }

        let doc = Html::parse_document(html);

        for element in doc.select(&self.meta) {
            let value = element.value();
            let key = value
                .attr("property")
                .or_else(|| value.attr("name"))
                .or_else(|| value.attr("itemprop"))
                .unwrap_or_default();
            if !META_DATE_KEYS.iter().any(|k| key.eq_ignore_ascii_case(k)) {
                continue;
            }
            if let Some(date) = value.attr("content").and_then(parse_date_value) {
                return Some(date);
            }
        }

        for element in doc.select(&self.time) {
            if let Some(date) = element.value().attr("datetime").and_then(parse_date_value) {
                return Some(date);
            }
        }

        self.date_from_path(url.path())
    }

    fn date_from_path(&self, path: &str) -> Option<NaiveDate> {
        let caps = self.path_date.captures(path)?;
        let year: i32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let day: u32 = caps[3].parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, day)
    }
}

impl Default for DateFinder {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a metadata date value, which is usually ISO 8601 with an
/// optional time part
fn parse_date_value(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    // 2025-01-15T10:30:00Z and friends: the date is the first 10 chars.
    if let Some(prefix) = s.get(..10) {
        if let Ok(date) = NaiveDate::parse_from_str(prefix, "%Y-%m-%d") {
            return Some(date);
        }
    }
    parse_date_str(s)
}

/// Resolve the publication date for a fetched page
///
/// Ordered strategy: the HTTP `Date` header, then the [`DateFinder`]
/// heuristic, then today.
pub fn extract_date(
    headers: &HashMap<String, String>,
    html: &str,
    url: &NewsUrl,
    finder: &DateFinder,
) -> NaiveDate {
    if let Some(date) = headers.get("date").and_then(|v| parse_http_date(v)) {
        return date;
    }
    if let Some(date) = finder.find_date(html, url) {
        return date;
    }
    today()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_iso_format() {
        assert_eq!(parse_date_str("2025-02-01"), Some(d(2025, 2, 1)));
    }

    #[test]
    fn test_american_slashes() {
        // month first
        assert_eq!(parse_date_str("01/02/2025"), Some(d(2025, 1, 2)));
    }

    #[test]
    fn test_month_name_formats() {
        assert_eq!(parse_date_str("Feb 1 2025"), Some(d(2025, 2, 1)));
        assert_eq!(parse_date_str("Feb 1, 2025"), Some(d(2025, 2, 1)));
        assert_eq!(parse_date_str("1 Feb 2025"), Some(d(2025, 2, 1)));
        assert_eq!(parse_date_str("1 Feb, 2025"), Some(d(2025, 2, 1)));
        assert_eq!(parse_date_str("February 1, 2025"), Some(d(2025, 2, 1)));
    }

    #[test]
    fn test_weekday_formats() {
        assert_eq!(parse_date_str("Sat 1 Feb 2025"), Some(d(2025, 2, 1)));
        assert_eq!(parse_date_str("Sat, 1 Feb 2025"), Some(d(2025, 2, 1)));
        assert_eq!(parse_date_str("Sat Feb 1 2025"), Some(d(2025, 2, 1)));
        assert_eq!(parse_date_str("Sat, Feb 1 2025"), Some(d(2025, 2, 1)));
        assert_eq!(parse_date_str("Sat, Feb 1, 2025"), Some(d(2025, 2, 1)));
        assert_eq!(parse_date_str("Saturday, February 1, 2025"), Some(d(2025, 2, 1)));
    }

    #[test]
    fn test_ordinal_suffixes_stripped() {
        assert_eq!(parse_date_str("23rd March 2024"), Some(d(2024, 3, 23)));
        assert_eq!(parse_date_str("1st Feb 2025"), Some(d(2025, 2, 1)));
        assert_eq!(parse_date_str("22nd June 2024"), Some(d(2024, 6, 22)));
        assert_eq!(parse_date_str("August 11th, 2024"), Some(d(2024, 8, 11)));
    }

    #[test]
    fn test_ordinal_regex_leaves_words_alone() {
        // "August" must not lose its "st"
        assert_eq!(parse_date_str("4 August 2024"), Some(d(2024, 8, 4)));
    }

    #[test]
    fn test_whitespace_normalized() {
        assert_eq!(parse_date_str("  Sat,   Feb  1,  2025 "), Some(d(2025, 2, 1)));
        assert_eq!(parse_date_str("\t2025-02-01\n"), Some(d(2025, 2, 1)));
    }

    #[test]
    fn test_month_without_day_fails() {
        assert_eq!(parse_date_str("Feb 2025"), None);
    }

    #[test]
    fn test_garbage_fails() {
        assert_eq!(parse_date_str(""), None);
        assert_eq!(parse_date_str("not a date"), None);
        assert_eq!(parse_date_str("2021/2022/2023"), None);
    }

    #[test]
    fn test_rss_pub_date() {
        assert_eq!(
            parse_date_str("Mon, 03 Jun 2024 09:30:00 GMT"),
            Some(d(2024, 6, 3))
        );
        assert_eq!(
            parse_date_str("Tue, 04 Jun 2024 10:00:00 +0200"),
            Some(d(2024, 6, 4))
        );
    }

    #[test]
    fn test_http_date_header() {
        assert_eq!(
            parse_http_date("Sat, 01 Feb 2025 12:00:00 GMT"),
            Some(d(2025, 2, 1))
        );
        assert_eq!(parse_http_date("Sat, 01 Feb 2025"), Some(d(2025, 2, 1)));
        assert_eq!(parse_http_date("nonsense"), None);
    }

    #[test]
    fn test_date_slot_round_trip() {
        // every recognized format round-trips through the slot form
        for s in [
            "2025-02-01",
            "01/02/2025",
            "Feb 1 2025",
            "Sat, Feb 1, 2025",
            "23rd March 2024",
        ] {
            let date = parse_date_str(s).unwrap();
            let slot = to_date_slot(date);
            assert_eq!(slot.len(), 8, "slot for {s}");
            let back = NaiveDate::parse_from_str(&slot, "%Y%m%d").unwrap();
            assert_eq!(back, date, "round trip for {s}");
        }
    }

    #[test]
    fn test_slot_u64_round_trip() {
        let date = d(2025, 1, 16);
        assert_eq!(to_slot_u64(date), 20250116);
        assert_eq!(from_slot_u64(20250116), Some(date));
        assert_eq!(from_slot_u64(20251490), None);
    }

    #[test]
    fn test_slot_ordering_matches_date_ordering() {
        let earlier = to_date_slot(d(2024, 12, 31));
        let later = to_date_slot(d(2025, 1, 1));
        assert!(earlier < later);
    }

    #[test]
    fn test_finder_meta_published_time() {
        let finder = DateFinder::new();
        let url = NewsUrl::parse("https://example.com/story").unwrap();
        let html = r#"<html><head>
            <meta property="article:published_time" content="2025-01-15T10:30:00Z">
            </head><body></body></html>"#;
        assert_eq!(finder.find_date(html, &url), Some(d(2025, 1, 15)));
    }

    #[test]
    fn test_finder_meta_name_date() {
        let finder = DateFinder::new();
        let url = NewsUrl::parse("https://example.com/story").unwrap();
        let html = r#"<html><head><meta name="date" content="2025-01-15"></head></html>"#;
        assert_eq!(finder.find_date(html, &url), Some(d(2025, 1, 15)));
    }

    #[test]
    fn test_finder_time_element() {
        let finder = DateFinder::new();
        let url = NewsUrl::parse("https://example.com/story").unwrap();
        let html = r#"<html><body><time datetime="2024-06-03">June 3</time></body></html>"#;
        assert_eq!(finder.find_date(html, &url), Some(d(2024, 6, 3)));
    }

    #[test]
    fn test_finder_url_path() {
        let finder = DateFinder::new();
        let url = NewsUrl::parse("https://example.com/2024/11/03/markets-rally").unwrap();
        assert_eq!(finder.find_date("", &url), Some(d(2024, 11, 3)));
    }

    #[test]
    fn test_finder_rejects_implausible_path() {
        let finder = DateFinder::new();
        let url = NewsUrl::parse("https://example.com/2021/2022/2023").unwrap();
        assert_eq!(finder.find_date("<html></html>", &url), None);
    }

    #[test]
    fn test_extract_date_prefers_header() {
        let finder = DateFinder::new();
        let url = NewsUrl::parse("https://example.com/2024/11/03/story").unwrap();
        let mut headers = HashMap::new();
        headers.insert(
            "date".to_string(),
            "Sat, 01 Feb 2025 12:00:00 GMT".to_string(),
        );
        assert_eq!(extract_date(&headers, "", &url, &finder), d(2025, 2, 1));
    }

    #[test]
    fn test_extract_date_falls_back_to_finder_then_today() {
        let finder = DateFinder::new();
        let url = NewsUrl::parse("https://example.com/2024/11/03/story").unwrap();
        let headers = HashMap::new();
        assert_eq!(extract_date(&headers, "", &url, &finder), d(2024, 11, 3));

        let bare = NewsUrl::parse("https://example.com/story").unwrap();
        assert_eq!(extract_date(&headers, "", &bare, &finder), today());
    }
}
