//! Frontier persistence
//!
//! The queue of URLs awaiting processing survives interrupts in a
//! small binary file:
//!
//! ```text
//! uint32 count                     (little-endian)
//! repeat count times:
//!     uint32 url_byte_length
//!     bytes  url_byte_length       (UTF-8, no trailing NUL)
//! ```
//!
//! Loading a missing or unreadable queue file fails the startup.
//! Saving replaces the whole file atomically through a temp-file
//! rename.

use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;

use crate::url::NewsUrl;

/// Load a previously saved frontier
///
/// # Errors
///
/// Fails when the queue file does not exist, cannot be read, or holds
/// an entry that is not a valid absolute URL.
pub fn load(path: &Path) -> io::Result<VecDeque<NewsUrl>> {
    let file = File::open(path).map_err(|e| {
        io::Error::new(
            e.kind(),
            format!("queue file does not exist or cannot be opened: {}", path.display()),
        )
    })?;
    let mut reader = BufReader::new(file);

    let count = read_u32(&mut reader)?;
    let mut frontier = VecDeque::with_capacity(count as usize);

    for _ in 0..count {
        let len = read_u32(&mut reader)? as usize;
        let mut buf = vec![0u8; len];
        reader.read_exact(&mut buf)?;

        let raw = String::from_utf8(buf)
            .map_err(|e| io::Error::new(ErrorKind::InvalidData, format!("queue entry: {e}")))?;
        let url = NewsUrl::parse(&raw)
            .map_err(|e| io::Error::new(ErrorKind::InvalidData, format!("queue entry: {e}")))?;

        frontier.push_back(url);
    }

    Ok(frontier)
}

/// Save the frontier, replacing any previous file
pub fn save(path: &Path, frontier: &VecDeque<NewsUrl>) -> io::Result<()> {
    let tmp = path.with_extension("tmp");

    {
        let file = File::create(&tmp)?;
        let mut writer = BufWriter::new(file);

        writer.write_all(&(frontier.len() as u32).to_le_bytes())?;
        for url in frontier {
            let bytes = url.as_str().as_bytes();
            writer.write_all(&(bytes.len() as u32).to_le_bytes())?;
            writer.write_all(bytes)?;
        }
        writer.flush()?;
    }

    fs::rename(&tmp, path)
}

fn read_u32(reader: &mut impl Read) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn url(s: &str) -> NewsUrl {
        NewsUrl::parse(s).unwrap()
    }

    #[test]
    fn test_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("queue.bin");

        let frontier: VecDeque<NewsUrl> = [
            url("https://example.com/a"),
            url("https://example.com/b/c"),
            url("https://other.example/with/longer/path"),
        ]
        .into();

        save(&path, &frontier).unwrap();
        let loaded = load(&path).unwrap();

        assert_eq!(loaded.len(), 3);
        let urls: Vec<String> = loaded.iter().map(ToString::to_string).collect();
        assert_eq!(
            urls,
            vec![
                "https://example.com/a",
                "https://example.com/b/c",
                "https://other.example/with/longer/path",
            ]
        );
    }

    #[test]
    fn test_empty_frontier() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("queue.bin");

        save(&path, &VecDeque::new()).unwrap();
        assert!(load(&path).unwrap().is_empty());
    }

    #[test]
    fn test_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        assert!(load(&dir.path().join("absent.bin")).is_err());
    }

    #[test]
    fn test_truncated_file_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("queue.bin");

        // claims one entry of 100 bytes but holds none
        let mut bytes = 1u32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&100u32.to_le_bytes());
        fs::write(&path, bytes).unwrap();

        assert!(load(&path).is_err());
    }

    #[test]
    fn test_invalid_url_entry_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("queue.bin");

        let entry = b"not-an-absolute-url";
        let mut bytes = 1u32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&(entry.len() as u32).to_le_bytes());
        bytes.extend_from_slice(entry);
        fs::write(&path, bytes).unwrap();

        assert!(load(&path).is_err());
    }

    #[test]
    fn test_save_overwrites_previous_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("queue.bin");

        let first: VecDeque<NewsUrl> = [url("https://example.com/a")].into();
        let second: VecDeque<NewsUrl> = [url("https://example.com/b")].into();

        save(&path, &first).unwrap();
        save(&path, &second).unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].to_string(), "https://example.com/b");
    }
}
