//! The link ledger: every article link ever seen, persisted across runs.
//!
//! The ledger file is an append-only, newline-delimited list of links. It is
//! loaded into memory at the start of a crawl, extended as pages are absorbed,
//! and appended to in one write when the crawl finishes. Links are never
//! removed.
//!
//! If a run dies between discovering links and [`Ledger::persist`], the next
//! run rediscovers those links and they may be notified twice. That is the
//! accepted cost of keeping the ledger append-only.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};

use crate::error::LedgerError;
use crate::models::Link;
use crate::utils::parse_lines;

/// In-memory view of the ledger file plus the links not yet written to it.
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    links: HashSet<Link>,
    /// Links merged since the last persist, in merge order.
    pending: Vec<Link>,
    /// Whether the file on disk is empty or ends with a newline.
    ends_with_newline: bool,
}

impl Ledger {
    /// Load the ledger stored at `path`.
    ///
    /// A missing file is the normal first-run state and yields an empty ledger.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref().to_path_buf();
        let contents = match fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No ledger file yet; starting with an empty ledger");
                String::new()
            }
            Err(source) => return Err(LedgerError::Io { path, source }),
        };

        let ends_with_newline = contents.is_empty() || contents.ends_with('\n');
        let links: HashSet<Link> = parse_lines(&contents).into_iter().collect();
        info!(count = links.len(), "Loaded known links");

        Ok(Self {
            path,
            links,
            pending: Vec::new(),
            ends_with_newline,
        })
    }

    /// Whether `link` has been seen before, either on disk or merged this run.
    pub fn contains(&self, link: &str) -> bool {
        self.links.contains(link)
    }

    /// Extend the ledger in memory. Links already known are ignored.
    pub fn merge<I>(&mut self, links: I)
    where
        I: IntoIterator<Item = Link>,
    {
        for link in links {
            if self.links.insert(link.clone()) {
                self.pending.push(link);
            }
        }
    }

    /// Append the links merged since the last persist to the ledger file.
    ///
    /// The whole append happens in a single open/write/flush. Returns how many
    /// links were written; calling it again without new merges writes nothing.
    #[instrument(level = "info", skip_all, fields(path = %self.path.display(), pending = self.pending.len()))]
    pub async fn persist(&mut self) -> Result<usize, LedgerError> {
        if self.pending.is_empty() {
            debug!("Nothing new to persist");
            return Ok(0);
        }

        let mut buf = String::new();
        if !self.ends_with_newline {
            buf.push('\n');
        }
        for link in &self.pending {
            buf.push_str(link);
            buf.push('\n');
        }

        let io_err = |source| LedgerError::Io {
            path: self.path.clone(),
            source,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(io_err)?;
        file.write_all(buf.as_bytes()).await.map_err(io_err)?;
        file.flush().await.map_err(io_err)?;

        let written = self.pending.len();
        self.pending.clear();
        self.ends_with_newline = true;
        info!(written, total = self.links.len(), "Persisted new links to ledger");
        Ok(written)
    }

    /// Links merged but not yet persisted, in merge order.
    pub fn pending(&self) -> &[Link] {
        &self.pending
    }

    /// Number of known links, persisted or not.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn links(items: &[&str]) -> Vec<Link> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_missing_file_is_empty_ledger() {
        let dir = tempdir().unwrap();
        let ledger = Ledger::load(dir.path().join("known_links.txt")).await.unwrap();
        assert!(ledger.is_empty());
        assert!(!ledger.contains("https://example.com/a"));
    }

    #[tokio::test]
    async fn test_load_trims_and_skips_blank_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("known_links.txt");
        std::fs::write(&path, "\nhttps://example.com/a\n\nhttps://example.com/b  \n").unwrap();

        let ledger = Ledger::load(&path).await.unwrap();
        assert_eq!(ledger.len(), 2);
        assert!(ledger.contains("https://example.com/a"));
        assert!(ledger.contains("https://example.com/b"));
    }

    #[tokio::test]
    async fn test_exact_match_only() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("known_links.txt");
        std::fs::write(&path, "https://example.com/a/\n").unwrap();

        let ledger = Ledger::load(&path).await.unwrap();
        assert!(ledger.contains("https://example.com/a/"));
        assert!(!ledger.contains("https://example.com/a"));
        assert!(!ledger.contains("https://example.com/a/?utm=x"));
    }

    #[tokio::test]
    async fn test_merge_ignores_known_links() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("known_links.txt");
        std::fs::write(&path, "https://example.com/a\n").unwrap();

        let mut ledger = Ledger::load(&path).await.unwrap();
        ledger.merge(links(&[
            "https://example.com/a",
            "https://example.com/b",
            "https://example.com/b",
        ]));
        assert_eq!(ledger.pending(), links(&["https://example.com/b"]).as_slice());
        assert_eq!(ledger.len(), 2);
    }

    #[tokio::test]
    async fn test_persist_appends_only_new_links() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("known_links.txt");
        std::fs::write(&path, "https://example.com/a\n").unwrap();

        let mut ledger = Ledger::load(&path).await.unwrap();
        ledger.merge(links(&["https://example.com/a", "https://example.com/b"]));
        assert_eq!(ledger.persist().await.unwrap(), 1);
        assert_eq!(ledger.persist().await.unwrap(), 0);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "https://example.com/a\nhttps://example.com/b\n");
    }

    #[tokio::test]
    async fn test_persist_adds_separator_when_missing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("known_links.txt");
        std::fs::write(&path, "https://example.com/a").unwrap();

        let mut ledger = Ledger::load(&path).await.unwrap();
        ledger.merge(links(&["https://example.com/b"]));
        ledger.persist().await.unwrap();

        let reloaded = Ledger::load(&path).await.unwrap();
        assert_eq!(reloaded.len(), 2);
        assert!(reloaded.contains("https://example.com/a"));
        assert!(reloaded.contains("https://example.com/b"));
    }

    #[tokio::test]
    async fn test_ledger_grows_monotonically_across_runs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("known_links.txt");

        let mut first = Ledger::load(&path).await.unwrap();
        first.merge(links(&["https://example.com/1", "https://example.com/2"]));
        first.persist().await.unwrap();

        let mut second = Ledger::load(&path).await.unwrap();
        assert_eq!(second.len(), 2);
        second.merge(links(&["https://example.com/3"]));
        second.persist().await.unwrap();

        let third = Ledger::load(&path).await.unwrap();
        assert_eq!(third.len(), 3);
        for link in ["https://example.com/1", "https://example.com/2", "https://example.com/3"] {
            assert!(third.contains(link));
        }
    }

    #[tokio::test]
    async fn test_unpersisted_merge_is_lost_on_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("known_links.txt");

        let mut ledger = Ledger::load(&path).await.unwrap();
        ledger.merge(links(&["https://example.com/1"]));
        drop(ledger);

        let reloaded = Ledger::load(&path).await.unwrap();
        assert!(!reloaded.contains("https://example.com/1"));
    }
}
