//! The batch artifact handed from the crawl stage to the dispatch stage.
//!
//! A newline-delimited list of the links discovered by one crawl run. The
//! crawl truncates it on start and appends each absorbed page; the dispatch
//! stage reads it back verbatim.

use std::path::{Path, PathBuf};

use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};

use crate::models::Link;
use crate::utils::read_lines;

/// Append-only writer over a freshly truncated batch file.
#[derive(Debug)]
pub struct BatchWriter {
    path: PathBuf,
    file: File,
    written: usize,
}

impl BatchWriter {
    /// Create (or truncate) the batch file at `path`.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub async fn create(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .await?;
        info!("Batch file reset");
        Ok(Self {
            path,
            file,
            written: 0,
        })
    }

    /// Append `links` to the batch, one per line.
    pub async fn append(&mut self, links: &[Link]) -> std::io::Result<()> {
        if links.is_empty() {
            return Ok(());
        }
        let mut buf = String::new();
        for link in links {
            buf.push_str(link);
            buf.push('\n');
        }
        self.file.write_all(buf.as_bytes()).await?;
        self.file.flush().await?;
        self.written += links.len();
        debug!(
            path = %self.path.display(),
            appended = links.len(),
            total = self.written,
            "Appended links to batch"
        );
        Ok(())
    }

    /// Number of links written since the file was truncated.
    pub fn written(&self) -> usize {
        self.written
    }
}

/// Read the batch written by the last crawl.
///
/// Returns `Ok(None)` when no batch file exists.
pub async fn read_batch(path: &Path) -> std::io::Result<Option<Vec<Link>>> {
    read_lines(path).await
}

/// Truncate the batch file once its links have been delivered.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn clear_batch(path: &Path) -> std::io::Result<()> {
    BatchWriter::create(path).await.map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_create_truncates_previous_batch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("new_links.txt");
        std::fs::write(&path, "https://example.com/stale\n").unwrap();

        let writer = BatchWriter::create(&path).await.unwrap();
        assert_eq!(writer.written(), 0);
        assert_eq!(read_batch(&path).await.unwrap(), Some(vec![]));
    }

    #[tokio::test]
    async fn test_append_keeps_order_across_pages() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("new_links.txt");

        let mut writer = BatchWriter::create(&path).await.unwrap();
        writer
            .append(&["https://example.com/1".to_string(), "https://example.com/2".to_string()])
            .await
            .unwrap();
        writer.append(&[]).await.unwrap();
        writer.append(&["https://example.com/3".to_string()]).await.unwrap();
        assert_eq!(writer.written(), 3);

        let batch = read_batch(&path).await.unwrap().unwrap();
        assert_eq!(
            batch,
            vec!["https://example.com/1", "https://example.com/2", "https://example.com/3"]
        );
    }

    #[tokio::test]
    async fn test_read_missing_batch() {
        let dir = tempdir().unwrap();
        assert_eq!(read_batch(&dir.path().join("nope.txt")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_clear_batch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("new_links.txt");
        std::fs::write(&path, "https://example.com/1\n").unwrap();

        clear_batch(&path).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }
}
