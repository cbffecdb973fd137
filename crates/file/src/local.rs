//! Local dump file sink

use anyhow::{Context, Result};
use async_trait::async_trait;
use chunk_sink::{ChunkSink, SinkError, Transfer};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

enum Writer {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

impl Writer {
    fn write_all(&mut self, chunk: &[u8]) -> std::io::Result<()> {
        match self {
            Writer::Plain(w) => w.write_all(chunk),
            Writer::Gzip(w) => w.write_all(chunk),
        }
    }

    fn close(self) -> std::io::Result<()> {
        match self {
            Writer::Plain(mut w) => w.flush(),
            Writer::Gzip(w) => w.finish()?.flush(),
        }
    }
}

/// Writes SQL to a dump file.
///
/// The file is opened lazily in append mode and closed on every transfer, so
/// one dump can be written across many steps. A compressed dump becomes a
/// sequence of gzip members, which gzip readers treat as one stream.
pub struct LocalFileSink {
    path: PathBuf,
    gzip: bool,
    writer: Option<Writer>,
    bytes_written: u64,
}

impl LocalFileSink {
    /// Start a new dump, truncating any existing file.
    pub fn create(path: PathBuf, gzip: bool) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        File::create(&path)
            .with_context(|| format!("Failed to create dump file: {}", path.display()))?;
        Ok(Self::append(path, gzip))
    }

    /// Continue an existing dump.
    pub fn append(path: PathBuf, gzip: bool) -> Self {
        Self {
            path,
            gzip,
            writer: None,
            bytes_written: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Uncompressed bytes written through this sink.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    fn writer(&mut self) -> std::io::Result<&mut Writer> {
        if self.writer.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            let file = BufWriter::new(file);
            self.writer = Some(if self.gzip {
                Writer::Gzip(GzEncoder::new(file, Compression::default()))
            } else {
                Writer::Plain(file)
            });
        }
        match self.writer.as_mut() {
            Some(writer) => Ok(writer),
            None => Err(std::io::Error::other("dump file is not open")),
        }
    }
}

#[async_trait]
impl ChunkSink for LocalFileSink {
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), SinkError> {
        if chunk.is_empty() {
            return Ok(());
        }
        self.writer()?.write_all(chunk)?;
        self.bytes_written += chunk.len() as u64;
        Ok(())
    }

    async fn transfer(&mut self, transfer: &Transfer) -> Result<(), SinkError> {
        if let Some(writer) = self.writer.take() {
            writer.close()?;
        }
        tracing::debug!(
            "Closed {} after writing {} ({} bytes so far)",
            self.path.display(),
            transfer.table,
            self.bytes_written
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::MultiGzDecoder;
    use std::io::Read;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_plain_dump_across_steps() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("dump.sql");
        std::fs::write(&path, "stale").unwrap();

        let mut sink = LocalFileSink::create(path.clone(), false).unwrap();
        sink.write_chunk(b"# header\n").await.unwrap();
        sink.transfer(&Transfer::new("wp_posts")).await.unwrap();
        sink.write_chunk(b"INSERT INTO `wp_posts` VALUES (1) ;\n")
            .await
            .unwrap();
        sink.transfer(&Transfer::new("wp_posts")).await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "# header\nINSERT INTO `wp_posts` VALUES (1) ;\n");
        assert_eq!(sink.bytes_written(), contents.len() as u64);
    }

    #[tokio::test]
    async fn test_gzip_dump_is_multi_member() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested/dump.sql.gz");

        let mut sink = LocalFileSink::create(path.clone(), true).unwrap();
        sink.write_chunk(b"first;\n").await.unwrap();
        sink.transfer(&Transfer::new("wp_options")).await.unwrap();

        let mut resumed = LocalFileSink::append(path.clone(), true);
        resumed.write_chunk(b"second;\n").await.unwrap();
        resumed.transfer(&Transfer::new("wp_options")).await.unwrap();

        let mut decoded = String::new();
        MultiGzDecoder::new(File::open(&path).unwrap())
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(decoded, "first;\nsecond;\n");
    }

    #[tokio::test]
    async fn test_transfer_without_writes() {
        let temp_dir = TempDir::new().unwrap();
        let mut sink = LocalFileSink::create(temp_dir.path().join("empty.sql"), false).unwrap();
        sink.transfer(&Transfer::new("wp_posts")).await.unwrap();
        assert_eq!(sink.bytes_written(), 0);
    }
}
