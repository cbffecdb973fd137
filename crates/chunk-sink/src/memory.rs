//! In-memory sink.
//!
//! Keeps everything written so the step response can carry it, which is how
//! a pull hands its chunk to the requesting site. Also used in tests.

use crate::{ChunkSink, SinkError, Transfer};

#[derive(Debug, Default)]
pub struct MemorySink {
    buffer: Vec<u8>,
    transfers: Vec<(Transfer, usize)>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes written and not yet taken.
    pub fn contents(&self) -> &[u8] {
        &self.buffer
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.buffer).into_owned()
    }

    /// Every transfer so far with the number of buffered bytes at that point.
    pub fn transfers(&self) -> &[(Transfer, usize)] {
        &self.transfers
    }
}

#[async_trait::async_trait]
impl ChunkSink for MemorySink {
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), SinkError> {
        self.buffer.extend_from_slice(chunk);
        Ok(())
    }

    async fn transfer(&mut self, transfer: &Transfer) -> Result<(), SinkError> {
        self.transfers.push((transfer.clone(), self.buffer.len()));
        Ok(())
    }

    fn take_response(&mut self) -> Option<Vec<u8>> {
        Some(std::mem::take(&mut self.buffer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_sink() {
        let mut sink = MemorySink::new();
        sink.write_chunk(b"DROP TABLE IF EXISTS `wp_posts`;\n")
            .await
            .unwrap();
        sink.write_chunk(b"INSERT INTO `wp_posts` VALUES (1) ;\n")
            .await
            .unwrap();
        sink.transfer(&Transfer::new("wp_posts")).await.unwrap();

        assert_eq!(sink.transfers().len(), 1);
        assert_eq!(sink.transfers()[0].0.table, "wp_posts");
        assert!(sink.text().ends_with("VALUES (1) ;\n"));

        let taken = sink.take_response().unwrap();
        assert!(taken.starts_with(b"DROP TABLE"));
        assert!(sink.contents().is_empty());
    }

    #[tokio::test]
    async fn test_boxed_sink() {
        let mut sink: Box<dyn ChunkSink> = Box::new(MemorySink::new());
        sink.write_chunk(b"x").await.unwrap();
        assert_eq!(sink.take_response(), Some(b"x".to_vec()));
    }
}
