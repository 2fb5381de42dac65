//! Document ingestion: fetch, extract, chunk, embed, store.
//!
//! The extraction, embedding and vector-store steps are external
//! collaborators consumed through the traits below; this module owns the
//! tenant-safety of the pipeline around them.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::ChunkMetadata;

pub mod external;
pub mod pipeline;

pub use pipeline::IngestionPipeline;

/// Fixed chunking window, in characters. No overlap; the final chunk may be
/// shorter.
pub const CHUNK_SIZE_CHARS: usize = 1000;

#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, data: &[u8], mime_type: &str) -> Result<String>;
}

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts. The result has one vector per input, in
    /// order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Upsert one embedding record. Re-storing the same id overwrites the
    /// previous record, which is what makes reprocessing idempotent.
    async fn store(&self, id: &str, vector: &[f32], metadata: &ChunkMetadata) -> Result<()>;
}

/// Split text into fixed-size character windows.
pub fn chunk_text(text: &str, chunk_size: usize) -> Vec<String> {
    if text.is_empty() || chunk_size == 0 {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(chunk_size)
        .map(|window| window.iter().collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_text_exact_multiple() {
        let text = "a".repeat(2000);
        let chunks = chunk_text(&text, 1000);
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.chars().count() == 1000));
    }

    #[test]
    fn test_chunk_text_final_chunk_shorter() {
        let text = "b".repeat(2500);
        let chunks = chunk_text(&text, 1000);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].chars().count(), 500);
    }

    #[test]
    fn test_chunk_text_short_input_is_one_chunk() {
        let chunks = chunk_text("hello world", 1000);
        assert_eq!(chunks, vec!["hello world".to_string()]);
    }

    #[test]
    fn test_chunk_text_empty() {
        assert!(chunk_text("", 1000).is_empty());
    }

    #[test]
    fn test_chunk_text_counts_characters_not_bytes() {
        // Multi-byte characters must not be split mid-codepoint
        let text = "é".repeat(1500);
        let chunks = chunk_text(&text, 1000);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chars().count(), 1000);
        assert_eq!(chunks[1].chars().count(), 500);
    }

    #[test]
    fn test_chunks_reassemble_to_original() {
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(100);
        let chunks = chunk_text(&text, 1000);
        assert_eq!(chunks.concat(), text);
    }
}
