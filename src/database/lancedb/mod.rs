// LanceDB vector database module
// Handles vector storage and similarity search for chunk embeddings

#[cfg(test)]
mod tests;

pub mod manifest;
pub mod vector_store;

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::embeddings::Chunk;

pub use manifest::{IndexManifest, MANIFEST_FILE_NAME};
pub use vector_store::{SearchResult, TABLE_NAME, VectorStore, index_exists};

/// Embedding record stored in LanceDB
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Unique identifier for this row
    pub id: String,
    /// The vector embedding of the chunk text
    pub vector: Vec<f32>,
    /// The chunk this embedding represents
    pub metadata: ChunkMetadata,
}

/// Chunk text and source information stored alongside its embedding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// The chunk text handed to the chat model as context
    pub content: String,
    /// Full path of the source file
    pub source: String,
    /// File name of the source, used for citations
    pub file_name: String,
    /// 1-based page number for PDFs
    pub page: Option<u32>,
    /// Character offset of the chunk within its document
    pub start_index: u32,
    /// Position of the chunk within its document
    pub chunk_index: u32,
    /// Timestamp when this embedding was created
    pub created_at: String,
}

impl ChunkRecord {
    /// Pair a chunk with its embedding
    #[inline]
    pub fn from_chunk(chunk: &Chunk, vector: Vec<f32>, created_at: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            vector,
            metadata: ChunkMetadata::from_chunk(chunk, created_at),
        }
    }
}

impl ChunkMetadata {
    #[inline]
    pub fn from_chunk(chunk: &Chunk, created_at: &str) -> Self {
        Self {
            content: chunk.content.clone(),
            source: chunk.source.display().to_string(),
            file_name: file_name_of(&chunk.source),
            page: chunk.page,
            start_index: saturating_u32(chunk.start_index, "start_index", &chunk.source),
            chunk_index: saturating_u32(chunk.chunk_index, "chunk_index", &chunk.source),
            created_at: created_at.to_string(),
        }
    }

    /// Citation label in the form `name, Page: N` (or `N/A` for unpaged files)
    #[inline]
    pub fn citation(&self) -> String {
        let page = self
            .page
            .map_or_else(|| "N/A".to_string(), |page| page.to_string());
        format!("{}, Page: {}", self.file_name, page)
    }
}

/// Narrow an offset to the stored column width, logging when it does not fit
fn saturating_u32(value: usize, field: &str, source: &Path) -> u32 {
    u32::try_from(value).unwrap_or_else(|_| {
        warn!(
            "{} {} of a chunk from {} exceeds u32::MAX and is stored as {}",
            field,
            value,
            source.display(),
            u32::MAX
        );
        u32::MAX
    })
}

fn file_name_of(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    )
}
