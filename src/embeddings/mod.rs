// Embeddings module
// Handles document chunking and the OpenAI-compatible embedding/chat client

pub mod chunking;
pub mod openai;

pub use chunking::{
    Chunk, ChunkingConfig, ChunkingStrategy, split_document, split_documents,
    split_text_with_offsets,
};
pub use openai::OpenAiClient;

use crate::Result;

/// A text embedding model
pub trait Embedder: Send + Sync {
    /// Embed a batch of document texts, returning one vector per input in input order
    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single search query
    fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    /// Identifier of the model producing the vectors
    fn model_name(&self) -> &str;
}
