// Database module
// Persisted vector index backed by LanceDB

pub mod lancedb;

pub use self::lancedb::{
    ChunkMetadata, ChunkRecord, IndexManifest, SearchResult, VectorStore, index_exists,
};
