use super::*;
use crate::embeddings::Chunk;
use std::path::PathBuf;

fn chunk(source: &str, page: Option<u32>) -> Chunk {
    Chunk {
        content: "Clickjacking tricks users into clicking hidden frames.".to_string(),
        source: PathBuf::from(source),
        page,
        start_index: 120,
        chunk_index: 2,
    }
}

#[test]
fn chunk_record_from_chunk() {
    let record = ChunkRecord::from_chunk(
        &chunk("kb/guides/clickjacking.txt", None),
        vec![0.1, 0.2, 0.3],
        "2024-01-01T00:00:00Z",
    );

    assert_eq!(record.vector.len(), 3);
    assert!(uuid::Uuid::parse_str(&record.id).is_ok());
    assert_eq!(record.metadata.file_name, "clickjacking.txt");
    assert_eq!(record.metadata.source, "kb/guides/clickjacking.txt");
    assert_eq!(record.metadata.start_index, 120);
    assert_eq!(record.metadata.chunk_index, 2);
    assert_eq!(record.metadata.created_at, "2024-01-01T00:00:00Z");
}

#[test]
fn record_ids_are_unique() {
    let c = chunk("a.txt", None);
    let first = ChunkRecord::from_chunk(&c, vec![1.0], "t");
    let second = ChunkRecord::from_chunk(&c, vec![1.0], "t");
    assert_ne!(first.id, second.id);
}

#[test]
fn citation_includes_page_when_known() {
    let paged = ChunkMetadata::from_chunk(&chunk("kb/owasp.pdf", Some(7)), "t");
    assert_eq!(paged.citation(), "owasp.pdf, Page: 7");

    let unpaged = ChunkMetadata::from_chunk(&chunk("kb/notes.txt", None), "t");
    assert_eq!(unpaged.citation(), "notes.txt, Page: N/A");
}

#[test]
fn chunk_metadata_serialization() {
    let metadata = ChunkMetadata::from_chunk(&chunk("kb/owasp.pdf", Some(1)), "t");

    let json = serde_json::to_string(&metadata).expect("can serialize json");
    let deserialized: ChunkMetadata = serde_json::from_str(&json).expect("can parse json");

    assert_eq!(metadata, deserialized);
}

#[test]
fn oversized_offsets_saturate() {
    let mut oversized = chunk("kb/huge.txt", None);
    oversized.start_index = usize::MAX;
    oversized.chunk_index = 7;

    let metadata = ChunkMetadata::from_chunk(&oversized, "t");
    assert_eq!(metadata.start_index, u32::MAX);
    assert_eq!(metadata.chunk_index, 7);
}
