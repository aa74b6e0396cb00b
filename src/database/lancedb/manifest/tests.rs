use super::*;
use tempfile::TempDir;

fn sample_manifest() -> IndexManifest {
    IndexManifest {
        embedding_model: "text-embedding-ada-002".to_string(),
        dimension: 1536,
        chunk_count: 42,
        document_count: 3,
        chunking: ChunkingConfig::default(),
        created_at: Utc::now(),
    }
}

#[test]
fn manifest_write_and_read() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let manifest = sample_manifest();

    manifest.write(temp_dir.path()).expect("should write manifest");
    assert!(IndexManifest::path(temp_dir.path()).exists());

    let read_back = IndexManifest::read(temp_dir.path()).expect("should read manifest");
    assert_eq!(read_back, manifest);
}

#[test]
fn remove_is_idempotent() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    sample_manifest()
        .write(temp_dir.path())
        .expect("should write manifest");

    IndexManifest::remove(temp_dir.path()).expect("first remove should succeed");
    IndexManifest::remove(temp_dir.path()).expect("second remove should succeed");
    assert!(!IndexManifest::path(temp_dir.path()).exists());
}

#[test]
fn corrupt_manifest_is_a_database_error() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    fs::write(IndexManifest::path(temp_dir.path()), "dimension = \"wide\"")
        .expect("should write corrupt manifest");

    assert!(matches!(
        IndexManifest::read(temp_dir.path()),
        Err(RagError::Database(_))
    ));
}
