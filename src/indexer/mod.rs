// Index builder
// Turns the knowledge base into a persisted, searchable chunk index


use std::path::PathBuf;

use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::database::{ChunkRecord, IndexManifest, VectorStore};
use crate::embeddings::{Embedder, split_documents};
use crate::loader::load_documents;
use crate::{RagError, Result};

/// Summary of a completed build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildStats {
    pub files_loaded: usize,
    pub files_skipped: usize,
    pub files_failed: usize,
    pub documents: usize,
    pub chunks: usize,
    pub dimension: usize,
    pub index_dir: PathBuf,
}

fn embedding_progress(total: usize) -> ProgressBar {
    if !console::user_attended_stderr() {
        return ProgressBar::hidden();
    }
    let style = ProgressStyle::with_template("{spinner} [{pos}/{len}] Embedding chunks {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    ProgressBar::new(total as u64).with_style(style)
}

/// Embed `texts` in batches of at most `batch_size`, failing if any batch fails
fn embed_in_batches(
    embedder: &dyn Embedder,
    texts: &[String],
    batch_size: usize,
) -> Result<Vec<Vec<f32>>> {
    let bar = embedding_progress(texts.len());
    let mut vectors = Vec::with_capacity(texts.len());

    for batch in texts.chunks(batch_size.max(1)) {
        let embedded = match embedder.embed_documents(batch) {
            Ok(embedded) => embedded,
            Err(e) => {
                bar.abandon();
                return Err(e);
            }
        };
        if embedded.len() != batch.len() {
            bar.abandon();
            return Err(RagError::Embedding(format!(
                "requested {} embeddings but received {}",
                batch.len(),
                embedded.len()
            )));
        }
        vectors.extend(embedded);
        bar.inc(batch.len() as u64);
        debug!("Embedded {}/{} chunks", vectors.len(), texts.len());
    }

    bar.finish_and_clear();
    Ok(vectors)
}

fn common_dimension(vectors: &[Vec<f32>]) -> Result<usize> {
    let dimension = vectors.first().map_or(0, Vec::len);
    if dimension == 0 {
        return Err(RagError::Embedding(
            "embedding service returned empty vectors".to_string(),
        ));
    }
    if let Some(position) = vectors.iter().position(|v| v.len() != dimension) {
        return Err(RagError::Embedding(format!(
            "inconsistent embedding dimensions: chunk 0 has {}, chunk {} has {}",
            dimension,
            position,
            vectors[position].len()
        )));
    }
    Ok(dimension)
}

/// Load, split, embed and persist the knowledge base configured in `config`.
///
/// Every chunk is embedded before anything is written, so a failing API call leaves any
/// previous index untouched.
#[inline]
pub async fn build_index(config: &Config, embedder: &dyn Embedder) -> Result<BuildStats> {
    let knowledge_base = config.knowledge_base_dir();
    let index_dir = config.index_dir();

    let report = load_documents(&knowledge_base)?;
    for (path, reason) in &report.failed {
        warn!("Skipped {}: {}", path.display(), reason);
    }
    if report.documents.is_empty() {
        return Err(RagError::EmptyIndex(format!(
            "no .txt or .pdf documents were loaded from '{}'",
            knowledge_base.display()
        )));
    }

    let chunks = split_documents(&report.documents, &config.chunking)?;
    if chunks.is_empty() {
        return Err(RagError::EmptyIndex(format!(
            "the {} loaded documents contain no text to index",
            report.documents.len()
        )));
    }
    info!(
        "Split {} documents into {} chunks",
        report.documents.len(),
        chunks.len()
    );

    let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
    let batch_size = usize::try_from(config.openai.embedding_batch_size).unwrap_or(usize::MAX);
    info!(
        "Embedding {} chunks with {}",
        texts.len(),
        embedder.model_name()
    );
    let vectors = embed_in_batches(embedder, &texts, batch_size)?;
    let dimension = common_dimension(&vectors)?;

    let created_at = Utc::now();
    let timestamp = created_at.to_rfc3339();
    let records: Vec<ChunkRecord> = chunks
        .iter()
        .zip(vectors)
        .map(|(chunk, vector)| ChunkRecord::from_chunk(chunk, vector, &timestamp))
        .collect();

    let manifest = IndexManifest {
        embedding_model: embedder.model_name().to_string(),
        dimension,
        chunk_count: records.len(),
        document_count: report.documents.len(),
        chunking: config.chunking.clone(),
        created_at,
    };

    VectorStore::create(&index_dir, records, manifest).await?;

    Ok(BuildStats {
        files_loaded: report.files_loaded,
        files_skipped: report.skipped.len(),
        files_failed: report.failed.len(),
        documents: report.documents.len(),
        chunks: chunks.len(),
        dimension,
        index_dir,
    })
}
