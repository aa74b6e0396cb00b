#[cfg(test)]
mod tests;

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::embeddings::ChunkingConfig;
use crate::{RagError, Result};

pub const MANIFEST_FILE_NAME: &str = "index.toml";

/// Describes a completed index build. Written after every row has been persisted, so its
/// presence is what marks an index directory as usable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub embedding_model: String,
    pub dimension: usize,
    pub chunk_count: usize,
    pub document_count: usize,
    pub created_at: DateTime<Utc>,
    /// Kept last so it serializes as a trailing TOML table
    pub chunking: ChunkingConfig,
}

impl IndexManifest {
    #[inline]
    pub fn path(index_dir: &Path) -> PathBuf {
        index_dir.join(MANIFEST_FILE_NAME)
    }

    #[inline]
    pub fn read(index_dir: &Path) -> Result<Self> {
        let path = Self::path(index_dir);
        let content = fs::read_to_string(&path)?;
        toml::from_str(&content).map_err(|e| {
            RagError::Database(format!("Invalid index manifest {}: {}", path.display(), e))
        })
    }

    #[inline]
    pub fn write(&self, index_dir: &Path) -> Result<()> {
        let path = Self::path(index_dir);
        let content = toml::to_string_pretty(self)
            .map_err(|e| RagError::Database(format!("Failed to serialize manifest: {}", e)))?;
        fs::write(&path, content)?;
        debug!("Wrote index manifest to {}", path.display());
        Ok(())
    }

    /// Remove the manifest, marking the index as incomplete. A missing manifest is not an error.
    #[inline]
    pub fn remove(index_dir: &Path) -> Result<()> {
        match fs::remove_file(Self::path(index_dir)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
