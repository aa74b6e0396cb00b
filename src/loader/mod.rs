// Document loading
// Walks the knowledge base and turns supported files into documents

#[cfg(test)]
mod tests;

use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::{RagError, Result};

/// Text of a loaded file (or of one page of it) with its source metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub content: String,
    pub source: PathBuf,
    /// 1-based page number, only set for paged formats
    pub page: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Text,
    Pdf,
}

impl DocumentKind {
    /// Pick a loader from the file extension, ignoring case
    #[inline]
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "txt" => Some(Self::Text),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }
}

/// Outcome of walking a knowledge base directory
#[derive(Debug, Default)]
pub struct LoadReport {
    pub documents: Vec<Document>,
    /// Supported files that loaded without error
    pub files_loaded: usize,
    /// Files with an unsupported extension
    pub skipped: Vec<PathBuf>,
    /// Files that failed to load, with the reason
    pub failed: Vec<(PathBuf, String)>,
}

/// Load every `.txt` and `.pdf` file below `directory`.
///
/// Files are visited in file-name order so repeated runs produce the same documents. A file
/// that fails to load is logged and recorded in [`LoadReport::failed`]; the walk continues.
#[inline]
pub fn load_documents(directory: &Path) -> Result<LoadReport> {
    if !directory.is_dir() {
        return Err(RagError::Loader(format!(
            "knowledge base directory '{}' does not exist or is not a directory",
            directory.display()
        )));
    }

    info!("Loading documents from {}", directory.display());
    let mut report = LoadReport::default();

    for entry in WalkDir::new(directory).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e
                    .path()
                    .map_or_else(|| directory.to_path_buf(), Path::to_path_buf);
                error!("Could not read {}: {}", path.display(), e);
                report.failed.push((path, e.to_string()));
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let Some(kind) = DocumentKind::from_path(path) else {
            debug!("Skipping unsupported file: {}", path.display());
            report.skipped.push(path.to_path_buf());
            continue;
        };

        match load_file(path, kind) {
            Ok(documents) => {
                if documents.iter().all(|d| d.content.trim().is_empty()) {
                    warn!("{} contains no extractable text", path.display());
                }
                debug!("Loaded {} document(s) from {}", documents.len(), path.display());
                report.files_loaded += 1;
                report.documents.extend(documents);
            }
            Err(e) => {
                error!("Could not load {}: {:#}", path.display(), e);
                report.failed.push((path.to_path_buf(), format!("{:#}", e)));
            }
        }
    }

    info!(
        "Loaded {} documents from {} files ({} skipped, {} failed)",
        report.documents.len(),
        report.files_loaded,
        report.skipped.len(),
        report.failed.len()
    );

    Ok(report)
}

/// Load a single file with the loader for `kind`
#[inline]
pub fn load_file(path: &Path, kind: DocumentKind) -> anyhow::Result<Vec<Document>> {
    match kind {
        DocumentKind::Text => load_text(path),
        DocumentKind::Pdf => load_pdf(path),
    }
}

fn load_text(path: &Path) -> anyhow::Result<Vec<Document>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read text file: {}", path.display()))?;

    Ok(vec![Document {
        content,
        source: path.to_path_buf(),
        page: None,
    }])
}

fn load_pdf(path: &Path) -> anyhow::Result<Vec<Document>> {
    // pdf-extract panics on some malformed files instead of returning an error
    let pages = panic::catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_by_pages(path)))
        .map_err(|_| anyhow!("PDF parser panicked on {}", path.display()))?
        .map_err(|e| anyhow!("Failed to extract text from PDF {}: {}", path.display(), e))?;

    Ok(pages
        .into_iter()
        .zip(1u32..)
        .map(|(content, page)| Document {
            content,
            source: path.to_path_buf(),
            page: Some(page),
        })
        .collect())
}
