
use std::collections::VecDeque;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::loader::Document;
use crate::{RagError, Result};

/// Separators tried in order by the recursive splitter, coarsest first
const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Represents a chunk of a document ready for embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// The chunk text
    pub content: String,
    /// Path of the file the chunk was cut from
    pub source: PathBuf,
    /// 1-based page number for paged formats
    pub page: Option<u32>,
    /// Character offset of the chunk within its document
    pub start_index: usize,
    /// Position of this chunk within its document
    pub chunk_index: usize,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChunkingStrategy {
    /// Split on paragraphs, then lines, then words, then characters, merging small pieces
    #[default]
    Recursive,
    /// Plain sliding window over characters
    Fixed,
}

impl ChunkingStrategy {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Recursive => "recursive",
            Self::Fixed => "fixed",
        }
    }
}

/// Configuration for document chunking. Sizes are measured in characters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    pub strategy: ChunkingStrategy,
    /// Maximum chunk length
    pub chunk_size: usize,
    /// Characters shared between adjacent chunks
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            strategy: ChunkingStrategy::Recursive,
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

impl ChunkingConfig {
    fn check(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::Config("chunk size must be at least 1".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::Config(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Split every document into chunks, preserving document order
#[inline]
pub fn split_documents(documents: &[Document], config: &ChunkingConfig) -> Result<Vec<Chunk>> {
    config.check()?;

    let mut chunks = Vec::new();
    for document in documents {
        chunks.extend(split_document_unchecked(document, config));
    }

    debug!(
        "Split {} documents into {} chunks ({} strategy)",
        documents.len(),
        chunks.len(),
        config.strategy.as_str()
    );

    Ok(chunks)
}

/// Split a single document into chunks
#[inline]
pub fn split_document(document: &Document, config: &ChunkingConfig) -> Result<Vec<Chunk>> {
    config.check()?;
    Ok(split_document_unchecked(document, config))
}

fn split_document_unchecked(document: &Document, config: &ChunkingConfig) -> Vec<Chunk> {
    split_text_with_offsets(&document.content, config)
        .into_iter()
        .enumerate()
        .map(|(chunk_index, (start_index, content))| Chunk {
            content,
            source: document.source.clone(),
            page: document.page,
            start_index,
            chunk_index,
        })
        .collect()
}

/// Split raw text into `(character offset, chunk text)` pairs.
///
/// An invalid `config` yields no chunks; use [`split_documents`] to get the error instead.
#[inline]
pub fn split_text_with_offsets(text: &str, config: &ChunkingConfig) -> Vec<(usize, String)> {
    if let Err(e) = config.check() {
        warn!("Refusing to split text: {}", e);
        return Vec::new();
    }

    let boundaries = char_boundaries(text);

    match config.strategy {
        ChunkingStrategy::Fixed => fixed_windows(text, &boundaries, config),
        ChunkingStrategy::Recursive => {
            let pieces = recursive_split(text, &SEPARATORS, config);
            locate_chunks(text, &boundaries, pieces, config.chunk_overlap)
        }
    }
}

/// Byte offset of every character, plus the text length as a final entry
fn char_boundaries(text: &str) -> Vec<usize> {
    text.char_indices()
        .map(|(byte, _)| byte)
        .chain(std::iter::once(text.len()))
        .collect()
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn fixed_windows(text: &str, boundaries: &[usize], config: &ChunkingConfig) -> Vec<(usize, String)> {
    let total_chars = boundaries.len() - 1;
    let stride = config.chunk_size - config.chunk_overlap;

    let mut windows = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + config.chunk_size).min(total_chars);
        let window = &text[boundaries[start]..boundaries[end]];
        if !window.trim().is_empty() {
            windows.push((start, window.to_string()));
        }
        if end == total_chars {
            break;
        }
        start += stride;
    }

    windows
}

fn recursive_split(text: &str, separators: &[&str], config: &ChunkingConfig) -> Vec<String> {
    // Pick the first separator that occurs in the text; "" always matches
    let mut separator = "";
    let mut finer: &[&str] = &[];
    for (i, &candidate) in separators.iter().enumerate() {
        if candidate.is_empty() {
            break;
        }
        if text.contains(candidate) {
            separator = candidate;
            finer = &separators[i + 1..];
            break;
        }
    }

    let mut chunks = Vec::new();
    let mut small_pieces: Vec<&str> = Vec::new();

    for piece in split_keeping_separator(text, separator) {
        if char_len(piece) < config.chunk_size {
            small_pieces.push(piece);
            continue;
        }

        if !small_pieces.is_empty() {
            chunks.extend(merge_pieces(&small_pieces, config));
            small_pieces.clear();
        }

        if finer.is_empty() {
            chunks.push(piece.to_string());
        } else {
            chunks.extend(recursive_split(piece, finer, config));
        }
    }

    if !small_pieces.is_empty() {
        chunks.extend(merge_pieces(&small_pieces, config));
    }

    chunks
}

/// Split at every separator occurrence, keeping the separator at the start of the following
/// piece. An empty separator splits into single characters.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(separator) {
        if idx > start {
            pieces.push(&text[start..idx]);
        }
        start = idx;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }

    pieces
}

/// Greedily merge pieces into chunks of at most `chunk_size` characters, carrying up to
/// `chunk_overlap` characters of trailing pieces into the next chunk
fn merge_pieces(pieces: &[&str], config: &ChunkingConfig) -> Vec<String> {
    let mut merged = Vec::new();
    let mut current: VecDeque<&str> = VecDeque::new();
    let mut total = 0;

    for &piece in pieces {
        let len = char_len(piece);

        if total + len > config.chunk_size {
            if total > config.chunk_size {
                warn!(
                    "Created a chunk of size {}, which is longer than the specified {}",
                    total, config.chunk_size
                );
            }

            if !current.is_empty() {
                if let Some(chunk) = join_pieces(&current) {
                    merged.push(chunk);
                }

                while total > config.chunk_overlap
                    || (total + len > config.chunk_size && total > 0)
                {
                    let Some(first) = current.pop_front() else {
                        break;
                    };
                    total -= char_len(first);
                }
            }
        }

        current.push_back(piece);
        total += len;
    }

    if let Some(chunk) = join_pieces(&current) {
        merged.push(chunk);
    }

    merged
}

fn join_pieces(pieces: &VecDeque<&str>) -> Option<String> {
    let joined: String = pieces.iter().copied().collect();
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Find the character offset of each chunk, searching forward from where the previous chunk's
/// overlap region would begin
fn locate_chunks(
    text: &str,
    boundaries: &[usize],
    chunks: Vec<String>,
    overlap: usize,
) -> Vec<(usize, String)> {
    let total_chars = boundaries.len() - 1;
    let mut index: usize = 0;
    let mut previous_len = 0;

    chunks
        .into_iter()
        .map(|chunk| {
            let search_from = (index + previous_len).saturating_sub(overlap).min(total_chars);
            let from_byte = boundaries[search_from];

            // The fallback never reports an offset before the previous chunk's start
            index = match text[from_byte..].find(chunk.as_str()) {
                Some(pos) => search_from + char_len(&text[from_byte..from_byte + pos]),
                None => {
                    debug!(
                        "Chunk not found after offset {}, searching from previous start {}",
                        search_from, index
                    );
                    let previous_byte = boundaries[index];
                    text[previous_byte..].find(chunk.as_str()).map_or(
                        search_from.max(index),
                        |pos| index + char_len(&text[previous_byte..previous_byte + pos]),
                    )
                }
            };
            previous_len = char_len(&chunk);

            (index, chunk)
        })
        .collect()
}
