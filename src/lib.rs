use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Loader error: {0}")]
    Loader(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Chat error: {0}")]
    Chat(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error(
        "Vector index not found or incomplete in '{}'. Run 'rag-assistant build' first to create the index.",
        .0.display()
    )]
    IndexNotFound(PathBuf),

    #[error("Nothing to index: {0}")]
    EmptyIndex(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0:#}")]
    Other(#[from] anyhow::Error),
}

pub mod assistant;
pub mod chain;
pub mod commands;
pub mod config;
pub mod database;
pub mod embeddings;
pub mod indexer;
pub mod loader;
