use std::io::{self, BufReader};
use std::sync::Arc;

use anyhow::Context;
use console::style;
use tracing::info;

use crate::Result;
use crate::assistant::{SessionStats, run_repl, write_banner};
use crate::chain::RetrievalChain;
use crate::config::Config;
use crate::database::VectorStore;
use crate::embeddings::OpenAiClient;
use crate::indexer::{BuildStats, build_index};

/// Build the vector index from the configured knowledge base
#[inline]
pub async fn build(config: &Config) -> Result<BuildStats> {
    let client = OpenAiClient::new(config).context("Failed to initialize OpenAI client")?;

    println!(
        "Building index from {}",
        style(config.knowledge_base_dir().display()).cyan()
    );
    let stats = build_index(config, &client).await?;

    println!("{}", style("Index built successfully!").green().bold());
    println!("  Files loaded: {}", stats.files_loaded);
    if stats.files_skipped > 0 {
        println!("  Unsupported files skipped: {}", stats.files_skipped);
    }
    if stats.files_failed > 0 {
        println!(
            "  {}",
            style(format!("Files that failed to load: {}", stats.files_failed)).yellow()
        );
    }
    println!("  Documents: {}", stats.documents);
    println!("  Chunks: {}", stats.chunks);
    println!("  Embedding dimension: {}", stats.dimension);
    println!("  Saved to: {}", stats.index_dir.display());

    Ok(stats)
}

/// Open the persisted index and wire it to the OpenAI client
#[inline]
pub async fn open_chain(config: &Config) -> Result<RetrievalChain> {
    let index_dir = config.index_dir();
    println!("Loading vector index from {}...", index_dir.display());
    let store = VectorStore::open(&index_dir).await?;

    let client = Arc::new(OpenAiClient::new(config).context("Failed to initialize OpenAI client")?);
    let manifest = store.manifest();
    if manifest.embedding_model != config.openai.embedding_model {
        println!(
            "{}",
            style(format!(
                "Warning: index was built with '{}' but '{}' is configured; rebuild if answers look wrong.",
                manifest.embedding_model, config.openai.embedding_model
            ))
            .yellow()
        );
    }
    info!(
        "Loaded index with {} chunks from {} documents",
        manifest.chunk_count, manifest.document_count
    );
    println!("{}", style("Vector index loaded successfully.").green());

    Ok(RetrievalChain::new(
        Arc::<OpenAiClient>::clone(&client),
        client,
        store,
        config.retrieval.top_k,
    ))
}

/// Run the interactive question loop on stdin/stdout
#[inline]
pub async fn chat(config: &Config, show_sources: bool) -> Result<SessionStats> {
    let chain = open_chain(config).await?;

    let mut stdout = io::stdout();
    write_banner(&mut stdout)?;

    let stdin = BufReader::new(io::stdin());
    let stats = run_repl(&chain, stdin, stdout, show_sources).await?;
    info!(
        "Session ended: {} answered, {} failed",
        stats.answered, stats.failed
    );
    Ok(stats)
}

/// Write the effective configuration to the config file so it can be edited
#[inline]
pub fn write_config(config: &Config) -> Result<()> {
    config.save()?;
    println!(
        "Configuration saved to {}",
        style(config.config_file_path().display()).cyan()
    );
    println!("The API key is never written to disk; set OPENAI_API_KEY in the environment or .env.");
    Ok(())
}
