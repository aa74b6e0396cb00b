use std::fmt::Write as _;

use console::style;

use super::{Config, mask_secret};

/// Print the effective configuration to stderr
#[inline]
pub fn show_config(config: &Config) {
    eprint!("{}", render_config(config));
}

/// Render the effective configuration, with the API key masked
#[inline]
pub fn render_config(config: &Config) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "{}", style("📋 Current Configuration").bold().cyan());
    let _ = writeln!(out);

    let _ = writeln!(out, "{}", style("OpenAI Settings:").bold().yellow());
    let _ = writeln!(out, "  API Base: {}", style(&config.openai.api_base).cyan());
    let api_key = config
        .openai
        .api_key
        .as_deref()
        .map_or_else(|| "(not set)".to_string(), mask_secret);
    let _ = writeln!(out, "  API Key: {}", style(api_key).cyan());
    let _ = writeln!(
        out,
        "  Embedding Model: {}",
        style(&config.openai.embedding_model).cyan()
    );
    let _ = writeln!(out, "  Chat Model: {}", style(&config.openai.chat_model).cyan());
    let _ = writeln!(
        out,
        "  Temperature: {}",
        style(config.openai.temperature).cyan()
    );
    let _ = writeln!(
        out,
        "  Embedding Batch Size: {}",
        style(config.openai.embedding_batch_size).cyan()
    );

    let _ = writeln!(out);
    let _ = writeln!(out, "{}", style("Chunking:").bold().yellow());
    let _ = writeln!(
        out,
        "  Strategy: {}",
        style(config.chunking.strategy.as_str()).cyan()
    );
    let _ = writeln!(out, "  Chunk Size: {}", style(config.chunking.chunk_size).cyan());
    let _ = writeln!(
        out,
        "  Chunk Overlap: {}",
        style(config.chunking.chunk_overlap).cyan()
    );

    let _ = writeln!(out);
    let _ = writeln!(out, "{}", style("Retrieval:").bold().yellow());
    let _ = writeln!(out, "  Top K: {}", style(config.retrieval.top_k).cyan());
    let _ = writeln!(
        out,
        "  Show Sources: {}",
        style(config.retrieval.show_sources).cyan()
    );

    let _ = writeln!(out);
    let _ = writeln!(out, "{}", style("Paths:").bold().yellow());
    let _ = writeln!(
        out,
        "  Knowledge Base: {}",
        style(config.knowledge_base_dir().display()).cyan()
    );
    let _ = writeln!(
        out,
        "  Vector Index: {}",
        style(config.index_dir().display()).cyan()
    );

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    out
}
