use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use console::style;
use rag_assistant::Result;
use rag_assistant::commands::{build, chat, write_config};
use rag_assistant::config::{Config, show_config};

#[derive(Parser)]
#[command(name = "rag-assistant")]
#[command(about = "Question answering over a local knowledge base with retrieval-augmented generation")]
#[command(version)]
struct Cli {
    /// Project directory holding rag-assistant.toml, .env and the relative data paths
    #[arg(long, global = true, default_value = ".")]
    base_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load, chunk and embed the knowledge base into a vector index
    Build,
    /// Ask questions about the indexed documents
    Chat {
        /// Do not print the source chunks behind each answer
        #[arg(long)]
        no_sources: bool,
    },
    /// Write the effective configuration to rag-assistant.toml
    Config {
        /// Show current configuration instead of writing it
        #[arg(long)]
        show: bool,
    },
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(&cli.base_dir)?;

    match cli.command {
        Commands::Build => {
            build(&config).await?;
        }
        Commands::Chat { no_sources } => {
            let show_sources = config.retrieval.show_sources && !no_sources;
            chat(&config, show_sources).await?;
        }
        Commands::Config { show } => {
            if show {
                show_config(&config);
            } else {
                write_config(&config)?;
            }
        }
    }

    Ok(())
}

fn load_dotenv(base_dir: &Path) {
    // Variables already present in the environment take precedence
    match dotenvy::from_path(base_dir.join(".env")) {
        Ok(()) => tracing::debug!("Loaded environment from {}", base_dir.join(".env").display()),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!("Ignoring unreadable .env file: {}", e),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    load_dotenv(&cli.base_dir);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
