#![deny(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

use clap::{Parser, Subcommand, ValueEnum};
use kgimport_config::{Config, EnvSource};
use kgimport_sources::SourceKind;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod command;
mod report;

use command::{
    CommandStrategy, ConfluenceInput, ConfluenceStrategy, InfoStrategy, InitStrategy,
    MemoryInput, MemoryStrategy, RetryInput, RetryStrategy, VersionStrategy,
};

#[derive(Parser)]
#[command(name = "kgimport")]
#[command(about = "Batch import of Confluence exports and memory stores into a knowledge graph", long_about = None)]
struct Cli {
    /// Env file to merge into the environment (repeatable, earlier wins)
    #[arg(long = "env-file", global = true)]
    env_files: Vec<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum SourceArg {
    Confluence,
    Memory,
}

impl From<SourceArg> for SourceKind {
    fn from(arg: SourceArg) -> Self {
        match arg {
            SourceArg::Confluence => Self::Confluence,
            SourceArg::Memory => Self::Memory,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Import a Confluence page export
    Confluence {
        /// Export file (defaults to the newest export in --export-dir)
        #[arg(short, long)]
        export: Option<PathBuf>,

        #[arg(long, default_value = "data/confluence-export")]
        export_dir: PathBuf,

        /// Where the run summary is written
        #[arg(short, long, default_value = "data/confluence-export/import-results.json")]
        results: PathBuf,

        #[arg(short, long, default_value_t = 1)]
        concurrency: usize,

        /// Pause after each successful page, in milliseconds [default: 500]
        #[arg(long)]
        delay_ms: Option<u64>,

        /// Page content cap in characters (overrides IMPORT_MAX_CHARS)
        #[arg(long)]
        max_chars: Option<usize>,

        /// Graph namespace (overrides GROUP_ID)
        #[arg(long)]
        group_id: Option<String>,
    },
    /// Migrate entities from a memory store file
    Memory {
        /// Memory store file (JSON lines)
        #[arg(short, long)]
        file: Option<PathBuf>,

        #[arg(short, long, default_value = "memory-import-results.json")]
        results: PathBuf,

        #[arg(short, long, default_value_t = 2)]
        concurrency: usize,

        /// Pause after each migrated entity, in milliseconds [default: 2000]
        #[arg(long)]
        delay_ms: Option<u64>,

        #[arg(long)]
        group_id: Option<String>,
    },
    /// Re-run only the items that failed in a previous run
    Retry {
        /// Source listing of the previous run
        #[arg(short, long)]
        listing: Option<PathBuf>,

        #[arg(short, long, value_enum, default_value = "confluence")]
        source: SourceArg,

        /// Summary of the previous run
        #[arg(short, long, default_value = "data/confluence-export/import-results.json")]
        results: PathBuf,

        /// Where the retry summary is written
        #[arg(short, long, default_value = "data/confluence-export/retry-results.json")]
        out: PathBuf,

        #[arg(long, default_value = "data/confluence-export")]
        export_dir: PathBuf,

        #[arg(short, long, default_value_t = 1)]
        concurrency: usize,

        /// Pause after each successful retry, in milliseconds
        /// [default: 2000 for confluence, 4000 for memory]
        #[arg(long)]
        delay_ms: Option<u64>,

        #[arg(long)]
        group_id: Option<String>,
    },
    /// Create a .env template
    Init {
        #[arg(short, long, default_value = Config::DEFAULT_ENV_FILE)]
        path: PathBuf,
    },
    /// Show the effective configuration
    Info,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    let env = EnvSource::new(if cli.env_files.is_empty() {
        vec![PathBuf::from(Config::DEFAULT_ENV_FILE)]
    } else {
        cli.env_files
    });

    match cli.command {
        Commands::Confluence {
            export,
            export_dir,
            results,
            concurrency,
            delay_ms,
            max_chars,
            group_id,
        } => {
            ConfluenceStrategy
                .execute(ConfluenceInput {
                    env,
                    export,
                    export_dir,
                    results,
                    concurrency,
                    delay_ms,
                    max_chars,
                    group_id,
                })
                .await
        }
        Commands::Memory {
            file,
            results,
            concurrency,
            delay_ms,
            group_id,
        } => {
            MemoryStrategy
                .execute(MemoryInput {
                    env,
                    file,
                    results,
                    concurrency,
                    delay_ms,
                    group_id,
                })
                .await
        }
        Commands::Retry {
            listing,
            source,
            results,
            out,
            export_dir,
            concurrency,
            delay_ms,
            group_id,
        } => {
            RetryStrategy
                .execute(RetryInput {
                    env,
                    listing,
                    source: source.into(),
                    results,
                    out,
                    export_dir,
                    concurrency,
                    delay_ms,
                    group_id,
                })
                .await
        }
        Commands::Init { path } => InitStrategy.execute(path).await,
        Commands::Info => InfoStrategy.execute(env).await,
        Commands::Version => VersionStrategy.execute(()).await,
    }
}
