//! CLI configuration management.
//!
//! All configuration can be provided via CLI arguments or environment
//! variables; a `.env` file is loaded before parsing so its values act as
//! defaults.

use clap::Parser;
use kbase_inference::{HttpProviderConfig, InferenceConfig};
use kbase_lexical::LexicalStoreConfig;
use kbase_pipeline::PipelineConfig;
use kbase_postgres::PgConfig;
use kbase_qdrant::VectorStoreConfig;
use kbase_rag::{ChatConfig, RetrievalConfig};
use kbase_webhook::StatusSyncConfig;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use url::Url;

use crate::TRACING_TARGET_STARTUP;

/// Complete configuration for the kbase server.
#[derive(Debug, Clone, Parser)]
#[command(name = "kbase")]
#[command(about = "kbase knowledge-base RAG server")]
#[command(version)]
pub struct Cli {
    /// Metadata store connection.
    #[clap(flatten)]
    pub postgres: PgConfig,

    /// Vector store connection.
    #[clap(flatten)]
    pub qdrant: VectorStoreConfig,

    /// Lexical index location.
    #[clap(flatten)]
    pub lexical: LexicalStoreConfig,

    /// Model runtime endpoints and models.
    #[clap(flatten)]
    pub provider: HttpProviderConfig,

    /// Gateway concurrency, retry, and rate limits.
    #[clap(flatten)]
    pub inference: InferenceConfig,

    /// Status callback behavior.
    #[clap(flatten)]
    pub status_sync: StatusSyncConfig,

    /// Ingestion pipeline budgets and timeouts.
    #[clap(flatten)]
    pub pipeline: PipelineConfig,

    /// Hybrid retrieval funnel.
    #[clap(flatten)]
    pub retrieval: RetrievalConfig,

    /// Chat orchestration budgets.
    #[clap(flatten)]
    pub chat: ChatConfig,

    /// LibreOffice executable used for PDF conversion
    #[arg(long, env = "SOFFICE_PATH", default_value = "soffice")]
    pub soffice_path: String,

    /// Endpoint of the structural extraction service
    #[arg(long, env = "PARSER_URL")]
    pub parser_url: Url,
}

impl Cli {
    /// Loads `.env` (if present) and parses CLI arguments.
    pub fn init() -> Self {
        if let Ok(path) = dotenvy::dotenv() {
            // Tracing is not up yet; this is the one eprintln in the tree.
            eprintln!("Loaded environment from {}", path.display());
        }
        Self::parse()
    }

    /// Installs the tracing subscriber.
    ///
    /// The filter honors `RUST_LOG` and defaults to info-level output.
    pub fn init_tracing(&self) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info"));

        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();

        tracing::info!(
            target: TRACING_TARGET_STARTUP,
            version = env!("CARGO_PKG_VERSION"),
            "Starting kbase server"
        );
    }
}
