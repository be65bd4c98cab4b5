pub mod adapters;
pub mod config;
pub mod dicomweb;
pub mod interpret;
pub mod pipeline;
pub mod render;
pub mod storage;

use crate::adapters::http::HttpAdapter;
use crate::config::{Config, LoggingConfig};
use crate::pipeline::Orchestrator;
use std::net::SocketAddr;
use tracing_subscriber::{self, prelude::*, EnvFilter};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `logging.level`.
pub fn init_logging(logging: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))?;

    let file_layer = if logging.log_to_file {
        if let Some(parent) = std::path::Path::new(&logging.log_file_path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::File::create(&logging.log_file_path)?;
        Some(
            tracing_subscriber::fmt::layer()
                .with_file(true)
                .with_line_number(true)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file)),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(
            tracing_subscriber::fmt::layer()
                .with_file(true)
                .with_line_number(true),
        )
        .try_init()?;
    Ok(())
}

pub async fn run(config: Config) -> anyhow::Result<()> {
    init_logging(&config.logging)?;

    tracing::info!(
        archive = %config.archive.base_url,
        scratch = %config.storage.path,
        "🔧 Starting DICOM interpreter"
    );
    tracing::debug!("Interpreter config: {:?}", config.interpreter);

    let orchestrator = Orchestrator::from_config(&config)?;
    tracing::info!("Interpretation strategy: {}", orchestrator.interpreter_name());

    let addr: SocketAddr = config
        .server
        .bind_addr()
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid bind address '{}': {}", config.server.bind_addr(), e))?;

    HttpAdapter::new(addr)
        .serve(orchestrator, config.server.public_url.clone())
        .await
}
