mod logging_config;
mod server_config;
pub mod config;

pub use config::{Config, ConfigError};
pub use logging_config::LoggingConfig;
pub use server_config::ServerConfig;

use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the service binary.
#[derive(Parser, Debug)]
#[command(
    name = "dicom-interpreter",
    about = "Fetch a DICOM instance from a DICOMweb archive and interpret it"
)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", default_value = "config.toml")]
    pub config_path: PathBuf,

    /// Overrides `logging.level` from the configuration file.
    #[arg(long)]
    pub log_level: Option<String>,
}
