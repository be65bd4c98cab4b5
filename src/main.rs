use clap::Parser;
use dicom_interpreter::config::{Cli, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load(&cli.config_path)?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    dicom_interpreter::run(config).await
}
