use std::path::PathBuf;

use gestura_server::ServerConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,gestura=debug")),
        )
        .init();

    tracing::info!("Starting gestura server");

    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = ServerConfig::from_env(config_path)?;

    gestura_server::run(config).await
}
