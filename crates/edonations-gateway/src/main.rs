use edonations_config::ConfigLoader;
use edonations_gateway::GatewayServer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ConfigLoader::load()?;
    GatewayServer::new(config).run().await?;
    Ok(())
}
