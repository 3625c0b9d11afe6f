use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use detent::http::{serve, AppConfig};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("detent=info".parse()?),
        )
        .init();

    let (config, port) = AppConfig::from_env();
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(
        version = %config.version,
        addr = %addr,
        "detent parse service listening"
    );

    serve(listener, Arc::new(config)).await?;
    info!("shutdown complete");
    Ok(())
}
