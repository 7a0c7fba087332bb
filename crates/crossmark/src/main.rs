use crossmark::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), CrossmarkError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let bind = std::env::var("CROSSMARK_BIND").unwrap_or_else(|_| "0.0.0.0:7350".to_string());
    let config = ServerConfig::from_env()?;
    tracing::info!(
        %bind,
        max_matches = ?config.matches.max_matches,
        queue_ttl = ?config.queue.entry_ttl,
        "starting crossmark server"
    );

    let server = CrossmarkServerBuilder::new()
        .bind(&bind)
        .config(config)
        .build(DeviceAuthenticator::new())
        .await?;
    let matches = server.matches();

    tokio::select! {
        result = server.run() => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown requested");
            matches.shutdown().await;
            Ok(())
        }
    }
}
