use parlor::ParlorServer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let addr = std::env::var("PARLOR_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let server = ParlorServer::builder().bind(&addr).build().await?;
    server.run().await?;
    Ok(())
}
