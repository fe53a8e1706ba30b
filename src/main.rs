use std::net::SocketAddr;

use dotenv::dotenv;
use rmcp::transport::sse_server::SseServer;
use rmcp::{transport::stdio, ServiceExt};
use tracing::info;
use tracing_subscriber::EnvFilter;

use nearby::config::{Config, Transport};
use nearby::server::LocationServer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();
    info!(
        transport = ?config.transport,
        mock_google_api = config.mock_google_api,
        mock_weather_api = config.mock_weather_api,
        "starting location tools server"
    );

    let server = LocationServer::from_config(&config)?;

    match config.transport {
        Transport::Sse => {
            let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
            info!("SSE endpoint available at http://{addr}/sse");
            let ct = SseServer::serve(addr)
                .await?
                .with_service(move || server.clone());
            tokio::signal::ctrl_c().await?;
            ct.cancel();
        }
        Transport::Stdio => {
            info!("serving over stdio");
            let service = server.serve(stdio()).await?;
            service.waiting().await?;
        }
    }

    Ok(())
}
