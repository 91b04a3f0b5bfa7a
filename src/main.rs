//! Server binary: mounts the analysis API over the Cohere completion
//! service.
//!
//! Configuration comes from the environment:
//! - `COHERE_API_KEY` (required)
//! - `COHERE_BASE_URL` (default `https://api.cohere.ai`)
//! - `SAHHA_BIND_ADDR` (default `127.0.0.1:8787`)

use std::env;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use sahha_triage::api::api_router;
use sahha_triage::config;
use sahha_triage::pipeline::upstream::{CohereClient, UpstreamClient};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,sahha_triage=debug")),
        )
        .init();

    tracing::info!("Sahha triage starting v{}", config::APP_VERSION);

    let api_key = match env::var("COHERE_API_KEY") {
        Ok(key) if !key.trim().is_empty() => key,
        _ => {
            tracing::error!("COHERE_API_KEY is not set");
            std::process::exit(1);
        }
    };
    let base_url =
        env::var("COHERE_BASE_URL").unwrap_or_else(|_| "https://api.cohere.ai".to_string());
    let bind_addr = env::var("SAHHA_BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8787".to_string());

    let completion = Arc::new(CohereClient::with_default_timeout(&base_url, &api_key));
    let upstream = Arc::new(UpstreamClient::new(completion));
    let app = api_router(upstream);

    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(addr = %bind_addr, error = %e, "Failed to bind");
            std::process::exit(1);
        }
    };
    tracing::info!(addr = %bind_addr, "API server listening");

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
