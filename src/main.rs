use anyhow::Context;
use clap::Parser;
use s3zipper::archive::{ArchiveStreamer, StreamerOptions};
use s3zipper::config::Settings;
use s3zipper::resolver::RedisResolver;
use s3zipper::s3::{S3Client, create_s3_client};
use s3zipper::server::{AppState, create_router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::parse();
    init_tracing(settings.log_json);

    if let Err(e) = settings.validate() {
        error!("Invalid configuration: {e}");
        std::process::exit(2);
    }

    let provider_config = settings.provider_config()?;
    let client = match create_s3_client(provider_config).await {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to initialize S3 client: {e}");
            error!("Make sure you have valid AWS credentials configured.");
            std::process::exit(1);
        }
    };
    let fetcher = Arc::new(S3Client::from_client(client, settings.bucket.clone()));
    info!(bucket = %fetcher.bucket(), region = %settings.region, "S3 client ready");

    let resolver = RedisResolver::connect(&settings.redis_connection_url(), settings.redis_pool_size)
        .context("Failed to configure Redis pool")?;

    let streamer = ArchiveStreamer::with_options(
        fetcher,
        StreamerOptions {
            prefetch: settings.prefetch,
        },
    );
    let state = AppState::new(Arc::new(resolver), streamer)
        .with_request_timeout(settings.request_timeout());

    let addr = settings.listen_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!(
        %addr,
        prefetch = settings.prefetch,
        "Running"
    );
    axum::serve(listener, create_router(state))
        .await
        .context("HTTP server failed")?;

    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,s3zipper=info"));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
