mod api;
mod camera;
mod capture;
mod config;
mod console;
mod utils;

#[cfg(test)]
mod testing;

use anyhow::Result;
use config::Config;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "attendance_capture=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    let config = Config::from_env()?;

    // Create the API client and camera
    let api = Arc::new(api::create_client(&config)?);
    let backend = camera::create_backend(&config.camera);

    tracing::info!(
        api = %config.api_base_url,
        camera = %config.camera,
        "Starting attendance capture..."
    );

    if let Err(why) = console::run(&config, api, backend).await {
        tracing::error!("Console error: {:?}", why);
    }

    Ok(())
}
