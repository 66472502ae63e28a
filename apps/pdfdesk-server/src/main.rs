//! pdfdesk server
//!
//! Serves a single-page PDF tool panel and the JSON API behind it:
//!
//! - merge, split, extract, rotate and reorder pages
//! - watermark, highlight and sign
//! - extract text and images, compress, rasterize
//! - invoice fields to a spreadsheet
//!
//! All processing happens in memory. Each browser session keeps its most
//! recent result until the tool changes or the session goes idle.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use pdfdesk_core::Toolbox;
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod api;
mod config;
mod error;
mod session;
#[cfg(test)]
mod tests;

use config::Config;
use session::SessionStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub toolbox: Toolbox,
    pub sessions: Arc<SessionStore>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = Config::parse();

    let log_level = if config.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting pdfdesk server on {}:{}", config.host, config.port);

    let state = AppState {
        toolbox: config.toolbox(),
        sessions: Arc::new(SessionStore::new(config.session_idle())),
    };

    let app = api::router(state, config.body_limit());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server listening on http://{}", addr);
    info!("Upload limit: {} MB", config.max_upload_mb);
    info!("Session idle timeout: {} min", config.session_idle_minutes);

    axum::serve(listener, app).await?;

    Ok(())
}
