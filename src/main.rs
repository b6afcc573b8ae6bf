//! Serves the thesauri found below the configured catalog root over HTTP.
//!
//! Configuration is read from `skoskeeper.toml` (optional) and `SKOSKEEPER_*`
//! environment variables; `RUST_LOG` overrides the configured log filter.
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use skoskeeper::catalog::Catalog;
use skoskeeper::server;
use skoskeeper::settings::Settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::load()?;
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log.filter))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let catalog = {
        let settings = settings.clone();
        tokio::task::spawn_blocking(move || Catalog::open(&settings)).await??
    };
    info!(thesauri = catalog.len(), "loaded catalog");

    let app = server::router(Arc::new(catalog));
    let listener = tokio::net::TcpListener::bind(settings.server.bind.as_str()).await?;
    info!(address = %settings.server.bind, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
