use anyhow::Context;
use clap::{Parser, Subcommand};
use std::{sync::Arc, time::Duration};
use weathercast_core::{Config, feed_from_config};

use crate::{
    api::{AppState, create_router},
    broadcast,
    sessions::SessionRegistry,
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weathercast", version, about = "Weather aggregation and broadcast service")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the REST and WebSocket endpoints.
    Serve {
        /// Listen address; overrides `bind` from the config file.
        #[arg(long)]
        bind: Option<String>,
    },

    /// Add or replace the forecast source for a named location.
    Configure {
        /// Location name, e.g. "TAISHAN".
        location: String,
    },

    /// Fetch once and print the result as JSON.
    Show {
        /// Location name; if absent, show the basic current conditions.
        location: Option<String>,
    },

    /// List configured locations.
    Locations,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let config = Config::load()?;

        match self.command {
            Command::Serve { bind } => serve(config, bind).await,
            Command::Configure { location } => configure(config, &location),
            Command::Show { location } => show(&config, location.as_deref()).await,
            Command::Locations => {
                for name in config.location_names() {
                    println!("{name}");
                }
                Ok(())
            }
        }
    }
}

async fn serve(config: Config, bind: Option<String>) -> anyhow::Result<()> {
    let feed = feed_from_config(&config)?;
    let sessions = Arc::new(SessionRegistry::new());
    let period = Duration::from_secs(config.broadcast_interval_secs.max(1));

    let broadcaster = tokio::spawn(broadcast::run(feed.clone(), sessions.clone(), period));

    let app = create_router(AppState {
        feed,
        gate: config.gate.clone(),
        sessions,
    });

    let addr = bind.unwrap_or(config.bind);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("HTTP server listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    broadcaster.abort();
    tracing::info!("Server shut down gracefully");
    Ok(())
}

fn configure(mut config: Config, location: &str) -> anyhow::Result<()> {
    let message = format!("Forecast URL for {location}:");
    let mut prompt = inquire::Text::new(&message);
    if let Some(current) = config.location_url(location) {
        prompt = prompt.with_default(current);
    }
    let url = prompt.prompt().context("Failed to read forecast URL")?;

    config.upsert_location(location, url.trim().to_string());
    config.save()?;

    println!(
        "Saved location '{location}' to {}",
        Config::config_file_path()?.display()
    );
    Ok(())
}

async fn show(config: &Config, location: Option<&str>) -> anyhow::Result<()> {
    let feed = feed_from_config(config)?;

    let json = match location {
        Some(location) => serde_json::to_string_pretty(&feed.forecast(location).await?)?,
        None => serde_json::to_string_pretty(&feed.current().await?)?,
    };
    println!("{json}");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {},
                    _ = sigterm.recv() => {},
                }
            }
            Err(e) => {
                tracing::warn!("failed to install SIGTERM handler: {e}");
                ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    ctrl_c.await;
}
