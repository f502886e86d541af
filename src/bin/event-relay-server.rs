// ABOUTME: Server binary for the event relay SSE endpoint
// ABOUTME: Loads configuration, wires shared resources and serves until interrupted
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Event Relay Server Binary
//!
//! Starts the HTTP server exposing the streaming, share, content and health
//! routes.

use anyhow::{Context, Result};
use clap::Parser;
use event_relay_server::{
    config::ServerConfig, logging, resources::ServerResources, routes::build_router,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "event-relay-server")]
#[command(about = "Event relay server - replay and live SSE streaming of agent events")]
pub struct Args {
    /// Override HTTP port
    #[arg(long)]
    port: Option<u16>,

    /// Override bind address
    #[arg(long)]
    host: Option<String>,

    /// Directory for the persistent attachment store
    #[arg(long)]
    attachment_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    logging::init_from_env()?;

    let mut config = ServerConfig::from_env().context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.http.port = port;
    }
    if let Some(host) = args.host {
        config.http.host = host;
    }
    if args.attachment_dir.is_some() {
        config.attachment_dir = args.attachment_dir;
    }
    info!("{}", config.summary());

    let addr = format!("{}:{}", config.http.host, config.http.port);
    let resources = Arc::new(
        ServerResources::new(config).context("Failed to initialize server resources")?,
    );
    let app = build_router(&resources);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(addr = %addr, "Event relay server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(resources.shutdown.clone()))
        .await
        .context("HTTP server error")?;

    info!("Event relay server stopped");
    Ok(())
}

/// Wait for ctrl-c, then end every open stream so graceful shutdown can drain
async fn shutdown_signal(streams: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, closing open streams");
    streams.cancel();
}
