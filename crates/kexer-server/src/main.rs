// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Cluster exec connector server binary.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use kexer_server::{create_app_state, create_router, loopback, SecretClusterStore};
use kexer_server_connect::{KubeClientFactory, LoopbackHandle};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod version;

/// Kexer server - proxies exec sessions into managed clusters.
#[derive(Parser, Debug)]
#[command(name = "kexer-server", about = "Cluster exec connector server", version)]
struct Args {
	/// Path to a TOML config file (defaults to /etc/kexer/server.toml)
	#[arg(long, env = "KEXER_SERVER_CONFIG")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Show version and build information
	Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	dotenvy::dotenv().ok();

	let args = Args::parse();

	if let Some(Command::Version) = args.command {
		println!("{}", version::format_version_info());
		return Ok(());
	}

	let config = match &args.config {
		Some(path) => kexer_server_config::load_config_with_file(path.clone())?,
		None => kexer_server_config::load_config()?,
	};

	let filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| config.logging.level.clone().into());
	let registry = tracing_subscriber::registry().with(filter);
	if config.logging.json {
		registry.with(tracing_subscriber::fmt::layer().json()).init();
	} else {
		registry.with(tracing_subscriber::fmt::layer()).init();
	}

	tracing::info!(
		host = %config.http.host,
		port = config.http.port,
		remote_timeout_secs = config.connect.remote_timeout.as_secs(),
		"starting kexer-server"
	);

	let loopback_handle = Arc::new(LoopbackHandle::new());
	if let Err(e) = loopback::install_from_environment(&loopback_handle).await {
		tracing::error!(error = %e, "failed to configure loopback client");
		tracing::warn!("connect requests will fail until the server is restarted with cluster access");
	}

	let clusters = Arc::new(SecretClusterStore::new(Arc::clone(&loopback_handle)));
	let state = create_app_state(
		&config,
		loopback_handle,
		clusters,
		Arc::new(KubeClientFactory),
	);

	let app = create_router(state).layer(TraceLayer::new_for_http());

	let addr = config.socket_addr();
	tracing::info!("listening on {}", addr);

	let listener = tokio::net::TcpListener::bind(&addr).await?;

	tokio::select! {
		result = axum::serve(listener, app) => {
			if let Err(e) = result {
				tracing::error!(error = %e, "Server error");
			}
		}
		_ = tokio::signal::ctrl_c() => {
			tracing::info!("Received shutdown signal");
		}
	}

	tracing::info!("Server shutdown complete");
	Ok(())
}
