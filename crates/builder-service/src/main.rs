//! Main entry point for the transaction builder service.
//!
//! The service verifies signed swap quotes, checks the request parameters and
//! asks the construction backend of the quote's chain category for unsigned
//! transactions, returning them in one normalized envelope.

use builder_admission::AdmissionGate;
use builder_config::Config;
use builder_core::BuilderEngine;
use clap::Parser;
use server::AppState;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

mod apis;
mod server;

/// Command-line arguments for the builder service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config/builder.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let default_directive = args.log_level.to_string();
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	let config_path = args.config.to_string_lossy();
	let config = Config::from_file(&config_path).await?;
	tracing::info!("Loaded configuration from {}", config_path);

	let signer = config.signer_address()?;
	let engine = BuilderEngine::from_config(&config)?;
	let gate = AdmissionGate::from_config(&config.auth, &config.rate_limit);
	let sweeper =
		gate.spawn_sweeper(Duration::from_millis(config.rate_limit.sweep_interval_ms));

	tracing::info!(
		signer = %signer,
		auth_enabled = config.auth.enabled,
		window_ms = config.rate_limit.window_ms,
		max_requests = config.rate_limit.max_requests,
		"Started transaction builder"
	);

	let state = AppState {
		engine: Arc::new(engine),
		gate,
	};
	let result = server::start_server(&config.server, state, shutdown_signal()).await;

	sweeper.shutdown();
	tracing::info!("Stopped transaction builder");
	result
}

/// Resolves on Ctrl+C.
async fn shutdown_signal() {
	if let Err(e) = tokio::signal::ctrl_c().await {
		tracing::error!("Failed to listen for shutdown signal: {}", e);
		std::future::pending::<()>().await;
	}
	tracing::info!("Shutdown signal received");
}
