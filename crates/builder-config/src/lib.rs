//! Configuration module for the transaction builder service.
//!
//! This module provides structures and utilities for managing service
//! configuration. It supports loading configuration from TOML files, resolves
//! `${VAR}` / `${VAR:-default}` references against the environment and
//! validates the result before the service starts.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files for better organization:
//! - Use `include = ["file1.toml", "file2.toml"]` to include other config files
//! - Each top-level section must be unique across all files (no duplicates allowed)

mod loader;

pub use loader::ConfigLoader;

use alloy_primitives::Address;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Extract just the message without the huge input dump
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for the builder service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// HTTP server settings.
	#[serde(default)]
	pub server: ServerConfig,
	/// Identity every accepted quote must be signed by.
	pub signer: SignerConfig,
	/// API key enforcement.
	#[serde(default)]
	pub auth: AuthConfig,
	/// Per-identity request budget.
	#[serde(default)]
	pub rate_limit: RateLimitConfig,
	/// External transaction construction backend.
	pub builders: BuildersConfig,
	/// RPC endpoints handed to the builders and used for on-chain reads.
	#[serde(default)]
	pub rpc: RpcConfig,
}

/// Configuration for the HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
	/// Host address to bind the server to.
	#[serde(default = "default_host")]
	pub host: String,
	/// Port to bind the server to.
	#[serde(default = "default_port")]
	pub port: u16,
	/// Request timeout in seconds.
	#[serde(default = "default_timeout_seconds")]
	pub timeout_seconds: u64,
	/// Maximum request size in bytes.
	#[serde(default = "default_max_request_size")]
	pub max_request_size: usize,
}

impl Default for ServerConfig {
	fn default() -> Self {
		Self {
			host: default_host(),
			port: default_port(),
			timeout_seconds: default_timeout_seconds(),
			max_request_size: default_max_request_size(),
		}
	}
}

fn default_host() -> String {
	"0.0.0.0".to_string()
}

fn default_port() -> u16 {
	3000
}

fn default_timeout_seconds() -> u64 {
	30
}

/// Quotes carry large nested payloads; 10 MiB matches what clients send in batch mode.
fn default_max_request_size() -> usize {
	10 * 1024 * 1024
}

/// Identity of the trusted quote signer.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SignerConfig {
	/// EVM address recovered signatures are compared against.
	pub expected_address: String,
}

/// API key authentication settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AuthConfig {
	/// Whether requests must present a known `X-API-Key`.
	#[serde(default)]
	pub enabled: bool,
	/// Accepted keys, as a list or a comma-separated string.
	#[serde(default, deserialize_with = "deserialize_key_list")]
	pub api_keys: Vec<String>,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
	/// Length of one counting window in milliseconds.
	#[serde(default = "default_window_ms")]
	pub window_ms: u64,
	/// Requests admitted per identity within one window.
	#[serde(default = "default_max_requests")]
	pub max_requests: u32,
	/// Interval between sweeps of expired windows.
	#[serde(default = "default_sweep_interval_ms")]
	pub sweep_interval_ms: u64,
	/// Paths that are authenticated but never throttled.
	#[serde(default = "default_exempt_paths")]
	pub exempt_paths: Vec<String>,
}

impl Default for RateLimitConfig {
	fn default() -> Self {
		Self {
			window_ms: default_window_ms(),
			max_requests: default_max_requests(),
			sweep_interval_ms: default_sweep_interval_ms(),
			exempt_paths: default_exempt_paths(),
		}
	}
}

fn default_window_ms() -> u64 {
	60_000
}

fn default_max_requests() -> u32 {
	100
}

fn default_sweep_interval_ms() -> u64 {
	60_000
}

fn default_exempt_paths() -> Vec<String> {
	vec!["/quote".to_string()]
}

/// Location of the transaction construction backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BuildersConfig {
	/// Base URL; requests go to `{url}/evm`, `{url}/svm` and `{url}/sui`.
	pub url: String,
	/// Timeout for a single build call in seconds.
	#[serde(default = "default_timeout_seconds")]
	pub timeout_seconds: u64,
}

/// RPC endpoints per chain.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RpcConfig {
	pub solana: Option<String>,
	pub fogo: Option<String>,
	pub sui: Option<String>,
	/// EVM endpoints keyed by decimal chain id.
	#[serde(default)]
	pub evm: HashMap<String, String>,
}

impl RpcConfig {
	/// Endpoint of an EVM chain, if configured.
	pub fn evm_url(&self, chain_id: u64) -> Option<&str> {
		self.evm.get(&chain_id.to_string()).map(String::as_str)
	}

	/// Endpoint of a Solana-family chain, if configured.
	pub fn svm_url(&self, chain: &str) -> Option<&str> {
		match chain {
			"solana" => self.solana.as_deref(),
			"fogo" => self.fogo.as_deref(),
			_ => None,
		}
	}
}

#[derive(Deserialize)]
#[serde(untagged)]
enum KeyList {
	List(Vec<String>),
	Joined(String),
}

/// Accepts `["a", "b"]` as well as `"a, b"`, dropping blank entries.
fn deserialize_key_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
	D: Deserializer<'de>,
{
	let keys = match KeyList::deserialize(deserializer)? {
		KeyList::List(keys) => keys,
		KeyList::Joined(joined) => joined.split(',').map(str::to_string).collect(),
	};
	Ok(keys
		.into_iter()
		.map(|key| key.trim().to_string())
		.filter(|key| !key.is_empty())
		.collect())
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
///
/// Input strings are limited to 1MB to prevent ReDoS attacks.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = String::with_capacity(input.len());
	let mut last = 0;

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let value = match std::env::var(var_name.as_str()) {
			Ok(v) => v,
			Err(_) => match cap.get(2) {
				Some(default) => default.as_str().to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name.as_str()
					)))
				}
			},
		};

		result.push_str(&input[last..full_match.start()]);
		result.push_str(&value);
		last = full_match.end();
	}
	result.push_str(&input[last..]);

	Ok(result)
}

impl Config {
	/// Loads configuration from a file, following `include` directives.
	///
	/// Each top-level section must be unique across all configuration files.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// Parsed expected signer address.
	pub fn signer_address(&self) -> Result<Address, ConfigError> {
		Address::from_str(self.signer.expected_address.trim()).map_err(|e| {
			ConfigError::Validation(format!(
				"Invalid signer address '{}': {}",
				self.signer.expected_address, e
			))
		})
	}

	/// Validates the configuration to ensure all required fields are properly set.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.signer.expected_address.trim().is_empty() {
			return Err(ConfigError::Validation(
				"Signer expected_address cannot be empty".into(),
			));
		}
		self.signer_address()?;

		if self.auth.enabled && self.auth.api_keys.is_empty() {
			return Err(ConfigError::Validation(
				"API key authentication is enabled but no api_keys are configured".into(),
			));
		}

		if self.rate_limit.window_ms == 0 {
			return Err(ConfigError::Validation(
				"rate_limit.window_ms must be greater than 0".into(),
			));
		}
		if self.rate_limit.max_requests == 0 {
			return Err(ConfigError::Validation(
				"rate_limit.max_requests must be greater than 0".into(),
			));
		}
		if self.rate_limit.sweep_interval_ms == 0 {
			return Err(ConfigError::Validation(
				"rate_limit.sweep_interval_ms must be greater than 0".into(),
			));
		}
		if let Some(path) = self
			.rate_limit
			.exempt_paths
			.iter()
			.find(|path| !path.starts_with('/'))
		{
			return Err(ConfigError::Validation(format!(
				"Exempt path '{}' must start with '/'",
				path
			)));
		}

		let url = self.builders.url.trim();
		if !(url.starts_with("http://") || url.starts_with("https://")) {
			return Err(ConfigError::Validation(format!(
				"builders.url must be an http(s) URL, got '{}'",
				self.builders.url
			)));
		}
		if self.builders.timeout_seconds == 0 {
			return Err(ConfigError::Validation(
				"builders.timeout_seconds must be greater than 0".into(),
			));
		}

		for chain_id in self.rpc.evm.keys() {
			if chain_id.parse::<u64>().is_err() {
				return Err(ConfigError::Validation(format!(
					"EVM RPC key '{}' is not a numeric chain id",
					chain_id
				)));
			}
		}

		Ok(())
	}
}

/// Parses a TOML string, resolving environment variables and validating the
/// result.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}
