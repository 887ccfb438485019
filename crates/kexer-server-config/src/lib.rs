// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Centralized configuration management for kexer-server.
//!
//! This crate provides:
//! - Layered configuration from multiple sources (defaults, TOML file, environment)
//! - Type-safe configuration with validation
//! - Consistent environment variable naming (`KEXER_SERVER_*`)
//!
//! # Usage
//!
//! ```ignore
//! use kexer_server_config::load_config;
//!
//! let config = load_config()?;
//! println!("Server listening on {}:{}", config.http.host, config.http.port);
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

/// Fully resolved server configuration.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
	pub http: HttpConfig,
	pub logging: LoggingConfig,
	pub connect: ConnectConfig,
	pub node_agent: NodeAgentConfig,
}

impl ServerConfig {
	/// Get the socket address string for binding.
	pub fn socket_addr(&self) -> String {
		format!("{}:{}", self.http.host, self.http.port)
	}
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`KEXER_SERVER_*`)
/// 2. Config file (`/etc/kexer/server.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
fn finalize(layer: ServerConfigLayer) -> Result<ServerConfig, ConfigError> {
	let http = layer.http.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();
	let connect = layer.connect.unwrap_or_default().finalize();
	let node_agent = layer.node_agent.unwrap_or_default().finalize();

	validate_node_agent(&node_agent)?;

	info!(
		host = %http.host,
		port = http.port,
		flush_interval_ms = connect.flush_interval.as_millis() as u64,
		node_agent_port = node_agent.port,
		node_agent_https = node_agent.enable_https,
		"Server configuration loaded"
	);

	Ok(ServerConfig {
		http,
		logging,
		connect,
		node_agent,
	})
}

/// Validate cross-field configuration rules.
fn validate_node_agent(node_agent: &NodeAgentConfig) -> Result<(), ConfigError> {
	if node_agent.preferred_address_types.is_empty() {
		return Err(ConfigError::Validation(
			"node_agent.preferred_address_types must name at least one address type".to_string(),
		));
	}

	for address_type in &node_agent.preferred_address_types {
		if !DEFAULT_PREFERRED_ADDRESS_TYPES.contains(&address_type.as_str()) {
			return Err(ConfigError::InvalidValue {
				key: "node_agent.preferred_address_types".to_string(),
				message: format!(
					"unknown address type '{address_type}', expected one of {}",
					DEFAULT_PREFERRED_ADDRESS_TYPES.join(", ")
				),
			});
		}
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	#[test]
	fn test_socket_addr() {
		let config = ServerConfig {
			http: HttpConfig {
				host: "127.0.0.1".to_string(),
				port: 9000,
			},
			..Default::default()
		};
		assert_eq!(config.socket_addr(), "127.0.0.1:9000");
	}

	#[test]
	fn test_unknown_address_type_rejected() {
		let node_agent = NodeAgentConfig {
			preferred_address_types: vec!["InternalIP".to_string(), "Bogus".to_string()],
			..Default::default()
		};
		let err = validate_node_agent(&node_agent).unwrap_err();
		assert!(err.to_string().contains("Bogus"));
	}

	#[test]
	fn test_empty_address_types_rejected() {
		let node_agent = NodeAgentConfig {
			preferred_address_types: Vec::new(),
			..Default::default()
		};
		assert!(matches!(
			validate_node_agent(&node_agent),
			Err(ConfigError::Validation(_))
		));
	}

	#[test]
	fn test_file_overrides_defaults() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "[connect]\nremote_timeout_secs = 10\n").unwrap();
		let config = load_from_sources(vec![
			Box::new(TomlSource::new(file.path())),
			Box::new(DefaultsSource),
		])
		.unwrap();
		assert_eq!(config.connect.remote_timeout.as_secs(), 10);
		assert_eq!(config.connect.flush_interval.as_millis(), 200);
		assert_eq!(config.node_agent.port, 10250);
	}
}
