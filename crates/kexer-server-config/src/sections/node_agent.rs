// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! How the connector reaches node agents (kubelets).

use std::time::Duration;

use serde::Deserialize;

/// Node address types the connector understands, in default preference order.
///
/// Internal addresses come first (DNS before IP), then the override hostname,
/// then external addresses (DNS before IP).
pub const DEFAULT_PREFERRED_ADDRESS_TYPES: [&str; 5] = [
	"InternalDNS",
	"InternalIP",
	"Hostname",
	"ExternalDNS",
	"ExternalIP",
];

/// Node agent configuration (runtime, fully resolved).
#[derive(Debug, Clone)]
pub struct NodeAgentConfig {
	/// Port used when the node does not report its own kubelet endpoint.
	pub port: u16,
	pub enable_https: bool,
	pub timeout: Duration,
	pub preferred_address_types: Vec<String>,
	/// Skip verification of the node agent's serving certificate.
	pub insecure_skip_verify: bool,
}

impl Default for NodeAgentConfig {
	fn default() -> Self {
		NodeAgentConfigLayer::default().finalize()
	}
}

/// Node agent configuration layer (partial, for merging).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeAgentConfigLayer {
	#[serde(default)]
	pub port: Option<u16>,
	#[serde(default)]
	pub enable_https: Option<bool>,
	#[serde(default)]
	pub timeout_secs: Option<u64>,
	#[serde(default)]
	pub preferred_address_types: Option<Vec<String>>,
	#[serde(default)]
	pub insecure_skip_verify: Option<bool>,
}

impl NodeAgentConfigLayer {
	pub fn merge(&mut self, other: NodeAgentConfigLayer) {
		if other.port.is_some() {
			self.port = other.port;
		}
		if other.enable_https.is_some() {
			self.enable_https = other.enable_https;
		}
		if other.timeout_secs.is_some() {
			self.timeout_secs = other.timeout_secs;
		}
		if other.preferred_address_types.is_some() {
			self.preferred_address_types = other.preferred_address_types;
		}
		if other.insecure_skip_verify.is_some() {
			self.insecure_skip_verify = other.insecure_skip_verify;
		}
	}

	pub fn finalize(self) -> NodeAgentConfig {
		NodeAgentConfig {
			port: self.port.unwrap_or(10250),
			enable_https: self.enable_https.unwrap_or(true),
			timeout: Duration::from_secs(self.timeout_secs.unwrap_or(5)),
			preferred_address_types: self.preferred_address_types.unwrap_or_else(|| {
				DEFAULT_PREFERRED_ADDRESS_TYPES
					.iter()
					.map(|s| s.to_string())
					.collect()
			}),
			insecure_skip_verify: self.insecure_skip_verify.unwrap_or(false),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_values() {
		let config = NodeAgentConfig::default();
		assert_eq!(config.port, 10250);
		assert!(config.enable_https);
		assert_eq!(config.timeout, Duration::from_secs(5));
		assert_eq!(
			config.preferred_address_types,
			vec![
				"InternalDNS",
				"InternalIP",
				"Hostname",
				"ExternalDNS",
				"ExternalIP"
			]
		);
		assert!(!config.insecure_skip_verify);
	}

	#[test]
	fn test_deserialize_address_types() {
		let layer: NodeAgentConfigLayer = toml::from_str(
			r#"
port = 11250
preferred_address_types = ["ExternalIP", "InternalIP"]
"#,
		)
		.unwrap();
		let config = layer.finalize();
		assert_eq!(config.port, 11250);
		assert_eq!(config.preferred_address_types, vec!["ExternalIP", "InternalIP"]);
	}
}
