// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration layer for merging from multiple sources.

use serde::Deserialize;

use crate::sections::{ConnectConfigLayer, HttpConfigLayer, LoggingConfigLayer, NodeAgentConfigLayer};

/// Server configuration layer - all fields are Option for merging.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfigLayer {
	#[serde(default)]
	pub http: Option<HttpConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
	#[serde(default)]
	pub connect: Option<ConnectConfigLayer>,
	#[serde(default)]
	pub node_agent: Option<NodeAgentConfigLayer>,
}

impl ServerConfigLayer {
	/// Merge another layer into this one. Other layer takes precedence.
	pub fn merge(&mut self, other: ServerConfigLayer) {
		merge_option(&mut self.http, other.http, HttpConfigLayer::merge);
		merge_option(&mut self.logging, other.logging, LoggingConfigLayer::merge);
		merge_option(&mut self.connect, other.connect, ConnectConfigLayer::merge);
		merge_option(
			&mut self.node_agent,
			other.node_agent,
			NodeAgentConfigLayer::merge,
		);
	}
}

fn merge_option<T, F>(target: &mut Option<T>, source: Option<T>, merge_fn: F)
where
	F: FnOnce(&mut T, T),
{
	match (target.as_mut(), source) {
		(Some(t), Some(s)) => merge_fn(t, s),
		(None, Some(s)) => *target = Some(s),
		_ => {}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_merge_preserves_base_when_other_empty() {
		let mut base = ServerConfigLayer {
			http: Some(HttpConfigLayer {
				port: Some(9000),
				..Default::default()
			}),
			..Default::default()
		};
		base.merge(ServerConfigLayer::default());
		assert_eq!(base.http.as_ref().unwrap().port, Some(9000));
	}

	#[test]
	fn test_merge_adds_missing_sections() {
		let mut base = ServerConfigLayer {
			http: Some(HttpConfigLayer {
				port: Some(9000),
				..Default::default()
			}),
			..Default::default()
		};
		let other = ServerConfigLayer {
			node_agent: Some(NodeAgentConfigLayer {
				port: Some(10255),
				..Default::default()
			}),
			..Default::default()
		};
		base.merge(other);
		assert_eq!(base.http.as_ref().unwrap().port, Some(9000));
		assert_eq!(base.node_agent.as_ref().unwrap().port, Some(10255));
	}

	#[test]
	fn test_parse_full_toml() {
		let layer: ServerConfigLayer = toml::from_str(
			r#"
[http]
port = 9443

[connect]
flush_interval_ms = 50

[node_agent]
enable_https = false
"#,
		)
		.unwrap();
		assert_eq!(layer.http.unwrap().port, Some(9443));
		assert_eq!(layer.connect.unwrap().flush_interval_ms, Some(50));
		assert_eq!(layer.node_agent.unwrap().enable_https, Some(false));
		assert!(layer.logging.is_none());
	}
}
