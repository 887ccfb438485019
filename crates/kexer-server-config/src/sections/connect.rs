// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Proxy behaviour for exec connections.

use std::time::Duration;

use serde::Deserialize;

const DEFAULT_FLUSH_INTERVAL_MS: u64 = 200;
const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 40;

/// Connector configuration (runtime, fully resolved).
#[derive(Debug, Clone)]
pub struct ConnectConfig {
	/// How often partial response output is flushed to the client.
	/// Zero forwards every chunk as soon as it arrives.
	pub flush_interval: Duration,
	/// Request timeout for lookups against remote control planes.
	pub remote_timeout: Duration,
}

impl Default for ConnectConfig {
	fn default() -> Self {
		ConnectConfigLayer::default().finalize()
	}
}

/// Connector configuration layer (partial, for merging).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectConfigLayer {
	#[serde(default)]
	pub flush_interval_ms: Option<u64>,
	#[serde(default)]
	pub remote_timeout_secs: Option<u64>,
}

impl ConnectConfigLayer {
	pub fn merge(&mut self, other: ConnectConfigLayer) {
		if other.flush_interval_ms.is_some() {
			self.flush_interval_ms = other.flush_interval_ms;
		}
		if other.remote_timeout_secs.is_some() {
			self.remote_timeout_secs = other.remote_timeout_secs;
		}
	}

	pub fn finalize(self) -> ConnectConfig {
		ConnectConfig {
			flush_interval: Duration::from_millis(
				self.flush_interval_ms.unwrap_or(DEFAULT_FLUSH_INTERVAL_MS),
			),
			remote_timeout: Duration::from_secs(
				self
					.remote_timeout_secs
					.unwrap_or(DEFAULT_REMOTE_TIMEOUT_SECS),
			),
		}
	}
}
