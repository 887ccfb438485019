// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Cluster descriptors backed by Kubernetes secrets.
//!
//! A cluster named `prod` in namespace `ops` is described by the secret
//! `ops/prod`, with the control plane URL under `endpointUrl` and the bearer
//! token under `token`. No secret means the cluster is the one this server
//! runs in.

use std::sync::Arc;

use async_trait::async_trait;
use kexer_server_connect::{ClusterDescriptor, ClusterGetter, ConnectError, ConnectResult, LoopbackHandle};
use kexer_server_k8s::Secret;
use tracing::{debug, instrument};

pub const ENDPOINT_URL_KEY: &str = "endpointUrl";
pub const TOKEN_KEY: &str = "token";

/// Reads cluster descriptors with the loopback client.
pub struct SecretClusterStore {
	loopback: Arc<LoopbackHandle>,
}

impl SecretClusterStore {
	pub fn new(loopback: Arc<LoopbackHandle>) -> Self {
		Self { loopback }
	}
}

#[async_trait]
impl ClusterGetter for SecretClusterStore {
	#[instrument(skip(self))]
	async fn get(&self, namespace: &str, name: &str) -> ConnectResult<ClusterDescriptor> {
		let loopback = self.loopback.get().ok_or(ConnectError::ConfigUnavailable)?;

		match loopback.client.get_secret(name, namespace).await {
			Ok(secret) => descriptor_from_secret(&secret),
			Err(e) if e.is_not_found() => {
				debug!("no cluster secret, using the local cluster");
				Ok(ClusterDescriptor::local())
			}
			Err(e) => Err(e.into()),
		}
	}
}

/// Build a descriptor from a secret's data. Absent keys read as empty.
pub fn descriptor_from_secret(secret: &Secret) -> ConnectResult<ClusterDescriptor> {
	let read = |key: &str| -> ConnectResult<String> {
		let Some(value) = secret.data.as_ref().and_then(|data| data.get(key)) else {
			return Ok(String::new());
		};
		let text = String::from_utf8(value.0.clone())
			.map_err(|e| ConnectError::internal("invalid cluster secret", format!("{key}: {e}")))?;
		Ok(text.trim().to_string())
	};

	Ok(ClusterDescriptor::remote(
		read(ENDPOINT_URL_KEY)?,
		read(TOKEN_KEY)?,
	))
}
