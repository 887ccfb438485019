// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Startup hook that installs the loopback client for the cluster this
//! server runs in.

use std::sync::Arc;

use base64::Engine;
use kexer_server_connect::{
	ClientIdentity, ClusterConfig, LoopbackClient, LoopbackHandle, TlsPolicy,
};
use kexer_server_k8s::KubeClient;
use secrecy::{ExposeSecret, SecretString};
use tracing::{info, warn};

/// Errors raised while building the loopback client.
#[derive(Debug, thiserror::Error)]
pub enum LoopbackError {
	#[error("failed to infer cluster configuration: {0}")]
	Infer(#[from] kube::config::InferConfigError),

	#[error("invalid client config: {0}")]
	InvalidConfig(String),

	#[error("failed to read {path}: {source}")]
	ReadFile {
		path: String,
		#[source]
		source: std::io::Error,
	},

	#[error(transparent)]
	Install(#[from] kexer_server_connect::ConnectError),
}

/// Infer the in-cluster (or kubeconfig) configuration and install it.
pub async fn install_from_environment(handle: &LoopbackHandle) -> Result<(), LoopbackError> {
	let config = kube::Config::infer().await?;
	let client = loopback_client(config)?;
	info!(host = %client.config.host, "loopback client ready");
	handle.install(client)?;
	Ok(())
}

/// Build the loopback client from a `kube` configuration.
pub fn loopback_client(config: kube::Config) -> Result<LoopbackClient, LoopbackError> {
	let cluster = cluster_config(&config)?;
	let client = KubeClient::from_config(config)
		.map_err(|e| LoopbackError::InvalidConfig(e.to_string()))?;
	Ok(LoopbackClient {
		config: cluster,
		client: Arc::new(client),
	})
}

/// The parts of a `kube` configuration the connector needs to dial the
/// control plane and node agents itself.
pub fn cluster_config(config: &kube::Config) -> Result<ClusterConfig, LoopbackError> {
	let auth = &config.auth_info;

	let bearer_token = match (&auth.token, &auth.token_file) {
		(Some(token), _) => Some(SecretString::from(token.expose_secret().to_string())),
		(None, Some(path)) => {
			let token = std::fs::read_to_string(path).map_err(|source| LoopbackError::ReadFile {
				path: path.clone(),
				source,
			})?;
			Some(SecretString::from(token.trim().to_string()))
		}
		(None, None) => None,
	};
	if bearer_token.is_none() && auth.exec.is_some() {
		warn!("exec credential plugins are not forwarded; proxied requests carry no bearer token");
	}

	let tls = if config.accept_invalid_certs {
		TlsPolicy::SkipVerification
	} else {
		TlsPolicy::Verify {
			root_certs: config.root_cert.clone().unwrap_or_default(),
		}
	};

	Ok(ClusterConfig {
		host: config.cluster_url.to_string(),
		bearer_token,
		tls,
		client_identity: client_identity(auth)?,
		timeout: config.connect_timeout,
	})
}

fn client_identity(auth: &kube::config::AuthInfo) -> Result<Option<ClientIdentity>, LoopbackError> {
	let certificate = match (&auth.client_certificate_data, &auth.client_certificate) {
		(Some(data), _) => Some(decode_pem("client-certificate-data", data)?),
		(None, Some(path)) => Some(read_pem(path)?),
		(None, None) => None,
	};
	let key = match (&auth.client_key_data, &auth.client_key) {
		(Some(data), _) => Some(decode_pem("client-key-data", data.expose_secret())?),
		(None, Some(path)) => Some(read_pem(path)?),
		(None, None) => None,
	};

	match (certificate, key) {
		(Some(certificate_pem), Some(key_pem)) => Ok(Some(ClientIdentity {
			certificate_pem,
			private_key_pem: SecretString::from(key_pem),
		})),
		(None, None) => Ok(None),
		_ => Err(LoopbackError::InvalidConfig(
			"client certificate and key must be configured together".to_string(),
		)),
	}
}

fn decode_pem(field: &str, data: &str) -> Result<String, LoopbackError> {
	let bytes = base64::engine::general_purpose::STANDARD
		.decode(data.trim())
		.map_err(|e| LoopbackError::InvalidConfig(format!("{field}: {e}")))?;
	String::from_utf8(bytes).map_err(|e| LoopbackError::InvalidConfig(format!("{field}: {e}")))
}

fn read_pem(path: &str) -> Result<String, LoopbackError> {
	std::fs::read_to_string(path).map_err(|source| LoopbackError::ReadFile {
		path: path.to_string(),
		source,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::time::Duration;

	fn base_config() -> kube::Config {
		kube::Config::new("https://10.96.0.1:443".parse().unwrap())
	}

	#[test]
	fn copies_host_token_and_roots() {
		let mut config = base_config();
		config.auth_info.token = Some("sa-token".to_string().into());
		config.root_cert = Some(vec![vec![1, 2, 3]]);
		config.connect_timeout = Some(Duration::from_secs(30));

		let cluster = cluster_config(&config).unwrap();
		assert!(cluster.host.starts_with("https://10.96.0.1:443"));
		assert_eq!(cluster.bearer_token.unwrap().expose_secret(), "sa-token");
		assert!(matches!(cluster.tls, TlsPolicy::Verify { ref root_certs } if root_certs.len() == 1));
		assert!(cluster.client_identity.is_none());
		assert_eq!(cluster.timeout, Some(Duration::from_secs(30)));
	}

	#[test]
	fn reads_token_file() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("token");
		std::fs::write(&path, "file-token\n").unwrap();

		let mut config = base_config();
		config.auth_info.token_file = Some(path.display().to_string());
		let cluster = cluster_config(&config).unwrap();
		assert_eq!(cluster.bearer_token.unwrap().expose_secret(), "file-token");
	}

	#[test]
	fn decodes_client_identity() {
		let engine = base64::engine::general_purpose::STANDARD;
		let mut config = base_config();
		config.auth_info.client_certificate_data = Some(engine.encode("CERT PEM"));
		config.auth_info.client_key_data = Some(engine.encode("KEY PEM").into());

		let identity = cluster_config(&config).unwrap().client_identity.unwrap();
		assert_eq!(identity.certificate_pem, "CERT PEM");
		assert_eq!(identity.private_key_pem.expose_secret(), "KEY PEM");
	}

	#[test]
	fn certificate_without_key_is_rejected() {
		let engine = base64::engine::general_purpose::STANDARD;
		let mut config = base_config();
		config.auth_info.client_certificate_data = Some(engine.encode("CERT PEM"));
		assert!(matches!(
			cluster_config(&config),
			Err(LoopbackError::InvalidConfig(_))
		));
	}

	#[test]
	fn insecure_config_skips_verification() {
		let mut config = base_config();
		config.accept_invalid_certs = true;
		assert!(cluster_config(&config).unwrap().tls.skips_verification());
	}
}
