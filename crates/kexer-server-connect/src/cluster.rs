// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Cluster descriptors and the resolver that turns them into client
//! configuration plus a Kubernetes client.

use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use kexer_server_k8s::{K8sClient, KubeClient};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, instrument};

use crate::error::{ConnectError, ConnectResult};

/// A stored cluster object's connection details.
///
/// Both fields empty means "the cluster this server runs in".
#[derive(Debug, Clone)]
pub struct ClusterDescriptor {
	pub endpoint_url: String,
	pub secret_token: SecretString,
}

impl ClusterDescriptor {
	pub fn local() -> Self {
		Self::remote("", "")
	}

	pub fn remote(endpoint_url: impl Into<String>, secret_token: impl Into<String>) -> Self {
		Self {
			endpoint_url: endpoint_url.into(),
			secret_token: SecretString::from(secret_token.into()),
		}
	}

	pub fn is_local(&self) -> bool {
		self.endpoint_url.is_empty() && self.secret_token.expose_secret().is_empty()
	}
}

/// Loads the descriptor for the cluster object named by a connect request.
#[async_trait]
pub trait ClusterGetter: Send + Sync {
	async fn get(&self, namespace: &str, name: &str) -> ConnectResult<ClusterDescriptor>;
}

/// How peer certificates are checked.
#[derive(Debug, Clone)]
pub enum TlsPolicy {
	SkipVerification,
	/// Verify against the platform roots plus these DER-encoded certificates.
	Verify { root_certs: Vec<Vec<u8>> },
}

impl TlsPolicy {
	pub fn system_roots() -> Self {
		TlsPolicy::Verify {
			root_certs: Vec::new(),
		}
	}

	pub fn skips_verification(&self) -> bool {
		matches!(self, TlsPolicy::SkipVerification)
	}
}

/// PEM-encoded client certificate and private key.
#[derive(Clone)]
pub struct ClientIdentity {
	pub certificate_pem: String,
	pub private_key_pem: SecretString,
}

impl ClientIdentity {
	/// Certificate followed by key, the form TLS backends load an identity from.
	pub fn to_pem_bundle(&self) -> Vec<u8> {
		let mut bundle = Vec::with_capacity(
			self.certificate_pem.len() + self.private_key_pem.expose_secret().len() + 1,
		);
		bundle.extend_from_slice(self.certificate_pem.as_bytes());
		if !self.certificate_pem.ends_with('\n') {
			bundle.push(b'\n');
		}
		bundle.extend_from_slice(self.private_key_pem.expose_secret().as_bytes());
		bundle
	}
}

impl fmt::Debug for ClientIdentity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ClientIdentity")
			.field("certificate_pem", &format_args!("{} bytes", self.certificate_pem.len()))
			.field("private_key_pem", &"[REDACTED]")
			.finish()
	}
}

/// Client configuration for talking to one cluster's control plane.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
	/// Control plane URL; a bare `host:port` is treated as `https`.
	pub host: String,
	pub bearer_token: Option<SecretString>,
	pub tls: TlsPolicy,
	pub client_identity: Option<ClientIdentity>,
	pub timeout: Option<Duration>,
}

impl ClusterConfig {
	/// Configuration for a remote cluster: the descriptor's endpoint and
	/// token, with certificate verification disabled.
	pub fn remote(descriptor: &ClusterDescriptor, timeout: Duration) -> Self {
		Self {
			host: descriptor.endpoint_url.clone(),
			bearer_token: Some(descriptor.secret_token.clone()),
			tls: TlsPolicy::SkipVerification,
			client_identity: None,
			timeout: Some(timeout),
		}
	}

	/// The control plane base URI, defaulting the scheme to `https`.
	pub fn base_uri(&self) -> ConnectResult<http::Uri> {
		let host = self.host.trim_end_matches('/');
		if host.is_empty() {
			return Err(ConnectError::internal(
				"invalid client config",
				"cluster host is empty",
			));
		}

		let with_scheme = if host.contains("://") {
			host.to_string()
		} else {
			format!("https://{host}")
		};

		let uri: http::Uri = with_scheme
			.parse()
			.map_err(|e| ConnectError::internal("invalid client config", e))?;
		if uri.authority().is_none() {
			return Err(ConnectError::internal(
				"invalid client config",
				format!("cluster host {host} has no authority"),
			));
		}
		Ok(uri)
	}

	/// Scheme and authority of the control plane.
	pub fn scheme_and_authority(&self) -> ConnectResult<(String, String)> {
		let uri = self.base_uri()?;
		let scheme = uri.scheme_str().unwrap_or("https").to_string();
		let authority = uri
			.authority()
			.map(|a| a.as_str().to_string())
			.unwrap_or_default();
		Ok((scheme, authority))
	}
}

/// Builds a Kubernetes client for a cluster configuration.
pub trait ClusterClientFactory: Send + Sync {
	fn client_for(&self, config: &ClusterConfig) -> ConnectResult<Arc<dyn K8sClient>>;
}

/// Factory backed by `kube`.
#[derive(Debug, Default, Clone, Copy)]
pub struct KubeClientFactory;

impl ClusterClientFactory for KubeClientFactory {
	fn client_for(&self, config: &ClusterConfig) -> ConnectResult<Arc<dyn K8sClient>> {
		let mut kube_config = kube::Config::new(config.base_uri()?);
		kube_config.accept_invalid_certs = config.tls.skips_verification();
		if let TlsPolicy::Verify { root_certs } = &config.tls {
			if !root_certs.is_empty() {
				kube_config.root_cert = Some(root_certs.clone());
			}
		}
		kube_config.connect_timeout = config.timeout;
		kube_config.read_timeout = config.timeout;

		if let Some(token) = &config.bearer_token {
			kube_config.auth_info.token = Some(token.expose_secret().to_string().into());
		}
		if let Some(identity) = &config.client_identity {
			let engine = base64::engine::general_purpose::STANDARD;
			kube_config.auth_info.client_certificate_data =
				Some(engine.encode(identity.certificate_pem.as_bytes()));
			kube_config.auth_info.client_key_data = Some(
				engine
					.encode(identity.private_key_pem.expose_secret().as_bytes())
					.into(),
			);
		}

		let client = KubeClient::from_config(kube_config)
			.map_err(|e| ConnectError::internal("invalid client config", e))?;
		Ok(Arc::new(client))
	}
}

/// The process-wide client for the cluster this server runs in.
#[derive(Clone)]
pub struct LoopbackClient {
	pub config: ClusterConfig,
	pub client: Arc<dyn K8sClient>,
}

impl fmt::Debug for LoopbackClient {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("LoopbackClient")
			.field("config", &self.config)
			.finish_non_exhaustive()
	}
}

/// Whether the loopback client has been installed yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopbackState {
	NotReady,
	Ready,
}

/// Write-once holder for the loopback client. Installed during startup and
/// only read afterwards.
#[derive(Debug, Default)]
pub struct LoopbackHandle {
	inner: OnceLock<LoopbackClient>,
}

impl LoopbackHandle {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn ready(client: LoopbackClient) -> Self {
		let handle = Self::new();
		let _ = handle.inner.set(client);
		handle
	}

	/// Install the loopback client. Fails if one is already installed.
	pub fn install(&self, client: LoopbackClient) -> ConnectResult<()> {
		self.inner.set(client).map_err(|_| {
			ConnectError::internal(
				"loopback client already installed",
				"install called more than once",
			)
		})
	}

	pub fn get(&self) -> Option<&LoopbackClient> {
		self.inner.get()
	}

	pub fn state(&self) -> LoopbackState {
		match self.inner.get() {
			Some(_) => LoopbackState::Ready,
			None => LoopbackState::NotReady,
		}
	}
}

/// Cluster configuration paired with a client for it.
#[derive(Clone)]
pub struct ResolvedCluster {
	pub config: ClusterConfig,
	pub client: Arc<dyn K8sClient>,
}

impl fmt::Debug for ResolvedCluster {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ResolvedCluster")
			.field("config", &self.config)
			.finish_non_exhaustive()
	}
}

/// Maps a cluster descriptor to the configuration and client to use.
#[derive(Clone)]
pub struct ClusterConfigResolver {
	loopback: Arc<LoopbackHandle>,
	factory: Arc<dyn ClusterClientFactory>,
	remote_timeout: Duration,
}

impl ClusterConfigResolver {
	pub fn new(
		loopback: Arc<LoopbackHandle>,
		factory: Arc<dyn ClusterClientFactory>,
		remote_timeout: Duration,
	) -> Self {
		Self {
			loopback,
			factory,
			remote_timeout,
		}
	}

	/// Local descriptors get the loopback configuration; anything else gets a
	/// fresh client for its endpoint. Nothing is cached across calls.
	#[instrument(skip(self, descriptor), fields(endpoint = %descriptor.endpoint_url))]
	pub fn resolve(&self, descriptor: &ClusterDescriptor) -> ConnectResult<ResolvedCluster> {
		if descriptor.is_local() {
			let loopback = self.loopback.get().ok_or(ConnectError::ConfigUnavailable)?;
			debug!("using loopback cluster configuration");
			return Ok(ResolvedCluster {
				config: loopback.config.clone(),
				client: Arc::clone(&loopback.client),
			});
		}

		let config = ClusterConfig::remote(descriptor, self.remote_timeout);
		let client = self.factory.client_for(&config)?;
		debug!("built remote cluster client");
		Ok(ResolvedCluster { config, client })
	}
}
