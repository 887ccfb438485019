// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Resolving a node name to the address, port and transport of its node
//! agent.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kexer_server_config::NodeAgentConfig;
use kexer_server_k8s::{K8sClient, Node};
use secrecy::SecretString;
use tracing::{debug, instrument, warn};

use crate::cluster::{ClientIdentity, ClusterConfig, TlsPolicy};
use crate::error::{ConnectError, ConnectResult};

const HOSTNAME_LABEL: &str = "kubernetes.io/hostname";

/// Node address kinds as reported in node status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeAddressType {
	InternalDns,
	InternalIp,
	Hostname,
	ExternalDns,
	ExternalIp,
}

impl NodeAddressType {
	pub fn as_str(&self) -> &'static str {
		match self {
			NodeAddressType::InternalDns => "InternalDNS",
			NodeAddressType::InternalIp => "InternalIP",
			NodeAddressType::Hostname => "Hostname",
			NodeAddressType::ExternalDns => "ExternalDNS",
			NodeAddressType::ExternalIp => "ExternalIP",
		}
	}

	pub fn default_preference() -> Vec<NodeAddressType> {
		vec![
			NodeAddressType::InternalDns,
			NodeAddressType::InternalIp,
			NodeAddressType::Hostname,
			NodeAddressType::ExternalDns,
			NodeAddressType::ExternalIp,
		]
	}
}

impl fmt::Display for NodeAddressType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for NodeAddressType {
	type Err = ConnectError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"InternalDNS" => Ok(NodeAddressType::InternalDns),
			"InternalIP" => Ok(NodeAddressType::InternalIp),
			"Hostname" => Ok(NodeAddressType::Hostname),
			"ExternalDNS" => Ok(NodeAddressType::ExternalDns),
			"ExternalIP" => Ok(NodeAddressType::ExternalIp),
			other => Err(ConnectError::InvalidOptions(format!(
				"unknown node address type {other}"
			))),
		}
	}
}

/// Node agent settings in the form the resolver consumes.
#[derive(Debug, Clone)]
pub struct NodeAgentSettings {
	pub port: u16,
	pub enable_https: bool,
	pub timeout: Duration,
	pub preferred_address_types: Vec<NodeAddressType>,
	pub insecure_skip_verify: bool,
}

impl Default for NodeAgentSettings {
	fn default() -> Self {
		Self::from(&NodeAgentConfig::default())
	}
}

impl From<&NodeAgentConfig> for NodeAgentSettings {
	fn from(config: &NodeAgentConfig) -> Self {
		let mut preferred = Vec::with_capacity(config.preferred_address_types.len());
		for name in &config.preferred_address_types {
			match name.parse() {
				Ok(address_type) => preferred.push(address_type),
				Err(_) => warn!(address_type = %name, "ignoring unknown node address type"),
			}
		}
		if preferred.is_empty() {
			preferred = NodeAddressType::default_preference();
		}

		Self {
			port: config.port,
			enable_https: config.enable_https,
			timeout: config.timeout,
			preferred_address_types: preferred,
			insecure_skip_verify: config.insecure_skip_verify,
		}
	}
}

impl NodeAgentSettings {
	pub fn scheme(&self) -> &'static str {
		if self.enable_https {
			"https"
		} else {
			"http"
		}
	}
}

/// Credentials and TLS settings for dialing a node agent.
#[derive(Debug, Clone)]
pub struct NodeTransport {
	pub bearer_token: Option<SecretString>,
	pub tls: TlsPolicy,
	pub client_identity: Option<ClientIdentity>,
	pub timeout: Duration,
}

impl NodeTransport {
	/// Node agent transport for a cluster: the cluster's credentials, its
	/// trust roots unless verification is switched off for node agents.
	pub fn for_cluster(cluster: &ClusterConfig, settings: &NodeAgentSettings) -> Self {
		let tls = if settings.insecure_skip_verify {
			TlsPolicy::SkipVerification
		} else {
			cluster.tls.clone()
		};

		Self {
			bearer_token: cluster.bearer_token.clone(),
			tls,
			client_identity: cluster.client_identity.clone(),
			timeout: settings.timeout,
		}
	}
}

/// Where and how to reach a node's agent.
#[derive(Debug, Clone)]
pub struct NodeConnectionInfo {
	pub scheme: String,
	pub hostname: String,
	pub port: u16,
	pub transport: NodeTransport,
}

/// Pluggable node lookup used by the target locator.
#[async_trait]
pub trait NodeConnectionResolver: Send + Sync {
	async fn connection_info(&self, node_name: &str) -> ConnectResult<NodeConnectionInfo>;
}

/// Resolver that reads the node object and picks its preferred address.
pub struct KubeletConnectionResolver {
	client: Arc<dyn K8sClient>,
	settings: NodeAgentSettings,
	transport: NodeTransport,
}

impl KubeletConnectionResolver {
	pub fn new(
		client: Arc<dyn K8sClient>,
		settings: NodeAgentSettings,
		cluster: &ClusterConfig,
	) -> Self {
		let transport = NodeTransport::for_cluster(cluster, &settings);
		Self {
			client,
			settings,
			transport,
		}
	}
}

#[async_trait]
impl NodeConnectionResolver for KubeletConnectionResolver {
	#[instrument(skip(self))]
	async fn connection_info(&self, node_name: &str) -> ConnectResult<NodeConnectionInfo> {
		let node = self.client.get_node(node_name).await?;

		let hostname = preferred_address(&node, &self.settings.preferred_address_types)
			.ok_or_else(|| {
				ConnectError::internal(
					format!("no preferred addresses found for node {node_name}"),
					format!("known addresses: {}", known_addresses(&node)),
				)
			})?;
		let port = reported_port(&node).unwrap_or(self.settings.port);

		debug!(hostname = %hostname, port, "resolved node agent address");
		Ok(NodeConnectionInfo {
			scheme: self.settings.scheme().to_string(),
			hostname,
			port,
			transport: self.transport.clone(),
		})
	}
}

/// First address matching the preference order. A node with no `Hostname`
/// address still matches that type through its hostname label.
pub fn preferred_address(node: &Node, preference: &[NodeAddressType]) -> Option<String> {
	let addresses = node
		.status
		.as_ref()
		.and_then(|s| s.addresses.as_deref())
		.unwrap_or_default();

	for wanted in preference {
		if let Some(found) = addresses
			.iter()
			.find(|a| a.type_ == wanted.as_str() && !a.address.is_empty())
		{
			return Some(found.address.clone());
		}

		if *wanted == NodeAddressType::Hostname {
			let label = node
				.metadata
				.labels
				.as_ref()
				.and_then(|labels| labels.get(HOSTNAME_LABEL))
				.filter(|v| !v.is_empty());
			if let Some(hostname) = label {
				return Some(hostname.clone());
			}
		}
	}

	None
}

/// The kubelet port the node reports about itself, if any.
fn reported_port(node: &Node) -> Option<u16> {
	let port = node
		.status
		.as_ref()?
		.daemon_endpoints
		.as_ref()?
		.kubelet_endpoint
		.as_ref()?
		.port;
	u16::try_from(port).ok().filter(|p| *p > 0)
}

fn known_addresses(node: &Node) -> String {
	node.status
		.as_ref()
		.and_then(|s| s.addresses.as_ref())
		.map(|addresses| {
			addresses
				.iter()
				.map(|a| format!("{}={}", a.type_, a.address))
				.collect::<Vec<_>>()
				.join(", ")
		})
		.unwrap_or_default()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::{node_with, MockK8sClient};
	use secrecy::ExposeSecret;

	fn cluster() -> ClusterConfig {
		ClusterConfig {
			host: "https://10.0.0.1".to_string(),
			bearer_token: Some(SecretString::from("cluster-token".to_string())),
			tls: TlsPolicy::Verify {
				root_certs: vec![vec![1, 2, 3]],
			},
			client_identity: None,
			timeout: None,
		}
	}

	#[test]
	fn parses_known_address_types() {
		for name in kexer_server_config::DEFAULT_PREFERRED_ADDRESS_TYPES {
			let parsed: NodeAddressType = name.parse().unwrap();
			assert_eq!(parsed.as_str(), name);
		}
		assert!("Bogus".parse::<NodeAddressType>().is_err());
	}

	#[test]
	fn preference_order_wins_over_status_order() {
		let node = node_with(
			"n1",
			&[("ExternalIP", "34.1.1.1"), ("InternalIP", "10.0.0.7")],
			None,
		);
		let preference = NodeAddressType::default_preference();
		assert_eq!(
			preferred_address(&node, &preference).as_deref(),
			Some("10.0.0.7")
		);
		assert_eq!(
			preferred_address(&node, &[NodeAddressType::ExternalIp]).as_deref(),
			Some("34.1.1.1")
		);
	}

	#[test]
	fn hostname_falls_back_to_label() {
		let mut node = node_with("n1", &[("ExternalIP", "34.1.1.1")], None);
		node.metadata.labels = Some(
			[(HOSTNAME_LABEL.to_string(), "node-one".to_string())]
				.into_iter()
				.collect(),
		);
		assert_eq!(
			preferred_address(&node, &NodeAddressType::default_preference()).as_deref(),
			Some("node-one")
		);
	}

	#[test]
	fn no_matching_address_is_none() {
		let node = node_with("n1", &[], None);
		assert!(preferred_address(&node, &NodeAddressType::default_preference()).is_none());
	}

	#[tokio::test]
	async fn uses_reported_port_when_positive() {
		let client = MockK8sClient::new();
		client.add_node(node_with("n1", &[("InternalIP", "10.0.0.7")], Some(10255)));
		client.add_node(node_with("n2", &[("InternalIP", "10.0.0.8")], Some(0)));

		let resolver =
			KubeletConnectionResolver::new(Arc::new(client), NodeAgentSettings::default(), &cluster());

		let info = resolver.connection_info("n1").await.unwrap();
		assert_eq!(info.scheme, "https");
		assert_eq!(info.hostname, "10.0.0.7");
		assert_eq!(info.port, 10255);

		let info = resolver.connection_info("n2").await.unwrap();
		assert_eq!(info.port, 10250);
	}

	#[tokio::test]
	async fn transport_inherits_cluster_credentials() {
		let client = MockK8sClient::new();
		client.add_node(node_with("n1", &[("InternalIP", "10.0.0.7")], None));
		let settings = NodeAgentSettings {
			timeout: Duration::from_secs(5),
			..Default::default()
		};

		let resolver = KubeletConnectionResolver::new(Arc::new(client), settings, &cluster());
		let info = resolver.connection_info("n1").await.unwrap();
		assert_eq!(
			info.transport.bearer_token.unwrap().expose_secret(),
			"cluster-token"
		);
		assert!(!info.transport.tls.skips_verification());
		assert_eq!(info.transport.timeout, Duration::from_secs(5));
	}

	#[tokio::test]
	async fn insecure_setting_skips_verification() {
		let client = MockK8sClient::new();
		client.add_node(node_with("n1", &[("InternalIP", "10.0.0.7")], None));
		let settings = NodeAgentSettings {
			insecure_skip_verify: true,
			enable_https: false,
			..Default::default()
		};

		let resolver = KubeletConnectionResolver::new(Arc::new(client), settings, &cluster());
		let info = resolver.connection_info("n1").await.unwrap();
		assert_eq!(info.scheme, "http");
		assert!(info.transport.tls.skips_verification());
	}

	#[tokio::test]
	async fn missing_node_is_not_found() {
		let resolver = KubeletConnectionResolver::new(
			Arc::new(MockK8sClient::new()),
			NodeAgentSettings::default(),
			&cluster(),
		);
		let err = resolver.connection_info("ghost").await.unwrap_err();
		assert!(matches!(err, ConnectError::NotFound(_)));
	}
}
