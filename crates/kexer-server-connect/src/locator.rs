// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Turning a proxied pod path into a concrete node agent exec URL.

use kexer_server_k8s::{K8sClient, Pod};
use tracing::{debug, instrument};
use url::form_urlencoded;

use crate::cluster::ClusterConfig;
use crate::error::{ConnectError, ConnectResult};
use crate::node::{NodeConnectionResolver, NodeTransport};
use crate::options::{ConnectOptions, ExecOptions};

/// A fully resolved proxy destination.
#[derive(Debug, Clone)]
pub struct ResolvedTarget {
	pub scheme: String,
	/// `host[:port]`, with IPv6 literals bracketed.
	pub authority: String,
	pub path: String,
	/// Encoded query string, without the leading `?`.
	pub query: String,
	/// Node agent transport; `None` means use the control plane transport.
	pub transport: Option<NodeTransport>,
}

impl ResolvedTarget {
	/// Target for the local proxy flow: the request's path on the cluster's
	/// control plane, with every received parameter forwarded.
	pub fn control_plane(cluster: &ClusterConfig, options: &ExecOptions) -> ConnectResult<Self> {
		let (scheme, authority) = cluster.scheme_and_authority()?;
		Ok(Self {
			scheme,
			authority,
			path: options.path.clone(),
			query: options.encode_params(),
			transport: None,
		})
	}

	pub fn url(&self) -> ConnectResult<reqwest::Url> {
		let mut url = reqwest::Url::parse(&format!("{}://{}", self.scheme, self.authority))
			.map_err(|e| ConnectError::internal("invalid location", e))?;
		url.set_path(&self.path);
		url.set_query((!self.query.is_empty()).then_some(self.query.as_str()));
		Ok(url)
	}
}

/// Join a host and port the way URLs expect.
pub fn join_host_port(host: &str, port: u16) -> String {
	if host.contains(':') && !host.starts_with('[') {
		format!("[{host}]:{port}")
	} else {
		format!("{host}:{port}")
	}
}

/// Finds the node agent endpoint for an exec request.
pub struct TargetLocator<'a> {
	pods: &'a dyn K8sClient,
	nodes: &'a dyn NodeConnectionResolver,
}

impl<'a> TargetLocator<'a> {
	pub fn new(pods: &'a dyn K8sClient, nodes: &'a dyn NodeConnectionResolver) -> Self {
		Self { pods, nodes }
	}

	/// Resolve the exec location for the pod named in the options' path.
	///
	/// `cluster_name` only appears in error messages.
	#[instrument(skip(self, options), fields(path = %options.path().as_str()))]
	pub async fn exec_location(
		&self,
		cluster_name: &str,
		options: &ConnectOptions,
	) -> ConnectResult<ResolvedTarget> {
		let pod_ref = options.path().pod_ref()?;
		let pod = self.pods.get_pod(&pod_ref.name, &pod_ref.namespace).await?;

		let requested = match options {
			ConnectOptions::Exec(exec) => exec.container.as_str(),
		};
		let container = select_container(&pod, requested, cluster_name)?;

		let node_name = pod
			.spec
			.as_ref()
			.and_then(|s| s.node_name.as_deref())
			.filter(|n| !n.is_empty())
			.ok_or_else(|| {
				ConnectError::BadRequest(format!(
					"pod {cluster_name} does not have a host assigned"
				))
			})?;

		let node = self.nodes.connection_info(node_name).await?;
		debug!(
			node = %node_name,
			container = %container,
			host = %node.hostname,
			port = node.port,
			"resolved exec target"
		);

		Ok(ResolvedTarget {
			scheme: node.scheme,
			authority: join_host_port(&node.hostname, node.port),
			path: format!(
				"/exec/{}/{}/{}",
				pod_ref.namespace, pod_ref.name, container
			),
			query: stream_params(options),
			transport: Some(node.transport),
		})
	}
}

/// Pick the container to exec into.
///
/// With no container requested, a pod with exactly one container uses it;
/// otherwise the caller must choose. A requested name must match a regular
/// or init container.
pub fn select_container(pod: &Pod, requested: &str, cluster_name: &str) -> ConnectResult<String> {
	let containers = pod
		.spec
		.as_ref()
		.map(|s| s.containers.as_slice())
		.unwrap_or_default();
	let init_containers = pod
		.spec
		.as_ref()
		.and_then(|s| s.init_containers.as_deref())
		.unwrap_or_default();

	if requested.is_empty() {
		return match containers {
			[only] => Ok(only.name.clone()),
			[] => Err(ConnectError::BadRequest(format!(
				"a container name must be specified for pod {cluster_name}"
			))),
			many => {
				let names = many
					.iter()
					.map(|c| c.name.as_str())
					.collect::<Vec<_>>()
					.join(" ");
				let mut message = format!(
					"a container name must be specified for pod {cluster_name}, choose one of: [{names}]"
				);
				if !init_containers.is_empty() {
					let init_names = init_containers
						.iter()
						.map(|c| c.name.as_str())
						.collect::<Vec<_>>()
						.join(" ");
					message.push_str(&format!(" or one of the init containers: [{init_names}]"));
				}
				Err(ConnectError::BadRequest(message))
			}
		};
	}

	// Init containers are listed as hints but are never exec targets.
	if !containers.iter().any(|c| c.name == requested) {
		return Err(ConnectError::BadRequest(format!(
			"container {requested} is not valid for pod {cluster_name}"
		)));
	}

	Ok(requested.to_string())
}

/// Query string for the node agent exec call: every `command` value in
/// order, then `stderr`, `stdin`, `stdout` and `tty` set to `1` for each
/// flag that is on. Keys come out sorted.
pub fn stream_params(options: &ConnectOptions) -> String {
	match options {
		ConnectOptions::Exec(exec) => {
			let mut serializer = form_urlencoded::Serializer::new(String::new());
			for command in &exec.command {
				serializer.append_pair("command", command);
			}
			let flags = [
				("stderr", exec.stderr),
				("stdin", exec.stdin),
				("stdout", exec.stdout),
				("tty", exec.tty),
			];
			for (key, _) in flags.iter().filter(|(_, on)| *on) {
				serializer.append_pair(key, "1");
			}
			serializer.finish()
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::node::{NodeConnectionInfo, NodeTransport};
	use crate::testing::{pod_with, MockK8sClient};
	use crate::TlsPolicy;
	use async_trait::async_trait;
	use std::sync::Mutex;
	use std::time::Duration;

	struct FixedNodes {
		requested: Mutex<Vec<String>>,
	}

	impl FixedNodes {
		fn new() -> Self {
			Self {
				requested: Mutex::new(Vec::new()),
			}
		}
	}

	#[async_trait]
	impl NodeConnectionResolver for FixedNodes {
		async fn connection_info(&self, node_name: &str) -> ConnectResult<NodeConnectionInfo> {
			self.requested.lock().unwrap().push(node_name.to_string());
			Ok(NodeConnectionInfo {
				scheme: "https".to_string(),
				hostname: "10.0.0.7".to_string(),
				port: 10250,
				transport: NodeTransport {
					bearer_token: None,
					tls: TlsPolicy::SkipVerification,
					client_identity: None,
					timeout: Duration::from_secs(5),
				},
			})
		}
	}

	fn options(query: &str) -> ConnectOptions {
		ConnectOptions::from_query(Some(query)).unwrap()
	}

	#[tokio::test]
	async fn resolves_single_container_pod() {
		let pods = MockK8sClient::new();
		pods.add_pod(pod_with("web", "ns", &["app"], &[], Some("node-1")));
		let nodes = FixedNodes::new();
		let locator = TargetLocator::new(&pods, &nodes);

		let target = locator
			.exec_location(
				"prod",
				&options("path=/api/v1/namespaces/ns/pods/web/exec&command=ls&command=-la&stdout=true"),
			)
			.await
			.unwrap();

		assert_eq!(target.scheme, "https");
		assert_eq!(target.authority, "10.0.0.7:10250");
		assert_eq!(target.path, "/exec/ns/web/app");
		assert_eq!(target.query, "command=ls&command=-la&stdout=1");
		assert!(target.transport.is_some());
		assert_eq!(*nodes.requested.lock().unwrap(), vec!["node-1".to_string()]);
		assert_eq!(
			target.url().unwrap().as_str(),
			"https://10.0.0.7:10250/exec/ns/web/app?command=ls&command=-la&stdout=1"
		);
	}

	#[tokio::test]
	async fn unscheduled_pod_is_bad_request() {
		let pods = MockK8sClient::new();
		pods.add_pod(pod_with("web", "ns", &["app"], &[], None));
		let nodes = FixedNodes::new();
		let locator = TargetLocator::new(&pods, &nodes);

		let err = locator
			.exec_location("prod", &options("path=/api/v1/namespaces/ns/pods/web/exec"))
			.await
			.unwrap_err();
		assert!(
			matches!(err, ConnectError::BadRequest(ref m) if m == "pod prod does not have a host assigned")
		);
		assert!(nodes.requested.lock().unwrap().is_empty());
	}

	#[tokio::test]
	async fn missing_pod_propagates_not_found() {
		let pods = MockK8sClient::new();
		let nodes = FixedNodes::new();
		let locator = TargetLocator::new(&pods, &nodes);

		let err = locator
			.exec_location("prod", &options("path=/api/v1/namespaces/ns/pods/web/exec"))
			.await
			.unwrap_err();
		assert!(matches!(err, ConnectError::NotFound(_)));
	}

	#[tokio::test]
	async fn short_path_fails_before_any_lookup() {
		let pods = MockK8sClient::new();
		let nodes = FixedNodes::new();
		let locator = TargetLocator::new(&pods, &nodes);

		let err = locator
			.exec_location("prod", &options("path=/api/exec"))
			.await
			.unwrap_err();
		assert!(matches!(err, ConnectError::BadRequest(_)));
		assert_eq!(pods.pod_lookups(), 0);
	}

	#[test]
	fn multi_container_pod_requires_choice() {
		let pod = pod_with("web", "ns", &["app", "sidecar"], &["init"], Some("n"));
		let err = select_container(&pod, "", "prod").unwrap_err();
		assert_eq!(
			err.to_string(),
			"a container name must be specified for pod prod, choose one of: [app sidecar] or one of the init containers: [init]"
		);

		let pod = pod_with("web", "ns", &["app", "sidecar"], &[], Some("n"));
		let err = select_container(&pod, "", "prod").unwrap_err();
		assert_eq!(
			err.to_string(),
			"a container name must be specified for pod prod, choose one of: [app sidecar]"
		);
	}

	#[test]
	fn pod_without_containers_requires_choice() {
		let pod = pod_with("web", "ns", &[], &[], Some("n"));
		let err = select_container(&pod, "", "prod").unwrap_err();
		assert_eq!(
			err.to_string(),
			"a container name must be specified for pod prod"
		);
	}

	#[test]
	fn requested_container_must_exist() {
		let pod = pod_with("web", "ns", &["app"], &["init"], Some("n"));
		assert_eq!(select_container(&pod, "app", "prod").unwrap(), "app");
		let err = select_container(&pod, "init", "prod").unwrap_err();
		assert_eq!(err.to_string(), "container init is not valid for pod prod");
		let err = select_container(&pod, "nope", "prod").unwrap_err();
		assert_eq!(err.to_string(), "container nope is not valid for pod prod");
	}

	#[test]
	fn stream_params_emit_only_enabled_flags() {
		assert_eq!(
			stream_params(&options("path=/x&stdin=true&tty=true&stdout=false")),
			"stdin=1&tty=1"
		);
		assert_eq!(
			stream_params(&options(
				"path=/x&stdin=true&stderr=true&command=sh&command=-c&command=echo+hi"
			)),
			"command=sh&command=-c&command=echo+hi&stderr=1&stdin=1"
		);
		assert_eq!(stream_params(&options("path=/x")), "");
	}

	#[test]
	fn control_plane_target_forwards_params() {
		let cluster = ClusterConfig {
			host: "https://10.0.0.1:6443".to_string(),
			bearer_token: None,
			tls: TlsPolicy::system_roots(),
			client_identity: None,
			timeout: None,
		};
		let exec = ExecOptions::from_query("path=%2Fapi%2Fv1%2Fpods&watch=1");
		let target = ResolvedTarget::control_plane(&cluster, &exec).unwrap();
		assert!(target.transport.is_none());
		assert_eq!(
			target.url().unwrap().as_str(),
			"https://10.0.0.1:6443/api/v1/pods?path=%2Fapi%2Fv1%2Fpods&watch=1"
		);
	}

	#[test]
	fn ipv6_hosts_are_bracketed() {
		assert_eq!(join_host_port("fd00::1", 10250), "[fd00::1]:10250");
		assert_eq!(join_host_port("node-1", 10250), "node-1:10250");
	}
}
