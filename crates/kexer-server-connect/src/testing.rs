// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! In-memory Kubernetes client and object builders for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use kexer_server_k8s::{
	Container, DaemonEndpoint, K8sClient, K8sError, Node, NodeAddress, NodeDaemonEndpoints,
	NodeStatus, ObjectMeta, Pod, PodSpec, Secret,
};

#[derive(Default)]
pub struct MockK8sClient {
	pods: Mutex<HashMap<(String, String), Pod>>,
	nodes: Mutex<HashMap<String, Node>>,
	secrets: Mutex<HashMap<(String, String), Secret>>,
	pod_lookups: AtomicUsize,
}

impl MockK8sClient {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add_pod(&self, pod: Pod) {
		let key = (
			pod.metadata.namespace.clone().unwrap_or_default(),
			pod.metadata.name.clone().unwrap_or_default(),
		);
		self.pods.lock().unwrap().insert(key, pod);
	}

	pub fn add_node(&self, node: Node) {
		let name = node.metadata.name.clone().unwrap_or_default();
		self.nodes.lock().unwrap().insert(name, node);
	}

	pub fn pod_lookups(&self) -> usize {
		self.pod_lookups.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl K8sClient for MockK8sClient {
	async fn get_pod(&self, name: &str, namespace: &str) -> Result<Pod, K8sError> {
		self.pod_lookups.fetch_add(1, Ordering::SeqCst);
		self.pods
			.lock()
			.unwrap()
			.get(&(namespace.to_string(), name.to_string()))
			.cloned()
			.ok_or_else(|| K8sError::PodNotFound {
				name: name.to_string(),
				namespace: namespace.to_string(),
			})
	}

	async fn get_node(&self, name: &str) -> Result<Node, K8sError> {
		self.nodes
			.lock()
			.unwrap()
			.get(name)
			.cloned()
			.ok_or_else(|| K8sError::NodeNotFound {
				name: name.to_string(),
			})
	}

	async fn get_secret(&self, name: &str, namespace: &str) -> Result<Secret, K8sError> {
		self.secrets
			.lock()
			.unwrap()
			.get(&(namespace.to_string(), name.to_string()))
			.cloned()
			.ok_or_else(|| K8sError::SecretNotFound {
				name: name.to_string(),
				namespace: namespace.to_string(),
			})
	}
}

fn containers(names: &[&str]) -> Vec<Container> {
	names
		.iter()
		.map(|name| Container {
			name: name.to_string(),
			..Default::default()
		})
		.collect()
}

pub fn pod_with(
	name: &str,
	namespace: &str,
	container_names: &[&str],
	init_container_names: &[&str],
	node_name: Option<&str>,
) -> Pod {
	Pod {
		metadata: ObjectMeta {
			name: Some(name.to_string()),
			namespace: Some(namespace.to_string()),
			..Default::default()
		},
		spec: Some(PodSpec {
			containers: containers(container_names),
			init_containers: (!init_container_names.is_empty())
				.then(|| containers(init_container_names)),
			node_name: node_name.map(str::to_string),
			..Default::default()
		}),
		..Default::default()
	}
}

pub fn node_with(name: &str, addresses: &[(&str, &str)], kubelet_port: Option<i32>) -> Node {
	Node {
		metadata: ObjectMeta {
			name: Some(name.to_string()),
			..Default::default()
		},
		status: Some(NodeStatus {
			addresses: Some(
				addresses
					.iter()
					.map(|(type_, address)| NodeAddress {
						type_: type_.to_string(),
						address: address.to_string(),
					})
					.collect(),
			),
			daemon_endpoints: kubelet_port.map(|port| NodeDaemonEndpoints {
				kubelet_endpoint: Some(DaemonEndpoint { port }),
			}),
			..Default::default()
		}),
		..Default::default()
	}
}
