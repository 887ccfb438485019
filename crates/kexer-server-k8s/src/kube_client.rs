// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, Pod, Secret};
use kube::{api::Api, Client, Config};
use tracing::{debug, instrument};

use crate::client::K8sClient;
use crate::error::K8sError;

/// Production K8s client implementation using the kube crate.
#[derive(Clone)]
pub struct KubeClient {
	client: Client,
}

impl KubeClient {
	/// Create a client bound to an explicit configuration.
	pub fn from_config(config: Config) -> Result<Self, K8sError> {
		let cluster_url = config.cluster_url.to_string();
		let client = Client::try_from(config).map_err(|e| K8sError::ClientConfig {
			message: e.to_string(),
		})?;
		debug!(cluster_url = %cluster_url, "K8s client bound to explicit config");
		Ok(Self { client })
	}
}

#[async_trait]
impl K8sClient for KubeClient {
	#[instrument(skip(self))]
	async fn get_pod(&self, name: &str, namespace: &str) -> Result<Pod, K8sError> {
		let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
		match pods.get(name).await {
			Ok(pod) => Ok(pod),
			Err(kube::Error::Api(err)) if err.code == 404 => Err(K8sError::PodNotFound {
				name: name.into(),
				namespace: namespace.into(),
			}),
			Err(e) => Err(e.into()),
		}
	}

	#[instrument(skip(self))]
	async fn get_node(&self, name: &str) -> Result<Node, K8sError> {
		let nodes: Api<Node> = Api::all(self.client.clone());
		match nodes.get(name).await {
			Ok(node) => Ok(node),
			Err(kube::Error::Api(err)) if err.code == 404 => {
				Err(K8sError::NodeNotFound { name: name.into() })
			}
			Err(e) => Err(e.into()),
		}
	}

	#[instrument(skip(self))]
	async fn get_secret(&self, name: &str, namespace: &str) -> Result<Secret, K8sError> {
		let secrets: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
		match secrets.get(name).await {
			Ok(secret) => Ok(secret),
			Err(kube::Error::Api(err)) if err.code == 404 => Err(K8sError::SecretNotFound {
				name: name.into(),
				namespace: namespace.into(),
			}),
			Err(e) => Err(e.into()),
		}
	}
}
