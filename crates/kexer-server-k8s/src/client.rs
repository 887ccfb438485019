// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use async_trait::async_trait;

use crate::error::K8sError;
use crate::types::{Node, Pod, Secret};

/// Trait for the K8s lookups the exec connector needs.
///
/// This abstraction allows for easy mocking in tests while providing
/// a clean interface over the control plane the connector talks to.
#[async_trait]
pub trait K8sClient: Send + Sync {
	/// Get a specific pod by name from the specified namespace.
	async fn get_pod(&self, name: &str, namespace: &str) -> Result<Pod, K8sError>;

	/// Get a node by name.
	async fn get_node(&self, name: &str) -> Result<Node, K8sError>;

	/// Get a secret by name from the specified namespace.
	async fn get_secret(&self, name: &str, namespace: &str) -> Result<Secret, K8sError>;
}
