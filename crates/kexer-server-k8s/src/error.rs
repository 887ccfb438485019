// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use thiserror::Error;

/// Errors that can occur during K8s lookups.
#[derive(Error, Debug)]
pub enum K8sError {
	#[error("K8s API error: {message}")]
	ApiError { message: String },

	#[error("pods \"{name}\" not found in namespace \"{namespace}\"")]
	PodNotFound { name: String, namespace: String },

	#[error("nodes \"{name}\" not found")]
	NodeNotFound { name: String },

	#[error("secrets \"{name}\" not found in namespace \"{namespace}\"")]
	SecretNotFound { name: String, namespace: String },

	#[error("K8s client configuration error: {message}")]
	ClientConfig { message: String },
}

impl K8sError {
	/// Whether the error means the looked-up object does not exist.
	pub fn is_not_found(&self) -> bool {
		matches!(
			self,
			K8sError::PodNotFound { .. } | K8sError::NodeNotFound { .. } | K8sError::SecretNotFound { .. }
		)
	}
}

impl From<kube::Error> for K8sError {
	fn from(err: kube::Error) -> Self {
		K8sError::ApiError {
			message: err.to_string(),
		}
	}
}
