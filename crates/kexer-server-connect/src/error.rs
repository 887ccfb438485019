// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Connector error types.

use std::fmt::Display;

use kexer_server_k8s::K8sError;
use thiserror::Error;

/// Result type alias for connector operations.
pub type ConnectResult<T> = Result<T, ConnectError>;

/// Errors raised while resolving a connect request, before any bytes are
/// proxied.
///
/// `Internal` and `Transport` carry a `cause` that is meant for logs only; the
/// caller sees `message`.
#[derive(Error, Debug)]
pub enum ConnectError {
	#[error("invalid options object: {0}")]
	InvalidOptions(String),

	#[error("{0}")]
	BadRequest(String),

	#[error("{0}")]
	NotFound(String),

	#[error("loopback client configuration is not ready")]
	ConfigUnavailable,

	#[error("{message}")]
	Internal { message: String, cause: String },

	#[error("{message}")]
	Transport { message: String, cause: String },

	#[error(transparent)]
	Kubernetes(K8sError),
}

impl ConnectError {
	pub fn internal(message: impl Into<String>, cause: impl Display) -> Self {
		ConnectError::Internal {
			message: message.into(),
			cause: cause.to_string(),
		}
	}

	pub fn transport(message: impl Into<String>, cause: impl Display) -> Self {
		ConnectError::Transport {
			message: message.into(),
			cause: cause.to_string(),
		}
	}

	/// The underlying cause, when the public message hides one.
	pub fn cause(&self) -> Option<&str> {
		match self {
			ConnectError::Internal { cause, .. } | ConnectError::Transport { cause, .. } => {
				Some(cause.as_str())
			}
			_ => None,
		}
	}
}

impl From<K8sError> for ConnectError {
	fn from(err: K8sError) -> Self {
		if err.is_not_found() {
			ConnectError::NotFound(err.to_string())
		} else {
			ConnectError::Kubernetes(err)
		}
	}
}

/// Failures during the live proxied exchange. These are handed to the
/// caller's [`ErrorResponder`](crate::ErrorResponder) and never retried.
#[derive(Error, Debug)]
pub enum ProxyError {
	/// Dial failures, TLS failures and malformed backend responses.
	#[error("error trying to reach service: {0}")]
	Backend(#[source] reqwest::Error),

	#[error("error proxying upgraded connection: {0}")]
	Upgrade(String),
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn pod_not_found_becomes_not_found() {
		let err: ConnectError = K8sError::PodNotFound {
			name: "web".into(),
			namespace: "default".into(),
		}
		.into();
		assert!(matches!(err, ConnectError::NotFound(ref msg) if msg.contains("web")));
	}

	#[test]
	fn api_errors_stay_kubernetes_errors() {
		let err: ConnectError = K8sError::ApiError {
			message: "connection refused".into(),
		}
		.into();
		assert!(matches!(err, ConnectError::Kubernetes(_)));
	}

	#[test]
	fn internal_hides_cause_from_display() {
		let err = ConnectError::internal("invalid transport", "bad PEM block");
		assert_eq!(err.to_string(), "invalid transport");
		assert_eq!(err.cause(), Some("bad PEM block"));
	}
}
