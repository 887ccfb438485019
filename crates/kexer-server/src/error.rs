// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Server error types, rendered as Kubernetes `Status` objects.

use axum::{
	http::{request::Parts, StatusCode},
	response::{IntoResponse, Response},
	Json,
};
use kexer_server_connect::{ConnectError, ErrorResponder, ProxyError};
use serde::Serialize;

/// Errors returned by the HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
	/// Malformed request, ambiguous container, unscheduled pod.
	#[error("Bad request: {0}")]
	BadRequest(String),

	/// Unknown cluster or pod.
	#[error("Not found: {0}")]
	NotFound(String),

	/// Internal failure. Only `message` reaches the client.
	#[error("Internal error: {message}")]
	Internal { message: String, cause: String },

	/// The backend could not be reached or the exchange failed.
	#[error("Service unavailable: {0}")]
	ServiceUnavailable(String),
}

impl From<ConnectError> for ServerError {
	fn from(err: ConnectError) -> Self {
		match err {
			ConnectError::InvalidOptions(_) => ServerError::BadRequest(err.to_string()),
			ConnectError::BadRequest(msg) => ServerError::BadRequest(msg),
			ConnectError::NotFound(msg) => ServerError::NotFound(msg),
			ConnectError::ConfigUnavailable => ServerError::Internal {
				message: "client configuration is not available".to_string(),
				cause: err.to_string(),
			},
			ConnectError::Internal { message, cause } | ConnectError::Transport { message, cause } => {
				ServerError::Internal { message, cause }
			}
			ConnectError::Kubernetes(e) => ServerError::Internal {
				message: "error talking to the cluster".to_string(),
				cause: e.to_string(),
			},
		}
	}
}

#[derive(Debug, Default, Serialize)]
pub struct StatusMetadata {}

/// Kubernetes `Status` failure body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
	pub kind: &'static str,
	pub api_version: &'static str,
	pub metadata: StatusMetadata,
	pub status: &'static str,
	pub message: String,
	pub reason: &'static str,
	pub code: u16,
}

impl Status {
	pub fn failure(code: StatusCode, reason: &'static str, message: String) -> Self {
		Self {
			kind: "Status",
			api_version: "v1",
			metadata: StatusMetadata::default(),
			status: "Failure",
			message,
			reason,
			code: code.as_u16(),
		}
	}
}

impl IntoResponse for ServerError {
	fn into_response(self) -> Response {
		let (status, reason, message) = match self {
			ServerError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BadRequest", msg),
			ServerError::NotFound(msg) => (StatusCode::NOT_FOUND, "NotFound", msg),
			ServerError::Internal { message, cause } => {
				tracing::error!(error = %message, cause = %cause, "internal error");
				(
					StatusCode::INTERNAL_SERVER_ERROR,
					"InternalError",
					format!("Internal error occurred: {message}"),
				)
			}
			ServerError::ServiceUnavailable(msg) => {
				tracing::warn!(error = %msg, "service unavailable");
				(StatusCode::SERVICE_UNAVAILABLE, "ServiceUnavailable", msg)
			}
		};

		(status, Json(Status::failure(status, reason, message))).into_response()
	}
}

/// Renders proxy failures as `ServiceUnavailable` statuses.
#[derive(Debug, Default, Clone, Copy)]
pub struct StatusResponder;

impl ErrorResponder for StatusResponder {
	fn error(&self, request: &Parts, err: ProxyError) -> Response {
		tracing::warn!(method = %request.method, uri = %request.uri, error = %err, "proxy error");
		ServerError::ServiceUnavailable(err.to_string()).into_response()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::body::{to_bytes, Body};
	use axum::http::Request;

	async fn body_json(response: Response) -> serde_json::Value {
		let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
		serde_json::from_slice(&bytes).unwrap()
	}

	#[tokio::test]
	async fn renders_kubernetes_status() {
		let response = ServerError::NotFound("no such cluster prod".to_string()).into_response();
		assert_eq!(response.status(), StatusCode::NOT_FOUND);

		let body = body_json(response).await;
		assert_eq!(body["kind"], "Status");
		assert_eq!(body["apiVersion"], "v1");
		assert_eq!(body["status"], "Failure");
		assert_eq!(body["reason"], "NotFound");
		assert_eq!(body["code"], 404);
		assert_eq!(body["message"], "no such cluster prod");
	}

	#[tokio::test]
	async fn internal_errors_hide_cause() {
		let err: ServerError = ConnectError::internal("invalid transport", "bad PEM").into();
		let response = err.into_response();
		assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

		let body = body_json(response).await;
		assert_eq!(body["reason"], "InternalError");
		assert_eq!(body["message"], "Internal error occurred: invalid transport");
		assert!(!body.to_string().contains("bad PEM"));
	}

	#[test]
	fn maps_connect_errors() {
		assert!(matches!(
			ServerError::from(ConnectError::InvalidOptions("x".into())),
			ServerError::BadRequest(_)
		));
		assert!(matches!(
			ServerError::from(ConnectError::BadRequest("x".into())),
			ServerError::BadRequest(_)
		));
		assert!(matches!(
			ServerError::from(ConnectError::ConfigUnavailable),
			ServerError::Internal { .. }
		));
		assert!(matches!(
			ServerError::from(ConnectError::transport("invalid transport", "x")),
			ServerError::Internal { .. }
		));
	}

	#[tokio::test]
	async fn responder_reports_service_unavailable() {
		let (parts, _) = Request::new(Body::empty()).into_parts();
		let response = StatusResponder.error(&parts, ProxyError::Upgrade("closed".into()));
		assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
		let body = body_json(response).await;
		assert_eq!(body["reason"], "ServiceUnavailable");
	}
}
