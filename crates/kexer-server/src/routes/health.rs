// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Liveness and readiness handlers.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use kexer_server_connect::LoopbackState;

use crate::{api::AppState, error::ServerError};

/// GET /healthz - the process is serving requests.
pub async fn healthz() -> impl IntoResponse {
	(StatusCode::OK, "ok")
}

/// GET /readyz - ready once the loopback client is installed.
pub async fn readyz(State(state): State<AppState>) -> Result<impl IntoResponse, ServerError> {
	match state.loopback.state() {
		LoopbackState::Ready => Ok((StatusCode::OK, Json(serde_json::json!({ "status": "ready" })))),
		LoopbackState::NotReady => Err(ServerError::ServiceUnavailable(
			"loopback client is not configured".to_string(),
		)),
	}
}
