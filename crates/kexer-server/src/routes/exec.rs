// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! The cluster `exec` connect subresource.

use std::sync::Arc;

use axum::{
	extract::{Path, Request, State},
	http::{header, StatusCode},
	response::{IntoResponse, Response},
};
use kexer_server_connect::ConnectOptions;

use crate::{api::AppState, error::ServerError};

/// `{GET,POST,PUT,PATCH,DELETE} /apis/backup.cv.io/v1/namespaces/{namespace}/clusters/{name}/exec`
///
/// Proxies the request to the cluster's control plane, or to the node agent
/// hosting the target pod when the requested path ends in `exec`.
#[tracing::instrument(skip_all, fields(namespace = %namespace, cluster = %name))]
pub async fn connect(
	State(state): State<AppState>,
	Path((namespace, name)): Path<(String, String)>,
	request: Request,
) -> Result<Response, ServerError> {
	let options = ConnectOptions::from_query(request.uri().query())?;
	let handler = state
		.connector
		.connect(&namespace, &name, options, Arc::clone(&state.responder))
		.await?;
	Ok(handler.serve(request).await?)
}

/// HEAD is not a connect method; without this axum would answer it with the
/// GET handler.
pub async fn method_not_allowed() -> impl IntoResponse {
	(
		StatusCode::METHOD_NOT_ALLOWED,
		[(header::ALLOW, "GET,POST,PUT,PATCH,DELETE")],
	)
}
