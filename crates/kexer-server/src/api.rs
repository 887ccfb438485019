// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Application state and router.

use std::sync::Arc;

use axum::{
	routing::{get, on, MethodFilter},
	Router,
};
use kexer_server_config::ServerConfig;
use kexer_server_connect::{
	ClusterClientFactory, ClusterConfigResolver, ClusterConnector, ClusterGetter, ConnectorSettings,
	ErrorResponder, LoopbackHandle,
};

use crate::{error::StatusResponder, routes};

/// Path of the cluster exec connect subresource.
pub const EXEC_ROUTE: &str = "/apis/backup.cv.io/v1/namespaces/{namespace}/clusters/{name}/exec";

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
	pub connector: ClusterConnector,
	pub loopback: Arc<LoopbackHandle>,
	pub responder: Arc<dyn ErrorResponder>,
}

/// Wire the connector from configuration and its collaborators.
pub fn create_app_state(
	config: &ServerConfig,
	loopback: Arc<LoopbackHandle>,
	clusters: Arc<dyn ClusterGetter>,
	factory: Arc<dyn ClusterClientFactory>,
) -> AppState {
	let resolver = ClusterConfigResolver::new(
		Arc::clone(&loopback),
		factory,
		config.connect.remote_timeout,
	);
	let settings = ConnectorSettings::from_config(&config.connect, &config.node_agent);

	AppState {
		connector: ClusterConnector::new(clusters, resolver, settings),
		loopback,
		responder: Arc::new(StatusResponder),
	}
}

pub fn create_router(state: AppState) -> Router {
	let connect_methods = MethodFilter::GET
		.or(MethodFilter::POST)
		.or(MethodFilter::PUT)
		.or(MethodFilter::PATCH)
		.or(MethodFilter::DELETE);

	Router::new()
		.route("/healthz", get(routes::health::healthz))
		.route("/readyz", get(routes::health::readyz))
		.route(
			EXEC_ROUTE,
			on(connect_methods, routes::exec::connect).head(routes::exec::method_not_allowed),
		)
		.with_state(state)
}
