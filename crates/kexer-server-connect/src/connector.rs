// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Entry point for cluster exec connect requests.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::response::Response;
use http::{Method, Request};
use kexer_server_config::{ConnectConfig, NodeAgentConfig};
use tracing::{debug, error, info, instrument, Span};

use crate::cluster::{ClusterConfigResolver, ClusterDescriptor, ClusterGetter};
use crate::error::{ConnectError, ConnectResult};
use crate::locator::{ResolvedTarget, TargetLocator};
use crate::node::{KubeletConnectionResolver, NodeAgentSettings};
use crate::options::{ConnectMode, ConnectOptions};
use crate::proxy::{ErrorResponder, UpgradeAwareProxy};
use crate::transport::{control_plane_transport, UpgradeTransportBuilder};

/// HTTP methods the connect route accepts.
pub const CONNECT_METHODS: [Method; 5] = [
	Method::GET,
	Method::POST,
	Method::PUT,
	Method::PATCH,
	Method::DELETE,
];

/// Per-process connector settings.
#[derive(Debug, Clone)]
pub struct ConnectorSettings {
	pub flush_interval: Duration,
	pub node_agent: NodeAgentSettings,
}

impl ConnectorSettings {
	pub fn from_config(connect: &ConnectConfig, node_agent: &NodeAgentConfig) -> Self {
		Self {
			flush_interval: connect.flush_interval,
			node_agent: NodeAgentSettings::from(node_agent),
		}
	}
}

impl Default for ConnectorSettings {
	fn default() -> Self {
		Self::from_config(&ConnectConfig::default(), &NodeAgentConfig::default())
	}
}

/// Validates connect requests and produces a handler that proxies them.
#[derive(Clone)]
pub struct ClusterConnector {
	clusters: Arc<dyn ClusterGetter>,
	resolver: ClusterConfigResolver,
	settings: ConnectorSettings,
}

impl ClusterConnector {
	pub fn new(
		clusters: Arc<dyn ClusterGetter>,
		resolver: ClusterConfigResolver,
		settings: ConnectorSettings,
	) -> Self {
		Self {
			clusters,
			resolver,
			settings,
		}
	}

	/// Look up the cluster object and return a handler bound to it.
	#[instrument(skip(self, options, responder), fields(mode = options.mode().as_str()))]
	pub async fn connect(
		&self,
		namespace: &str,
		name: &str,
		options: ConnectOptions,
		responder: Arc<dyn ErrorResponder>,
	) -> ConnectResult<ExecHandler> {
		let cluster = self.clusters.get(namespace, name).await.map_err(|e| {
			debug!(error = %e, "cluster lookup failed");
			ConnectError::NotFound(format!("no such cluster {name}"))
		})?;

		Ok(ExecHandler {
			connector: self.clone(),
			name: name.to_string(),
			cluster,
			mode: options.mode(),
			options,
			responder,
		})
	}
}

/// A validated connect request, ready to proxy one inbound request.
pub struct ExecHandler {
	connector: ClusterConnector,
	name: String,
	cluster: ClusterDescriptor,
	mode: ConnectMode,
	options: ConnectOptions,
	responder: Arc<dyn ErrorResponder>,
}

impl ExecHandler {
	pub fn mode(&self) -> ConnectMode {
		self.mode
	}

	/// Resolve the target and proxy `request` to it.
	///
	/// Errors returned here happen before anything is written to the client;
	/// failures during the exchange go through the responder instead.
	#[instrument(skip_all, fields(cluster = %self.name, mode = self.mode.as_str(), state = tracing::field::Empty))]
	pub async fn serve(self, request: Request<Body>) -> ConnectResult<Response> {
		let span = Span::current();
		span.record("state", "resolving");

		let result = self.resolve_proxy(&span).await;
		let proxy = match result {
			Ok(proxy) => proxy,
			Err(e) => {
				span.record("state", "failed");
				match e.cause() {
					Some(cause) => error!(error = %e, cause, "connect failed"),
					None => debug!(error = %e, "connect rejected"),
				}
				return Err(e);
			}
		};

		info!(location = %proxy.location(), "proxying");
		let response = proxy.serve(request).await;
		span.record("state", "done");
		debug!(status = response.status().as_u16(), "proxy exchange finished");
		Ok(response)
	}

	async fn resolve_proxy(&self, span: &Span) -> ConnectResult<UpgradeAwareProxy> {
		let resolved = self.connector.resolver.resolve(&self.cluster)?;
		let transport = control_plane_transport(&resolved.config)
			.map_err(|e| ConnectError::internal("invalid transport", e.cause().unwrap_or_default()))?;

		let (target, upgrade_transport) = match self.mode {
			ConnectMode::LocalProxy => {
				span.record("state", "local_proxy");
				let target = match &self.options {
					ConnectOptions::Exec(exec) => ResolvedTarget::control_plane(&resolved.config, exec)?,
				};
				(target, None)
			}
			ConnectMode::RemoteExec => {
				span.record("state", "remote_exec_resolving");
				let nodes = KubeletConnectionResolver::new(
					Arc::clone(&resolved.client),
					self.connector.settings.node_agent.clone(),
					&resolved.config,
				);
				let locator = TargetLocator::new(resolved.client.as_ref(), &nodes);
				let target = locator.exec_location(&self.name, &self.options).await?;
				let upgrade_transport = target
					.transport
					.as_ref()
					.map(|t| UpgradeTransportBuilder::new(t).build())
					.transpose()?;
				span.record("state", "remote_exec_proxying");
				(target, upgrade_transport)
			}
		};

		let mut proxy = UpgradeAwareProxy::new(target.url()?, transport, Arc::clone(&self.responder))
			.with_flush_interval(self.connector.settings.flush_interval);
		if let Some(upgrade_transport) = upgrade_transport {
			proxy = proxy.with_upgrade_transport(upgrade_transport);
		}
		Ok(proxy)
	}
}
