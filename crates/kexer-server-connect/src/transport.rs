// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! HTTP transports for the control plane and for node agents.
//!
//! Both carry the cluster's bearer token as a default `Authorization` header,
//! never follow redirects, and leave request duration unbounded so that
//! long-running streams are not cut off. Only connection setup is timed.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Certificate, Client, ClientBuilder, Identity};
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::cluster::{ClientIdentity, ClusterConfig, TlsPolicy};
use crate::error::{ConnectError, ConnectResult};
use crate::node::NodeTransport;

/// User-Agent sent when the proxied request carries none.
pub fn user_agent() -> String {
	format!("kexer/{}", env!("CARGO_PKG_VERSION"))
}

/// Transport for the cluster's control plane, used by the local proxy flow
/// and as the non-upgrade transport for exec.
pub fn control_plane_transport(config: &ClusterConfig) -> ConnectResult<Client> {
	let mut builder = base_builder(config.bearer_token.as_ref())?;
	builder = apply_tls(builder, &config.tls, config.client_identity.as_ref())?;
	if let Some(timeout) = config.timeout {
		builder = builder.connect_timeout(timeout);
	}
	builder
		.build()
		.map_err(|e| ConnectError::transport("invalid transport", e))
}

/// Builds the HTTP/1.1-only transport used for upgraded exec streams.
///
/// Upgrades only exist in HTTP/1.1, so ALPN must never negotiate h2 here.
#[derive(Debug, Clone)]
pub struct UpgradeTransportBuilder<'a> {
	transport: &'a NodeTransport,
}

impl<'a> UpgradeTransportBuilder<'a> {
	pub fn new(transport: &'a NodeTransport) -> Self {
		Self { transport }
	}

	pub fn build(self) -> ConnectResult<Client> {
		let transport = self.transport;
		debug!(
			skip_verify = transport.tls.skips_verification(),
			client_identity = transport.client_identity.is_some(),
			"building upgrade transport"
		);

		let builder = base_builder(transport.bearer_token.as_ref())?
			.http1_only()
			.connect_timeout(transport.timeout);
		apply_tls(builder, &transport.tls, transport.client_identity.as_ref())?
			.build()
			.map_err(|e| ConnectError::transport("invalid upgrade transport", e))
	}
}

fn base_builder(bearer_token: Option<&SecretString>) -> ConnectResult<ClientBuilder> {
	let mut headers = HeaderMap::new();
	if let Some(token) = bearer_token.filter(|t| !t.expose_secret().is_empty()) {
		let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
			.map_err(|e| ConnectError::transport("invalid bearer token", e))?;
		value.set_sensitive(true);
		headers.insert(AUTHORIZATION, value);
	}

	Ok(Client::builder()
		.user_agent(user_agent())
		.default_headers(headers)
		.redirect(reqwest::redirect::Policy::none())
		.pool_idle_timeout(Duration::from_secs(90)))
}

fn apply_tls(
	mut builder: ClientBuilder,
	tls: &TlsPolicy,
	identity: Option<&ClientIdentity>,
) -> ConnectResult<ClientBuilder> {
	match tls {
		TlsPolicy::SkipVerification => {
			builder = builder.danger_accept_invalid_certs(true);
		}
		TlsPolicy::Verify { root_certs } => {
			for der in root_certs {
				let cert = Certificate::from_der(der)
					.map_err(|e| ConnectError::transport("invalid root certificate", e))?;
				builder = builder.add_root_certificate(cert);
			}
		}
	}

	if let Some(identity) = identity {
		let identity = Identity::from_pem(&identity.to_pem_bundle())
			.map_err(|e| ConnectError::transport("invalid client certificate", e))?;
		builder = builder.identity(identity);
	}

	Ok(builder)
}
