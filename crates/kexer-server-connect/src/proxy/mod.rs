// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Upgrade-aware reverse proxy.
//!
//! Forwards one inbound request to a fixed location. Ordinary responses are
//! streamed back through a [`FlushIntervalStream`]; a `101 Switching
//! Protocols` answer to an upgrade request hands both connections to a
//! background task that copies bytes until either side closes.

mod downstream;
mod flush;

pub use downstream::Downstream;
pub use flush::FlushIntervalStream;

use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, HttpBody};
use axum::response::Response;
use http::header::{HeaderName, HeaderValue, AUTHORIZATION, CONNECTION, HOST};
use http::request::Parts;
use http::{HeaderMap, Request, StatusCode};
use hyper_util::rt::TokioIo;
use tracing::{debug, instrument, warn};

use crate::error::ProxyError;

/// Headers that describe a single hop and are never forwarded.
const HOP_BY_HOP_HEADERS: [&str; 9] = [
	"connection",
	"keep-alive",
	"proxy-connection",
	"proxy-authenticate",
	"proxy-authorization",
	"te",
	"trailer",
	"transfer-encoding",
	"upgrade",
];

/// Formats proxy-level failures for the caller.
pub trait ErrorResponder: Send + Sync {
	fn error(&self, request: &Parts, err: ProxyError) -> Response;
}

impl<F> ErrorResponder for F
where
	F: Fn(&Parts, ProxyError) -> Response + Send + Sync,
{
	fn error(&self, request: &Parts, err: ProxyError) -> Response {
		self(request, err)
	}
}

/// True when the request asks to switch protocols.
pub fn is_upgrade_request(headers: &HeaderMap) -> bool {
	connection_tokens(headers).any(|token| token.eq_ignore_ascii_case("upgrade"))
}

fn connection_tokens(headers: &HeaderMap) -> impl Iterator<Item = &str> {
	headers
		.get_all(CONNECTION)
		.iter()
		.filter_map(|v| v.to_str().ok())
		.flat_map(|v| v.split(','))
		.map(str::trim)
		.filter(|t| !t.is_empty())
}

/// Remove hop-by-hop headers, including any named by `Connection`. On
/// upgrades `Connection: Upgrade` and `Upgrade` survive.
pub fn strip_hop_by_hop(headers: &mut HeaderMap, upgrade: bool) {
	let named: Vec<HeaderName> = connection_tokens(headers)
		.filter(|t| !(upgrade && t.eq_ignore_ascii_case("upgrade")))
		.filter_map(|t| HeaderName::from_bytes(t.as_bytes()).ok())
		.collect();
	for name in named {
		headers.remove(name);
	}

	for name in HOP_BY_HOP_HEADERS {
		if upgrade && (name == "connection" || name == "upgrade") {
			continue;
		}
		headers.remove(name);
	}

	if upgrade {
		headers.insert(CONNECTION, HeaderValue::from_static("Upgrade"));
	}
}

/// Forwards requests to one backend location.
#[derive(Clone)]
pub struct UpgradeAwareProxy {
	location: reqwest::Url,
	transport: reqwest::Client,
	upgrade_transport: Option<reqwest::Client>,
	flush_interval: Option<Duration>,
	responder: Arc<dyn ErrorResponder>,
}

impl UpgradeAwareProxy {
	pub fn new(
		location: reqwest::Url,
		transport: reqwest::Client,
		responder: Arc<dyn ErrorResponder>,
	) -> Self {
		Self {
			location,
			transport,
			upgrade_transport: None,
			flush_interval: None,
			responder,
		}
	}

	/// Transport used for upgrade requests instead of the base one.
	pub fn with_upgrade_transport(mut self, transport: reqwest::Client) -> Self {
		self.upgrade_transport = Some(transport);
		self
	}

	pub fn with_flush_interval(mut self, interval: Duration) -> Self {
		self.flush_interval = Some(interval);
		self
	}

	pub fn location(&self) -> &reqwest::Url {
		&self.location
	}

	/// Perform exactly one backend exchange for `request`.
	#[instrument(skip(self, request), fields(location = %self.location, method = %request.method()))]
	pub async fn serve(&self, request: Request<Body>) -> Response {
		let (mut parts, body) = request.into_parts();
		let mut downstream = Downstream::from_parts(&mut parts);
		let response = self.forward(&parts, body, &mut downstream).await;
		debug!(status = downstream.status().as_u16(), "proxy exchange finished");
		response
	}

	async fn forward(&self, parts: &Parts, body: Body, downstream: &mut Downstream) -> Response {
		let upgrade = is_upgrade_request(&parts.headers);

		let mut headers = parts.headers.clone();
		strip_hop_by_hop(&mut headers, upgrade);
		headers.remove(AUTHORIZATION);
		headers.remove(HOST);
		if let Some(authority) = host_header(&self.location) {
			headers.insert(HOST, authority);
		}

		let client = match (&self.upgrade_transport, upgrade) {
			(Some(upgrade_transport), true) => upgrade_transport,
			_ => &self.transport,
		};
		let mut outbound = client
			.request(parts.method.clone(), self.location.clone())
			.headers(headers);
		if !upgrade && body.size_hint().exact() != Some(0) {
			outbound = outbound.body(reqwest::Body::wrap_stream(body.into_data_stream()));
		}

		debug!(upgrade, "forwarding request");
		let response = match outbound.send().await {
			Ok(response) => response,
			Err(e) => {
				warn!(error = %e, "backend request failed");
				let response = self.responder.error(parts, ProxyError::Backend(e));
				return downstream.respond(response);
			}
		};

		let status = response.status();
		if upgrade && status == StatusCode::SWITCHING_PROTOCOLS {
			return self.finish_upgrade(parts, downstream, response).await;
		}
		if upgrade {
			debug!(status = status.as_u16(), "backend declined upgrade");
		}

		let response = self.stream_response(response);
		downstream.respond(response)
	}

	fn stream_response(&self, response: reqwest::Response) -> Response {
		let status = response.status();
		let mut headers = response.headers().clone();
		strip_hop_by_hop(&mut headers, false);

		let body = FlushIntervalStream::new(response.bytes_stream(), self.flush_interval);
		let mut out = Response::new(Body::from_stream(body));
		*out.status_mut() = status;
		*out.headers_mut() = headers;
		out
	}

	async fn finish_upgrade(
		&self,
		parts: &Parts,
		downstream: &mut Downstream,
		response: reqwest::Response,
	) -> Response {
		let Some(client_upgrade) = downstream.hijack() else {
			let err = ProxyError::Upgrade("client connection cannot be upgraded".to_string());
			let response = self.responder.error(parts, err);
			return downstream.respond(response);
		};

		let status = response.status();
		let headers = response.headers().clone();
		let backend = match response.upgrade().await {
			Ok(upgraded) => upgraded,
			Err(e) => {
				warn!(error = %e, "backend upgrade failed");
				let response = self.responder.error(parts, ProxyError::Upgrade(e.to_string()));
				return downstream.respond(response);
			}
		};

		tokio::spawn(async move {
			let client = match client_upgrade.await {
				Ok(upgraded) => upgraded,
				Err(e) => {
					warn!(error = %e, "client upgrade failed");
					return;
				}
			};

			let mut client = TokioIo::new(client);
			let mut backend = backend;
			match tokio::io::copy_bidirectional(&mut client, &mut backend).await {
				Ok((to_backend, to_client)) => {
					debug!(to_backend, to_client, "upgraded stream closed");
				}
				Err(e) => debug!(error = %e, "upgraded stream ended"),
			}
		});

		let mut out = Response::new(Body::empty());
		*out.status_mut() = status;
		*out.headers_mut() = headers;
		downstream.respond(out)
	}
}

/// `Host` value for a location: its authority, port included when explicit.
fn host_header(location: &reqwest::Url) -> Option<HeaderValue> {
	let host = location.host_str()?;
	let value = match location.port() {
		Some(port) => crate::locator::join_host_port(host, port),
		None => host.to_string(),
	};
	HeaderValue::from_str(&value).ok()
}
