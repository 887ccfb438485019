// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! The caller-facing side of a proxied exchange.

use axum::response::Response;
use http::request::Parts;
use http::StatusCode;
use hyper::upgrade::OnUpgrade;

/// What the proxy knows about the client connection.
///
/// Hijacking takes the connection's upgrade future; it can happen at most
/// once. Flushing is handled by the response body stream.
pub struct Downstream {
	on_upgrade: Option<OnUpgrade>,
	status: Option<StatusCode>,
}

impl Downstream {
	/// Take the upgrade handle out of the request, if the server put one there.
	pub fn from_parts(parts: &mut Parts) -> Self {
		Self {
			on_upgrade: parts.extensions.remove::<OnUpgrade>(),
			status: None,
		}
	}

	pub fn hijack(&mut self) -> Option<OnUpgrade> {
		self.on_upgrade.take()
	}

	/// Record the status about to be written and hand the response back.
	pub fn respond(&mut self, response: Response) -> Response {
		self.status = Some(response.status());
		response
	}

	/// The written status; 200 if nothing explicit was recorded.
	pub fn status(&self) -> StatusCode {
		self.status.unwrap_or(StatusCode::OK)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::body::Body;
	use axum::response::IntoResponse;

	#[test]
	fn plain_requests_cannot_hijack() {
		let (mut parts, _) = http::Request::new(Body::empty()).into_parts();
		let mut downstream = Downstream::from_parts(&mut parts);
		assert!(downstream.hijack().is_none());
	}

	#[test]
	fn status_defaults_to_ok_and_tracks_writes() {
		let (mut parts, _) = http::Request::new(Body::empty()).into_parts();
		let mut downstream = Downstream::from_parts(&mut parts);
		assert_eq!(downstream.status(), StatusCode::OK);

		let response = downstream.respond(StatusCode::BAD_GATEWAY.into_response());
		assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
		assert_eq!(downstream.status(), StatusCode::BAD_GATEWAY);
	}
}
