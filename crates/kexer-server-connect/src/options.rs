// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Connect options decoded from the inbound query string, and the proxied
//! path they carry.

use url::form_urlencoded;

use crate::error::{ConnectError, ConnectResult};

/// Position of the namespace segment in a proxied pod path.
///
/// `"/api/v1/namespaces/{ns}/pods/{pod}/exec"` splits on `/` into
/// `["", "api", "v1", "namespaces", ns, "pods", pod, "exec"]`.
pub const NAMESPACE_SEGMENT: usize = 4;

/// Position of the pod name segment in a proxied pod path.
pub const POD_SEGMENT: usize = 6;

/// Paths with fewer segments than this are rejected outright.
pub const MIN_PATH_SEGMENTS: usize = 5;

/// Trailing segment that selects the node agent exec flow.
pub const EXEC_SUBRESOURCE: &str = "exec";

/// Which flow a connect request takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectMode {
	/// Forward the request to the cluster's control plane as-is.
	LocalProxy,
	/// Resolve the pod's node and stream from its node agent.
	RemoteExec,
}

impl ConnectMode {
	pub fn as_str(&self) -> &'static str {
		match self {
			ConnectMode::LocalProxy => "local_proxy",
			ConnectMode::RemoteExec => "remote_exec",
		}
	}
}

/// Exec parameters for a single connect request.
///
/// Boolean flags are set only when the query value is exactly `"true"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOptions {
	pub stdin: bool,
	pub stdout: bool,
	pub stderr: bool,
	pub tty: bool,
	pub container: String,
	pub command: Vec<String>,
	/// Path of the proxied request, e.g. `/api/v1/namespaces/ns/pods/p/exec`.
	pub path: String,
	/// Every query parameter as received, in arrival order.
	pub params: Vec<(String, String)>,
}

impl ExecOptions {
	/// Decode exec options from a raw (still percent-encoded) query string.
	pub fn from_query(raw_query: &str) -> Self {
		let mut options = ExecOptions::default();
		for (key, value) in form_urlencoded::parse(raw_query.as_bytes()) {
			match key.as_ref() {
				"stdin" => options.stdin = value == "true",
				"stdout" => options.stdout = value == "true",
				"stderr" => options.stderr = value == "true",
				"tty" => options.tty = value == "true",
				"container" => options.container = value.to_string(),
				"command" => options.command.push(value.to_string()),
				"path" => options.path = value.to_string(),
				_ => {}
			}
			options.params.push((key.into_owned(), value.into_owned()));
		}
		options
	}

	/// Re-encode every received parameter with keys sorted, the way the
	/// local proxy flow forwards them.
	pub fn encode_params(&self) -> String {
		let mut params = self.params.clone();
		params.sort_by(|a, b| a.0.cmp(&b.0));
		let mut serializer = form_urlencoded::Serializer::new(String::new());
		for (key, value) in &params {
			serializer.append_pair(key, value);
		}
		serializer.finish()
	}
}

/// Options accepted by the connect operation. Exec is the only kind today;
/// matches over this enum are exhaustive so a new kind must be handled
/// everywhere it flows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOptions {
	Exec(ExecOptions),
}

impl ConnectOptions {
	/// Decode options from the inbound query. A request without a `path`
	/// parameter has nothing to proxy and is rejected.
	pub fn from_query(raw_query: Option<&str>) -> ConnectResult<Self> {
		let exec = ExecOptions::from_query(raw_query.unwrap_or_default());
		if exec.path.is_empty() {
			return Err(ConnectError::InvalidOptions(
				"the path parameter is required".to_string(),
			));
		}
		Ok(ConnectOptions::Exec(exec))
	}

	pub fn path(&self) -> ProxyPath<'_> {
		match self {
			ConnectOptions::Exec(exec) => ProxyPath::new(&exec.path),
		}
	}

	pub fn mode(&self) -> ConnectMode {
		self.path().mode()
	}
}

/// Namespace and pod name extracted from a proxied path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodRef {
	pub namespace: String,
	pub name: String,
}

/// A proxied path split into `/`-separated segments.
#[derive(Debug, Clone)]
pub struct ProxyPath<'a> {
	raw: &'a str,
	segments: Vec<&'a str>,
}

impl<'a> ProxyPath<'a> {
	pub fn new(raw: &'a str) -> Self {
		Self {
			raw,
			segments: raw.split('/').collect(),
		}
	}

	pub fn as_str(&self) -> &'a str {
		self.raw
	}

	/// `RemoteExec` exactly when the last segment is `exec`.
	pub fn mode(&self) -> ConnectMode {
		match self.segments.last() {
			Some(&EXEC_SUBRESOURCE) => ConnectMode::RemoteExec,
			_ => ConnectMode::LocalProxy,
		}
	}

	/// Extract the namespace and pod name. Short paths and paths whose pod
	/// segment is missing or empty are rejected rather than indexed blindly.
	pub fn pod_ref(&self) -> ConnectResult<PodRef> {
		if self.segments.len() < MIN_PATH_SEGMENTS {
			return Err(ConnectError::BadRequest("invalid request".to_string()));
		}

		let namespace = self.segments[NAMESPACE_SEGMENT];
		let name = self.segments.get(POD_SEGMENT).copied().unwrap_or_default();
		if namespace.is_empty() || name.is_empty() {
			return Err(ConnectError::BadRequest(format!(
				"invalid request: no pod name in path {}",
				self.raw
			)));
		}

		Ok(PodRef {
			namespace: namespace.to_string(),
			name: name.to_string(),
		})
	}
}
