// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! HTTP server exposing the cluster `exec` connect subresource.
//!
//! Requests are validated and handed to [`kexer_server_connect`], which
//! proxies them to the cluster's control plane or to a node agent.

pub mod api;
pub mod cluster_store;
pub mod error;
pub mod loopback;
pub mod routes;

pub use api::{create_app_state, create_router, AppState, EXEC_ROUTE};
pub use cluster_store::SecretClusterStore;
pub use error::{ServerError, Status, StatusResponder};
pub use kexer_server_config::ServerConfig;
