// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! K8s client abstraction for the kexer exec connector.
//!
//! This crate provides:
//! - A trait-based K8s client abstraction for testability
//! - Production implementation using the kube crate
//! - Re-exports of the core API types the connector reads

mod client;
mod error;
mod kube_client;
mod types;

pub use client::K8sClient;
pub use error::K8sError;
pub use kube_client::KubeClient;
pub use types::{
	ByteString, Container, DaemonEndpoint, Node, NodeAddress, NodeDaemonEndpoints, NodeStatus,
	ObjectMeta, Pod, PodSpec, Secret,
};
