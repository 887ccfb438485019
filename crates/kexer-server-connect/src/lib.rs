// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Cluster exec connector.
//!
//! Given a cluster object and a proxied pod path, this crate works out where
//! the request should go and forwards it there:
//!
//! - [`ClusterConfigResolver`] maps a [`ClusterDescriptor`] to client
//!   configuration, using the injected [`LoopbackHandle`] for the local cluster
//! - [`KubeletConnectionResolver`] finds a node agent's address, port and
//!   transport
//! - [`TargetLocator`] picks the container and builds the node agent exec URL
//! - [`UpgradeTransportBuilder`] builds the HTTP/1.1 transport for upgrades
//! - [`UpgradeAwareProxy`] performs the single proxied exchange
//! - [`ClusterConnector`] drives the whole flow for one request

pub mod cluster;
pub mod connector;
pub mod error;
pub mod locator;
pub mod node;
pub mod options;
pub mod proxy;
pub mod transport;

#[cfg(test)]
mod testing;

pub use cluster::{
	ClientIdentity, ClusterClientFactory, ClusterConfig, ClusterConfigResolver, ClusterDescriptor,
	ClusterGetter, KubeClientFactory, LoopbackClient, LoopbackHandle, LoopbackState,
	ResolvedCluster, TlsPolicy,
};
pub use connector::{ClusterConnector, ConnectorSettings, ExecHandler, CONNECT_METHODS};
pub use error::{ConnectError, ConnectResult, ProxyError};
pub use locator::{select_container, stream_params, ResolvedTarget, TargetLocator};
pub use node::{
	KubeletConnectionResolver, NodeAddressType, NodeAgentSettings, NodeConnectionInfo,
	NodeConnectionResolver, NodeTransport,
};
pub use options::{ConnectMode, ConnectOptions, ExecOptions, PodRef, ProxyPath};
pub use proxy::{Downstream, ErrorResponder, FlushIntervalStream, UpgradeAwareProxy};
pub use transport::{control_plane_transport, UpgradeTransportBuilder};
