// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections for kexer-server.

pub mod connect;
pub mod http;
pub mod logging;
pub mod node_agent;

pub use connect::{ConnectConfig, ConnectConfigLayer};
pub use http::{HttpConfig, HttpConfigLayer};
pub use logging::{LoggingConfig, LoggingConfigLayer};
pub use node_agent::{NodeAgentConfig, NodeAgentConfigLayer, DEFAULT_PREFERRED_ADDRESS_TYPES};
