//! Client library for the Volcano console gateway.
//!
//! The gateway is a small REST service that fronts one or more Kubernetes
//! clusters running the Volcano scheduler, plus the per-node agents that
//! expose workspace files, logs, and command execution on each compute node.
//! This crate wraps that API in typed async calls.
//!
//! # Example
//!
//! ```no_run
//! use gateway_rs::{GatewayClient, GatewayConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), gateway_rs::GatewayError> {
//!     let config = GatewayConfig::load_default()?;
//!     let client = GatewayClient::new(&config)?;
//!
//!     for node in client.cluster_nodes(None).await? {
//!         println!("{} {}", node.name, node.internal_ip);
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;

pub use client::{
    ClusterList, DeploymentRow, GatewayClient, Listing, NodeProbe, NodeRow, PodLogs, PodRow,
    ResourceUsage, ServiceRow,
};
pub use config::{DEFAULT_AGENT_PORT, DEFAULT_GATEWAY_URL, GatewayConfig};
pub use error::{GatewayError, Result};
