//! Fleet orchestrator.
//!
//! Reads a cluster manifest, converges the cluster's provider resources and
//! installs monitoring on its nodes. The binary in `main.rs` wires this to
//! the environment; tests drive [`Bootstrapper`] with a fixture provider.

pub mod bootstrap;
pub mod cluster;
pub mod config;
pub mod counting;
pub mod error;

pub use bootstrap::{
    BootstrapReport, BootstrapSettings, Bootstrapper, ClusterResources, MonitoringReport,
};
pub use cluster::ClusterConfig;
pub use config::Config;
pub use error::{OrchestratorError, OrchestratorResult};
