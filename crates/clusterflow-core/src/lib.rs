//! ClusterFlow core
//!
//! Provisions multi-node clusters through pluggable provisioning providers.
//! A cluster spec declares roles and counts; per-role handlers contribute
//! install and configure work at each stage of a fixed lifecycle.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │              ClusterService façade               │
//! │      launch_cluster / destroy_cluster / nodes    │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │               ClusterAction                      │
//! │   Bootstrap ──▶ Configure          Destroy       │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │  before hooks ▶ provider action ▶ after   │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────┐  ┌──────────────┐            │
//! │  │ RoleHandlers │  │ ScriptStmts  │            │
//! │  └──────────────┘  └──────────────┘            │
//! └───────┬─────────────────────────────────────────┘
//!         │
//! ┌───────▼───────────────────┐
//! │ trait ProvisioningProvider │
//! └───────────────────────────┘
//! ```

pub mod action;
pub mod cluster;
pub mod error;
pub mod firewall;
pub mod handler;
pub mod provider;
pub mod service;
pub mod spec;
pub mod state;
pub mod statement;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-exports
pub use action::{ClusterAction, ClusterActionStage};
pub use cluster::{Cluster, Instance, NodeMetadata, NodeState};
pub use error::{ClusterError, ErrorKind, Result};
pub use firewall::FirewallSettings;
pub use handler::{HandlerRegistry, Hook, RoleHandler, StageEvent};
pub use provider::{
    IngressRule, NodePredicate, NodeTemplate, Protocol, ProvisioningProvider, in_group,
    running_in_group,
};
pub use service::{ClusterService, cancellable};
pub use spec::{
    ClusterSpec, ClusterSpecBuilder, DEFAULT_RUN_URL_BASE, InstanceTemplate,
    parse_instance_templates,
};
pub use state::{ClusterState, ClusterStateStore, StateLock};
pub use statement::{OsFamily, ScriptStatement, render_script};
