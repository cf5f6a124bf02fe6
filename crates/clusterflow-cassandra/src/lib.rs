//! Apache Cassandra service for ClusterFlow
//!
//! Installs Cassandra on every node of the `cassandra` role, opens the client
//! and JMX ports, and points each node at a seed subset of its peers.
//!
//! # Example
//!
//! ```ignore
//! use clusterflow_cassandra::CassandraService;
//! use clusterflow_core::ClusterService;
//!
//! let service = CassandraService::new(provider);
//! let cluster = service.launch_cluster(&spec).await?;
//! ```

pub mod handler;
pub mod service;

pub use handler::{
    BIN_TARBALL, CASSANDRA_ROLE, CLIENT_PORT, CassandraHandler, JMX_PORT, MAJOR_VERSION, seed_count,
    select_seeds,
};
pub use service::{CassandraService, SERVICE_NAME};
