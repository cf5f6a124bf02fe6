//! Cassandra cluster service

use crate::handler::CassandraHandler;
use async_trait::async_trait;
use clusterflow_core::{ClusterService, HandlerRegistry, ProvisioningProvider};
use std::sync::Arc;

pub const SERVICE_NAME: &str = "cassandra";

/// Launches and destroys Cassandra clusters on a provider
pub struct CassandraService {
    registry: HandlerRegistry,
    provider: Arc<dyn ProvisioningProvider>,
}

impl CassandraService {
    pub fn new(provider: Arc<dyn ProvisioningProvider>) -> Self {
        Self {
            registry: HandlerRegistry::new().with_handler(CassandraHandler::new()),
            provider,
        }
    }
}

#[async_trait]
impl ClusterService for CassandraService {
    fn name(&self) -> &str {
        SERVICE_NAME
    }

    fn handlers(&self) -> &HandlerRegistry {
        &self.registry
    }

    fn provider(&self) -> &dyn ProvisioningProvider {
        self.provider.as_ref()
    }
}
