pub mod destroy;
pub mod launch;
pub mod list;

use crate::factory::{create_provider, create_service};
use clusterflow_core::{ClusterService, ClusterSpec, Result};

/// Resolve the service and provider named by `spec`
pub fn service_for(spec: &ClusterSpec) -> Result<Box<dyn ClusterService>> {
    let provider = create_provider(spec)?;
    create_service(spec.service_name(), provider)
}

/// Completes when the user presses Ctrl-C
pub async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Could not listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
