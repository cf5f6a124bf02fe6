//! Name-based construction of services and providers

use clusterflow_cassandra::CassandraService;
use clusterflow_cloud_sakura::SakuraCloudProvider;
use clusterflow_core::{ClusterError, ClusterService, ClusterSpec, ProvisioningProvider, Result};
use std::sync::Arc;

/// Service names `create_service` understands
pub const SERVICES: [&str; 1] = [clusterflow_cassandra::SERVICE_NAME];

/// Provider ids `create_provider` understands
pub const PROVIDERS: [&str; 1] = [clusterflow_cloud_sakura::PROVIDER_NAME];

pub fn create_service(
    name: &str,
    provider: Arc<dyn ProvisioningProvider>,
) -> Result<Box<dyn ClusterService>> {
    match name {
        clusterflow_cassandra::SERVICE_NAME => Ok(Box::new(CassandraService::new(provider))),
        other => Err(ClusterError::InvalidSpec(format!(
            "unknown service '{}' (available: {})",
            other,
            SERVICES.join(", ")
        ))),
    }
}

pub fn create_provider(spec: &ClusterSpec) -> Result<Arc<dyn ProvisioningProvider>> {
    match spec.provider() {
        clusterflow_cloud_sakura::PROVIDER_NAME => {
            Ok(Arc::new(SakuraCloudProvider::from_spec(spec)?))
        }
        other => Err(ClusterError::InvalidSpec(format!(
            "unknown provider '{}' (available: {})",
            other,
            PROVIDERS.join(", ")
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clusterflow_core::testing::MemoryProvider;
    use clusterflow_core::InstanceTemplate;

    fn spec(provider: &str) -> ClusterSpec {
        ClusterSpec::builder()
            .service_name("cassandra")
            .cluster_name("ring")
            .provider(provider)
            .instance_template(InstanceTemplate::new(1, ["cassandra"]).unwrap())
            .build()
            .unwrap()
    }

    #[test]
    fn test_create_service() {
        let service = create_service("cassandra", Arc::new(MemoryProvider::new())).unwrap();
        assert_eq!(service.name(), "cassandra");
        assert!(service.handlers().get("cassandra").is_some());
    }

    #[test]
    fn test_unknown_service_is_validation_error() {
        let err = create_service("hbase", Arc::new(MemoryProvider::new()))
            .err()
            .unwrap();
        assert!(err.is_validation());
        assert!(err.to_string().contains("hbase"));
    }

    #[test]
    fn test_create_provider() {
        let provider = create_provider(&spec("sakura-cloud")).unwrap();
        assert_eq!(provider.name(), "sakura-cloud");

        let err = create_provider(&spec("ec2")).err().unwrap();
        assert!(err.is_validation());
    }
}
