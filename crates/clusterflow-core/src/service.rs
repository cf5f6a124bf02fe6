//! Cluster service façade
//!
//! A [`ClusterService`] is what callers launch, destroy and list clusters
//! through. Implementors supply a name, their role handlers and a provider;
//! the lifecycle operations are provided on top of those.

use crate::action::{ClusterAction, ClusterActionStage};
use crate::cluster::{Cluster, NodeMetadata};
use crate::error::{ClusterError, Result};
use crate::handler::HandlerRegistry;
use crate::provider::{ProvisioningProvider, running_in_group};
use crate::spec::ClusterSpec;
use async_trait::async_trait;
use std::collections::HashSet;
use std::future::Future;

#[async_trait]
pub trait ClusterService: Send + Sync {
    /// Unique service name (e.g., "cassandra")
    fn name(&self) -> &str;

    /// Handlers for the roles this service understands
    fn handlers(&self) -> &HandlerRegistry;

    fn provider(&self) -> &dyn ProvisioningProvider;

    /// Check that `spec` targets this service and only uses known roles
    fn validate(&self, spec: &ClusterSpec) -> Result<()> {
        check_service_name(self.name(), spec)?;
        self.handlers().resolve(spec)?;
        Ok(())
    }

    /// Bootstrap then configure the cluster described by `spec`
    ///
    /// Returns once the provider has finished every bootstrap and configure
    /// call. The service inside the cluster may still be starting.
    async fn launch_cluster(&self, spec: &ClusterSpec) -> Result<Cluster> {
        check_service_name(self.name(), spec)?;
        let action = ClusterAction::new(self.handlers(), self.provider(), spec)?;
        tracing::info!(
            "Launching {} cluster {}",
            self.name(),
            spec.cluster_name()
        );
        let cluster = action
            .execute(ClusterActionStage::Bootstrap, None)
            .await?;
        action
            .execute(ClusterActionStage::Configure, Some(cluster))
            .await
    }

    /// Destroy every node of the cluster
    async fn destroy_cluster(&self, spec: &ClusterSpec) -> Result<()> {
        check_service_name(self.name(), spec)?;
        tracing::info!(
            "Destroying {} cluster {}",
            self.name(),
            spec.cluster_name()
        );
        ClusterAction::lenient(self.handlers(), self.provider(), spec)
            .execute(ClusterActionStage::Destroy, None)
            .await?;
        Ok(())
    }

    /// Running nodes tagged with the spec's cluster name, unique by ID
    async fn get_nodes(&self, spec: &ClusterSpec) -> Result<Vec<NodeMetadata>> {
        let nodes = self
            .provider()
            .list_nodes(&running_in_group(spec.cluster_name()))
            .await?;
        let mut seen = HashSet::new();
        Ok(nodes
            .into_iter()
            .filter(|n| seen.insert(n.id.clone()))
            .collect())
    }
}

fn check_service_name(service: &str, spec: &ClusterSpec) -> Result<()> {
    if spec.service_name() != service {
        return Err(ClusterError::InvalidSpec(format!(
            "spec is for service '{}', not '{}'",
            spec.service_name(),
            service
        )));
    }
    Ok(())
}

/// Run `operation` unless `signal` completes first
///
/// When the signal wins, the operation is dropped at its current await point
/// and [`ClusterError::Cancelled`] is returned. The cluster is then only
/// recoverable by listing its nodes.
pub async fn cancellable<T, F, S>(operation: F, signal: S) -> Result<T>
where
    F: Future<Output = Result<T>>,
    S: Future<Output = ()>,
{
    tokio::select! {
        result = operation => result,
        _ = signal => Err(ClusterError::Cancelled(
            "interrupted during a remote call".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::NodeState;
    use crate::handler::{RoleHandler, StageEvent};
    use crate::spec::InstanceTemplate;
    use crate::testing::{FailOn, Journal, MemoryProvider};
    use std::sync::Arc;

    /// Fails configure if bootstrap left it with fewer than `expected` peers
    struct CountingHandler {
        role: &'static str,
        expected: usize,
        journal: Journal,
    }

    #[async_trait]
    impl RoleHandler for CountingHandler {
        fn role(&self) -> &str {
            self.role
        }

        async fn before_configure(&self, event: &mut StageEvent<'_>) -> Result<()> {
            let seen = event.cluster().instances_with_role(self.role).len();
            self.journal
                .record(format!("before_configure {} saw {}", self.role, seen));
            if seen < self.expected {
                return Err(event.error(format!("expected {} instances, saw {}", self.expected, seen)));
            }
            Ok(())
        }

        async fn before_destroy(&self, _event: &mut StageEvent<'_>) -> Result<()> {
            self.journal.record(format!("before_destroy {}", self.role));
            Ok(())
        }
    }

    struct TestService {
        registry: HandlerRegistry,
        provider: Arc<MemoryProvider>,
    }

    #[async_trait]
    impl ClusterService for TestService {
        fn name(&self) -> &str {
            "test"
        }

        fn handlers(&self) -> &HandlerRegistry {
            &self.registry
        }

        fn provider(&self) -> &dyn ProvisioningProvider {
            self.provider.as_ref()
        }
    }

    fn service(provider: MemoryProvider) -> TestService {
        let journal = provider.journal().clone();
        TestService {
            registry: HandlerRegistry::new()
                .with_handler(CountingHandler {
                    role: "seed",
                    expected: 1,
                    journal: journal.clone(),
                })
                .with_handler(CountingHandler {
                    role: "worker",
                    expected: 4,
                    journal,
                }),
            provider: Arc::new(provider),
        }
    }

    fn spec(service_name: &str) -> ClusterSpec {
        ClusterSpec::builder()
            .service_name(service_name)
            .cluster_name("analytics")
            .provider("memory")
            .instance_template(InstanceTemplate::new(1, ["seed"]).unwrap())
            .instance_template(InstanceTemplate::new(4, ["worker"]).unwrap())
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_launch_configures_after_full_bootstrap() {
        let service = service(MemoryProvider::new());
        let cluster = service.launch_cluster(&spec("test")).await.unwrap();

        assert_eq!(cluster.len(), 5);
        let journal = service.provider.journal();
        assert_eq!(journal.count("before_configure seed saw 1"), 1);
        assert_eq!(journal.count("before_configure worker saw 4"), 1);
        let last_create = journal
            .entries()
            .iter()
            .rposition(|e| e.starts_with("create_nodes"))
            .unwrap();
        assert!(journal.position("before_configure").unwrap() > last_create);
    }

    #[tokio::test]
    async fn test_launch_rejects_other_service() {
        let service = service(MemoryProvider::new());
        let err = service.launch_cluster(&spec("hadoop")).await.unwrap_err();
        assert!(err.is_validation());
        assert!(service.provider.journal().entries().is_empty());
    }

    #[tokio::test]
    async fn test_launch_rejects_unknown_role_before_remote_calls() {
        let service = service(MemoryProvider::new());
        let spec = ClusterSpec::builder()
            .service_name("test")
            .cluster_name("analytics")
            .provider("memory")
            .instance_template(InstanceTemplate::new(1, ["seed"]).unwrap())
            .instance_template(InstanceTemplate::new(2, ["ghost"]).unwrap())
            .build()
            .unwrap();

        let err = service.launch_cluster(&spec).await.unwrap_err();
        assert!(matches!(err, ClusterError::UnknownRole(ref r) if r == "ghost"));
        assert!(err.is_validation());
        assert!(service.provider.journal().entries().is_empty());

        service.destroy_cluster(&spec).await.unwrap();
        assert_eq!(service.provider.journal().count("before_destroy seed"), 1);
        assert_eq!(service.provider.journal().count("destroy_nodes"), 1);
    }

    #[tokio::test]
    async fn test_bootstrap_failure_skips_configure() {
        let provider = MemoryProvider::new();
        provider.fail_on(FailOn::CreateNodes);
        let service = service(provider);

        let err = service.launch_cluster(&spec("test")).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Provisioning);
        assert_eq!(service.provider.journal().count("before_configure"), 0);
    }

    #[tokio::test]
    async fn test_destroy_cluster_calls_each_hook_once() {
        let service = service(MemoryProvider::new());
        let spec = spec("test");
        service.launch_cluster(&spec).await.unwrap();
        service.destroy_cluster(&spec).await.unwrap();

        let journal = service.provider.journal();
        assert_eq!(journal.count("before_destroy seed"), 1);
        assert_eq!(journal.count("before_destroy worker"), 1);
        assert!(
            journal.position("before_destroy worker").unwrap()
                < journal.position("destroy_nodes").unwrap()
        );
        assert!(service.get_nodes(&spec).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_nodes_filters_group_and_state() {
        let provider = MemoryProvider::new()
            .with_node(NodeMetadata::new("match-1", NodeState::Running).with_group("analytics"))
            .with_node(NodeMetadata::new("match-2", NodeState::Running).with_group("analytics"))
            .with_node(NodeMetadata::new("other-group", NodeState::Running).with_group("web"))
            .with_node(NodeMetadata::new("stopped", NodeState::Suspended).with_group("analytics"))
            .with_node(NodeMetadata::new("pending", NodeState::Pending).with_group("analytics"))
            .with_node(NodeMetadata::new("untagged", NodeState::Running))
            .with_node(NodeMetadata::new("match-1", NodeState::Running).with_group("analytics"));
        let service = service(provider);

        let nodes = service.get_nodes(&spec("test")).await.unwrap();
        let mut ids: Vec<_> = nodes.iter().map(|n| n.id.as_str()).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec!["match-1", "match-2"]);
    }

    #[tokio::test]
    async fn test_cancellable_returns_cancelled() {
        let result: Result<()> =
            cancellable(std::future::pending(), std::future::ready(())).await;
        assert!(matches!(result, Err(ClusterError::Cancelled(_))));
    }

    #[tokio::test]
    async fn test_cancellable_passes_result_through() {
        let result = cancellable(async { Ok(7) }, std::future::pending()).await;
        assert_eq!(result.unwrap(), 7);
    }
}
