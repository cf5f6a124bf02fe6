//! Firewall authorization for cluster instances

use crate::cluster::Instance;
use crate::error::Result;
use crate::provider::{IngressRule, ProvisioningProvider};
use crate::spec::ClusterSpec;
use futures_util::future::try_join_all;
use std::collections::HashSet;

pub struct FirewallSettings;

impl FirewallSettings {
    /// Open `port` (TCP) for inbound traffic on every given instance
    ///
    /// Rules are scoped to the spec's cluster name. Calling this again with the
    /// same arguments leaves the provider's rule set unchanged.
    pub async fn authorize_ingress(
        provider: &dyn ProvisioningProvider,
        instances: &[&Instance],
        spec: &ClusterSpec,
        port: u16,
    ) -> Result<()> {
        Self::authorize(provider, instances, spec, &IngressRule::tcp(spec.cluster_name(), port))
            .await
    }

    /// Apply an arbitrary rule to every given instance
    pub async fn authorize(
        provider: &dyn ProvisioningProvider,
        instances: &[&Instance],
        spec: &ClusterSpec,
        rule: &IngressRule,
    ) -> Result<()> {
        let mut seen = HashSet::new();
        let targets: Vec<&Instance> = instances
            .iter()
            .copied()
            .filter(|i| seen.insert(i.id()))
            .collect();

        tracing::info!(
            "Authorizing ingress {} on {} instance(s)",
            rule,
            targets.len()
        );

        try_join_all(
            targets
                .into_iter()
                .map(|instance| provider.open_port(spec, instance, rule)),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::InstanceTemplate;
    use crate::testing::{FailOn, MemoryProvider};

    fn spec() -> ClusterSpec {
        ClusterSpec::builder()
            .service_name("cassandra")
            .cluster_name("analytics")
            .provider("memory")
            .instance_template(InstanceTemplate::new(2, ["cassandra"]).unwrap())
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_authorize_ingress_opens_port_on_each_instance() {
        let provider = MemoryProvider::new();
        let a = Instance::new("a", ["cassandra"]);
        let b = Instance::new("b", ["cassandra"]);

        FirewallSettings::authorize_ingress(&provider, &[&a, &b], &spec(), 9160)
            .await
            .unwrap();

        let rules = provider.rules();
        assert_eq!(rules.len(), 2);
        assert!(rules
            .iter()
            .all(|(_, r)| r.port == 9160 && r.group == "analytics"));
    }

    #[tokio::test]
    async fn test_authorize_ingress_is_idempotent() {
        let provider = MemoryProvider::new();
        let a = Instance::new("a", ["cassandra"]);
        let spec = spec();

        FirewallSettings::authorize_ingress(&provider, &[&a], &spec, 8080)
            .await
            .unwrap();
        let first = provider.rules();

        FirewallSettings::authorize_ingress(&provider, &[&a], &spec, 8080)
            .await
            .unwrap();
        assert_eq!(provider.rules(), first);
    }

    #[tokio::test]
    async fn test_duplicate_instances_opened_once() {
        let provider = MemoryProvider::new();
        let a = Instance::new("a", ["cassandra"]);

        FirewallSettings::authorize_ingress(&provider, &[&a, &a], &spec(), 9160)
            .await
            .unwrap();
        assert_eq!(provider.journal().count("open_port a"), 1);
    }

    #[tokio::test]
    async fn test_provider_failure_propagates() {
        let provider = MemoryProvider::new();
        provider.fail_on(FailOn::OpenPort);
        let a = Instance::new("a", ["cassandra"]);

        let err = FirewallSettings::authorize_ingress(&provider, &[&a], &spec(), 9160)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Provisioning);
    }
}
