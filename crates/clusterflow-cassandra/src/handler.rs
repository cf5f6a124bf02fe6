//! Cassandra role handler

use async_trait::async_trait;
use clusterflow_core::{FirewallSettings, Instance, Result, RoleHandler, StageEvent};

pub const CASSANDRA_ROLE: &str = "cassandra";

/// Thrift client port
pub const CLIENT_PORT: u16 = 9160;
pub const JMX_PORT: u16 = 8080;

/// Config key overriding the Cassandra binary tarball URL
pub const BIN_TARBALL: &str = "cassandra.tarball-url";
/// Config key naming the Cassandra major version of the tarball
pub const MAJOR_VERSION: &str = "cassandra.version-major";

#[derive(Debug, Default)]
pub struct CassandraHandler;

impl CassandraHandler {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RoleHandler for CassandraHandler {
    fn role(&self) -> &str {
        CASSANDRA_ROLE
    }

    async fn before_bootstrap(&self, event: &mut StageEvent<'_>) -> Result<()> {
        event.add_run_url("sun/java/install", Vec::<String>::new());

        let spec = event.spec();
        match (spec.get_config(BIN_TARBALL), spec.get_config(MAJOR_VERSION)) {
            (Some(tarball), Some(major)) => {
                tracing::debug!("Installing Cassandra {} from {}", major, tarball);
                event.add_run_url("apache/cassandra/install", [major, tarball]);
            }
            _ => event.add_run_url("apache/cassandra/install", Vec::<String>::new()),
        }
        Ok(())
    }

    async fn before_configure(&self, event: &mut StageEvent<'_>) -> Result<()> {
        let spec = event.spec();
        let instances = event.cluster().instances_with_role(CASSANDRA_ROLE);
        if instances.is_empty() {
            return Err(event.error("cluster has no cassandra instances"));
        }

        tracing::info!("Authorizing firewall");
        FirewallSettings::authorize_ingress(event.provider(), &instances, spec, CLIENT_PORT)
            .await?;
        FirewallSettings::authorize_ingress(event.provider(), &instances, spec, JMX_PORT).await?;

        let seeds = select_seeds(&instances);
        let mut addresses = Vec::with_capacity(seeds.len());
        for seed in &seeds {
            let address = seed.private_address().ok_or_else(|| {
                event.error(format!("seed {} has no private address", seed.id()))
            })?;
            addresses.push(address.to_string());
        }
        let servers = addresses.join(" ");
        tracing::info!("Cassandra seeds: {}", servers);

        event.add_run_url(
            "apache/cassandra/post-configure",
            ["-c", spec.provider(), servers.as_str()],
        );
        Ok(())
    }
}

/// Number of seeds for a role with `n` instances
///
/// 20% of the nodes, rounded up, and at least one. Placeholder heuristic.
pub fn seed_count(n: usize) -> usize {
    (n as f64 * 0.2).max(1.0).ceil() as usize
}

/// The first [`seed_count`] instances, in the given order
pub fn select_seeds<'a>(instances: &[&'a Instance]) -> Vec<&'a Instance> {
    instances
        .iter()
        .take(seed_count(instances.len()))
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clusterflow_core::testing::MemoryProvider;
    use clusterflow_core::{
        Cluster, ClusterError, ClusterSpec, Hook, InstanceTemplate, OsFamily, ScriptStatement,
    };

    fn spec_with(config: &[(&str, &str)]) -> ClusterSpec {
        let mut builder = ClusterSpec::builder()
            .service_name("cassandra")
            .cluster_name("analytics")
            .provider("sakura-cloud")
            .run_url_base("http://example.org/scripts")
            .instance_template(InstanceTemplate::new(3, [CASSANDRA_ROLE]).unwrap());
        for (k, v) in config {
            builder = builder.config(*k, *v);
        }
        builder.build().unwrap()
    }

    fn instances(n: usize) -> Vec<Instance> {
        (1..=n)
            .map(|i| {
                Instance::new(format!("node-{}", i), [CASSANDRA_ROLE])
                    .with_private_address(format!("10.0.0.{}", i).parse().unwrap())
            })
            .collect()
    }

    fn render(statements: &[ScriptStatement]) -> Vec<String> {
        statements.iter().map(|s| s.render(OsFamily::Unix)).collect()
    }

    #[test]
    fn test_seed_count() {
        for n in 1..=5 {
            assert_eq!(seed_count(n), 1, "n = {}", n);
        }
        assert_eq!(seed_count(6), 2);
        assert_eq!(seed_count(10), 2);
        assert_eq!(seed_count(11), 3);
        assert_eq!(seed_count(20), 4);
    }

    #[test]
    fn test_select_seeds_keeps_input_order() {
        let all = instances(10);
        let mut refs: Vec<&Instance> = all.iter().collect();
        refs.reverse();

        let seeds = select_seeds(&refs);
        let ids: Vec<_> = seeds.iter().map(|i| i.id()).collect();
        assert_eq!(ids, vec!["node-10", "node-9"]);
        assert_eq!(select_seeds(&refs), seeds);
    }

    #[tokio::test]
    async fn test_before_bootstrap_default_install() {
        let spec = spec_with(&[]);
        let cluster = Cluster::empty();
        let provider = MemoryProvider::new();
        let mut event =
            StageEvent::new(Hook::BeforeBootstrap, CASSANDRA_ROLE, &spec, &cluster, &provider);

        CassandraHandler::new()
            .before_bootstrap(&mut event)
            .await
            .unwrap();

        assert_eq!(
            render(event.statements()),
            vec![
                "runurl http://example.org/scripts/sun/java/install\n",
                "runurl http://example.org/scripts/apache/cassandra/install\n",
            ]
        );
    }

    #[tokio::test]
    async fn test_before_bootstrap_with_tarball_override() {
        let spec = spec_with(&[
            (BIN_TARBALL, "http://mirror.example/cassandra-0.6.1.tar.gz"),
            (MAJOR_VERSION, "0.6"),
        ]);
        let cluster = Cluster::empty();
        let provider = MemoryProvider::new();
        let mut event =
            StageEvent::new(Hook::BeforeBootstrap, CASSANDRA_ROLE, &spec, &cluster, &provider);

        CassandraHandler::new()
            .before_bootstrap(&mut event)
            .await
            .unwrap();

        assert_eq!(
            render(event.statements())[1],
            "runurl http://example.org/scripts/apache/cassandra/install 0.6 http://mirror.example/cassandra-0.6.1.tar.gz\n"
        );
    }

    #[tokio::test]
    async fn test_tarball_without_version_uses_default_install() {
        let spec = spec_with(&[(BIN_TARBALL, "http://mirror.example/c.tar.gz")]);
        let cluster = Cluster::empty();
        let provider = MemoryProvider::new();
        let mut event =
            StageEvent::new(Hook::BeforeBootstrap, CASSANDRA_ROLE, &spec, &cluster, &provider);

        CassandraHandler::new()
            .before_bootstrap(&mut event)
            .await
            .unwrap();

        assert!(event.statements()[1].args().is_empty());
    }

    #[tokio::test]
    async fn test_before_configure_opens_ports_and_lists_seeds() {
        let spec = spec_with(&[]);
        let mut members = instances(6);
        members.push(
            Instance::new("zk-1", ["zookeeper"]).with_private_address("10.0.9.9".parse().unwrap()),
        );
        let cluster = Cluster::new(members);
        let provider = MemoryProvider::new();
        let mut event =
            StageEvent::new(Hook::BeforeConfigure, CASSANDRA_ROLE, &spec, &cluster, &provider);

        CassandraHandler::new()
            .before_configure(&mut event)
            .await
            .unwrap();

        let rules = provider.rules();
        assert_eq!(rules.len(), 12);
        assert!(rules.iter().all(|(id, _)| id != "zk-1"));
        assert_eq!(rules.iter().filter(|(_, r)| r.port == CLIENT_PORT).count(), 6);
        assert_eq!(rules.iter().filter(|(_, r)| r.port == JMX_PORT).count(), 6);

        assert_eq!(
            render(event.statements()),
            vec!["runurl http://example.org/scripts/apache/cassandra/post-configure -c sakura-cloud 10.0.0.1 10.0.0.2\n"]
        );
    }

    #[tokio::test]
    async fn test_before_configure_without_instances_fails() {
        let spec = spec_with(&[]);
        let cluster = Cluster::empty();
        let provider = MemoryProvider::new();
        let mut event =
            StageEvent::new(Hook::BeforeConfigure, CASSANDRA_ROLE, &spec, &cluster, &provider);

        let err = CassandraHandler::new()
            .before_configure(&mut event)
            .await
            .unwrap_err();
        assert!(matches!(err, ClusterError::Handler { .. }));
        assert!(provider.rules().is_empty());
    }
}
