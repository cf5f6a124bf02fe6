//! Cluster action pipeline
//!
//! Each [`ClusterActionStage`] is a fixed triple: the stage's "before" hook for
//! every role, one provider action, then the "after" hook for every role.
//! Roles are visited in spec declaration order, one at a time. Provider calls
//! for different instances inside a stage run concurrently. Any failure aborts
//! the stage where it happened; nothing is rolled back.

use crate::cluster::{Cluster, Instance};
use crate::error::{ClusterError, Result};
use crate::handler::{HandlerRegistry, Hook, RoleHandler, StageEvent, invoke};
use crate::provider::{NodeTemplate, ProvisioningProvider, in_group, running_in_group};
use crate::spec::ClusterSpec;
use crate::statement::{ScriptStatement, render_script};
use futures_util::future::try_join_all;
use std::fmt;
use std::sync::Arc;

/// Lifecycle stage of a cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClusterActionStage {
    Bootstrap,
    Configure,
    Destroy,
}

impl ClusterActionStage {
    /// (before, after) hooks run around the stage's provider action
    pub fn hooks(&self) -> (Hook, Hook) {
        match self {
            ClusterActionStage::Bootstrap => (Hook::BeforeBootstrap, Hook::AfterBootstrap),
            ClusterActionStage::Configure => (Hook::BeforeConfigure, Hook::AfterConfigure),
            ClusterActionStage::Destroy => (Hook::BeforeDestroy, Hook::AfterDestroy),
        }
    }
}

impl fmt::Display for ClusterActionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterActionStage::Bootstrap => write!(f, "bootstrap"),
            ClusterActionStage::Configure => write!(f, "configure"),
            ClusterActionStage::Destroy => write!(f, "destroy"),
        }
    }
}

type RoleHandlers<'s> = Vec<(&'s str, Arc<dyn RoleHandler>)>;
type RoleStatements = Vec<(String, Vec<ScriptStatement>)>;

/// Runs stages of one cluster's lifecycle
///
/// Handlers for the spec's roles are resolved when the action is built.
pub struct ClusterAction<'a> {
    spec: &'a ClusterSpec,
    provider: &'a dyn ProvisioningProvider,
    handlers: RoleHandlers<'a>,
    /// Roles without a handler, only allowed for destroy
    skipped: Vec<&'a str>,
}

impl<'a> ClusterAction<'a> {
    /// Action for `spec`, failing on the first role without a handler
    pub fn new(
        registry: &HandlerRegistry,
        provider: &'a dyn ProvisioningProvider,
        spec: &'a ClusterSpec,
    ) -> Result<Self> {
        let handlers = registry.resolve(spec)?;
        Ok(Self {
            spec,
            provider,
            handlers: spec.roles().into_iter().zip(handlers).collect(),
            skipped: Vec::new(),
        })
    }

    /// Action that skips roles without a handler
    ///
    /// Clusters launched under an older handler set can still be destroyed.
    /// Bootstrap and configure fail with [`ClusterError::UnknownRole`] if any
    /// role was skipped.
    pub fn lenient(
        registry: &HandlerRegistry,
        provider: &'a dyn ProvisioningProvider,
        spec: &'a ClusterSpec,
    ) -> Self {
        let mut handlers = Vec::new();
        let mut skipped = Vec::new();
        for role in spec.roles() {
            match registry.get(role) {
                Some(handler) => handlers.push((role, handler)),
                None => {
                    tracing::debug!("No handler for role {}, skipping its hooks", role);
                    skipped.push(role);
                }
            }
        }
        Self {
            spec,
            provider,
            handlers,
            skipped,
        }
    }

    /// Execute `stage` and return the cluster it produces
    ///
    /// Bootstrap extends `cluster` (usually `None`) with the created nodes.
    /// Configure needs the bootstrapped cluster. Destroy lists the running
    /// nodes itself when no cluster is given, and returns an empty cluster.
    pub async fn execute(
        &self,
        stage: ClusterActionStage,
        cluster: Option<Cluster>,
    ) -> Result<Cluster> {
        let name = self.spec.cluster_name();
        tracing::info!("Starting {} stage for cluster {}", stage, name);
        let result = self.run_stage(stage, cluster).await;
        match &result {
            Ok(cluster) => tracing::info!(
                "Finished {} stage for cluster {} ({} instance(s))",
                stage,
                name,
                cluster.len()
            ),
            Err(e) => tracing::warn!("{} stage for cluster {} aborted: {}", stage, name, e),
        }
        result
    }

    async fn run_stage(
        &self,
        stage: ClusterActionStage,
        cluster: Option<Cluster>,
    ) -> Result<Cluster> {
        let (before, after) = stage.hooks();
        let cluster = self.stage_input(stage, cluster).await?;

        let statements = self.run_hooks(before, &cluster).await?;
        let cluster = match stage {
            ClusterActionStage::Bootstrap => self.create_nodes(&statements, cluster).await?,
            ClusterActionStage::Configure => {
                self.run_scripts(&statements, &cluster).await?;
                cluster
            }
            ClusterActionStage::Destroy => {
                discard(before, statements);
                self.destroy_nodes().await?;
                cluster
            }
        };

        let statements = self.run_hooks(after, &cluster).await?;
        discard(after, statements);

        Ok(match stage {
            ClusterActionStage::Destroy => Cluster::empty(),
            _ => cluster,
        })
    }

    /// The cluster handed to the stage's hooks, checked before any hook runs
    async fn stage_input(
        &self,
        stage: ClusterActionStage,
        cluster: Option<Cluster>,
    ) -> Result<Cluster> {
        match stage {
            ClusterActionStage::Bootstrap => {
                self.require_all_roles()?;
                Ok(cluster.unwrap_or_default())
            }
            ClusterActionStage::Configure => {
                self.require_all_roles()?;
                let cluster =
                    cluster.ok_or_else(|| ClusterError::MissingCluster(stage.to_string()))?;
                if let Some(instance) = cluster
                    .instances()
                    .iter()
                    .find(|i| i.private_address().is_none())
                {
                    return Err(ClusterError::Provisioning(format!(
                        "instance {} has no private address",
                        instance.id()
                    )));
                }
                Ok(cluster)
            }
            ClusterActionStage::Destroy => match cluster {
                Some(cluster) => Ok(cluster),
                None => {
                    let nodes = self
                        .provider
                        .list_nodes(&running_in_group(self.spec.cluster_name()))
                        .await?;
                    Ok(Cluster::new(nodes.iter().map(Instance::from_node)))
                }
            },
        }
    }

    fn require_all_roles(&self) -> Result<()> {
        match self.skipped.first() {
            Some(role) => Err(ClusterError::UnknownRole(role.to_string())),
            None => Ok(()),
        }
    }

    /// Bootstrap action: one `create_nodes` call per instance template
    async fn create_nodes(
        &self,
        statements: &RoleStatements,
        existing: Cluster,
    ) -> Result<Cluster> {
        let spec = self.spec;
        let templates: Vec<NodeTemplate> = spec
            .instance_templates()
            .iter()
            .map(|t| {
                let install = t
                    .roles()
                    .iter()
                    .flat_map(|role| statements_for(statements, role))
                    .cloned()
                    .collect();
                NodeTemplate::new(t.roles().to_vec(), t.count()).with_statements(install)
            })
            .collect();

        for template in &templates {
            tracing::info!(
                "Creating {} node(s) for {}",
                template.count,
                template.roles.join("+")
            );
        }
        let created = try_join_all(
            templates
                .iter()
                .map(|template| self.provider.create_nodes(spec, template)),
        )
        .await?;

        let mut instances = Vec::new();
        for (template, nodes) in templates.iter().zip(created) {
            if nodes.len() < template.count {
                return Err(ClusterError::Provisioning(format!(
                    "requested {} node(s) for {} but the provider created {}",
                    template.count,
                    template.roles.join("+"),
                    nodes.len()
                )));
            }
            instances.extend(nodes.iter().map(|node| {
                Instance::from_node(node).with_roles(template.roles.iter().cloned())
            }));
        }
        Ok(existing.extended(instances))
    }

    /// Configure action: one script per instance holding a role with statements
    async fn run_scripts(&self, statements: &RoleStatements, cluster: &Cluster) -> Result<()> {
        let os = self.provider.os_family();
        let scripts: Vec<(&Instance, String)> = cluster
            .instances()
            .iter()
            .filter_map(|instance| {
                let lines: Vec<ScriptStatement> = statements
                    .iter()
                    .filter(|(role, _)| instance.has_role(role))
                    .flat_map(|(_, s)| s.iter().cloned())
                    .collect();
                if lines.is_empty() {
                    None
                } else {
                    Some((instance, render_script(&lines, os)))
                }
            })
            .collect();

        tracing::info!("Running configure scripts on {} instance(s)", scripts.len());
        try_join_all(
            scripts
                .iter()
                .map(|(instance, script)| self.provider.run_script(self.spec, instance, script)),
        )
        .await?;
        Ok(())
    }

    /// Destroy action: a single `destroy_nodes` call for the cluster's group
    async fn destroy_nodes(&self) -> Result<()> {
        let destroyed = self
            .provider
            .destroy_nodes(&in_group(self.spec.cluster_name()))
            .await?;
        tracing::info!(
            "Destroyed {} node(s) of cluster {}",
            destroyed.len(),
            self.spec.cluster_name()
        );
        Ok(())
    }

    /// Invoke `hook` for every role in order, collecting appended statements
    async fn run_hooks(&self, hook: Hook, cluster: &Cluster) -> Result<RoleStatements> {
        let mut collected = Vec::with_capacity(self.handlers.len());
        for (role, handler) in &self.handlers {
            tracing::debug!("Invoking {} for role {}", hook, role);
            let mut event = StageEvent::new(hook, role, self.spec, cluster, self.provider);
            invoke(handler.as_ref(), hook, &mut event).await?;
            collected.push((role.to_string(), event.into_statements()));
        }
        Ok(collected)
    }
}

/// Drop statements from hooks that have no provider action to feed
fn discard(hook: Hook, statements: RoleStatements) {
    for (role, statements) in statements {
        if !statements.is_empty() {
            tracing::warn!(
                "Ignoring {} statement(s) appended by {} for role {}",
                statements.len(),
                hook,
                role
            );
        }
    }
}

fn statements_for<'s>(statements: &'s RoleStatements, role: &str) -> &'s [ScriptStatement] {
    statements
        .iter()
        .find(|(r, _)| r == role)
        .map(|(_, s)| s.as_slice())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{NodeMetadata, NodeState};
    use crate::spec::InstanceTemplate;
    use crate::testing::{FailOn, Journal, MemoryProvider};
    use async_trait::async_trait;

    /// Handler that journals every hook and can append statements or fail
    struct Recorder {
        role: &'static str,
        journal: Journal,
        install: Option<&'static str>,
        configure: Option<&'static str>,
        fail_in: Option<Hook>,
    }

    impl Recorder {
        fn new(role: &'static str, journal: &Journal) -> Self {
            Self {
                role,
                journal: journal.clone(),
                install: None,
                configure: None,
                fail_in: None,
            }
        }

        fn installs(mut self, path: &'static str) -> Self {
            self.install = Some(path);
            self
        }

        fn configures(mut self, path: &'static str) -> Self {
            self.configure = Some(path);
            self
        }

        fn failing_in(mut self, hook: Hook) -> Self {
            self.fail_in = Some(hook);
            self
        }

        fn enter(&self, hook: Hook, event: &StageEvent<'_>) -> Result<()> {
            self.journal.record(format!(
                "{} {} cluster={}",
                hook,
                self.role,
                event.cluster().len()
            ));
            if self.fail_in == Some(hook) {
                return Err(event.error("boom"));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl RoleHandler for Recorder {
        fn role(&self) -> &str {
            self.role
        }

        async fn before_bootstrap(&self, event: &mut StageEvent<'_>) -> Result<()> {
            self.enter(Hook::BeforeBootstrap, event)?;
            if let Some(path) = self.install {
                event.add_run_url(path, Vec::<String>::new());
            }
            Ok(())
        }

        async fn after_bootstrap(&self, event: &mut StageEvent<'_>) -> Result<()> {
            self.enter(Hook::AfterBootstrap, event)
        }

        async fn before_configure(&self, event: &mut StageEvent<'_>) -> Result<()> {
            self.enter(Hook::BeforeConfigure, event)?;
            if let Some(path) = self.configure {
                event.add_run_url(path, Vec::<String>::new());
            }
            Ok(())
        }

        async fn after_configure(&self, event: &mut StageEvent<'_>) -> Result<()> {
            self.enter(Hook::AfterConfigure, event)
        }

        async fn before_destroy(&self, event: &mut StageEvent<'_>) -> Result<()> {
            self.enter(Hook::BeforeDestroy, event)
        }

        async fn after_destroy(&self, event: &mut StageEvent<'_>) -> Result<()> {
            self.enter(Hook::AfterDestroy, event)
        }
    }

    fn spec() -> ClusterSpec {
        ClusterSpec::builder()
            .service_name("svc")
            .cluster_name("analytics")
            .provider("memory")
            .run_url_base("http://example.org")
            .instance_template(InstanceTemplate::new(1, ["zk"]).unwrap())
            .instance_template(InstanceTemplate::new(2, ["cassandra"]).unwrap())
            .build()
            .unwrap()
    }

    fn registry(journal: &Journal) -> HandlerRegistry {
        HandlerRegistry::new()
            .with_handler(
                Recorder::new("zk", journal)
                    .installs("zk/install")
                    .configures("zk/configure"),
            )
            .with_handler(
                Recorder::new("cassandra", journal)
                    .installs("cassandra/install")
                    .configures("cassandra/configure"),
            )
    }

    #[tokio::test]
    async fn test_bootstrap_creates_nodes_per_template() {
        let journal = Journal::default();
        let provider = MemoryProvider::with_journal(journal.clone());
        let registry = registry(&journal);
        let spec = spec();
        let action = ClusterAction::new(&registry, &provider, &spec).unwrap();

        let cluster = action
            .execute(ClusterActionStage::Bootstrap, None)
            .await
            .unwrap();

        assert_eq!(cluster.len(), 3);
        assert_eq!(cluster.instances_with_role("zk").len(), 1);
        assert_eq!(cluster.instances_with_role("cassandra").len(), 2);

        let templates = provider.templates();
        assert_eq!(templates.len(), 2);
        assert_eq!(templates[0].roles, vec!["zk".to_string()]);
        assert_eq!(templates[0].statements[0].path(), "zk/install");
        assert_eq!(templates[1].statements[0].path(), "cassandra/install");

        let entries = journal.entries();
        assert_eq!(entries[0], "before_bootstrap zk cluster=0");
        assert_eq!(entries[1], "before_bootstrap cassandra cluster=0");
        assert!(journal.position("create_nodes").unwrap() > 1);
        assert!(
            journal.position("after_bootstrap zk cluster=3").unwrap()
                > journal.position("create_nodes").unwrap()
        );
    }

    #[tokio::test]
    async fn test_unknown_role_fails_before_remote_calls() {
        let journal = Journal::default();
        let provider = MemoryProvider::with_journal(journal.clone());
        let registry =
            HandlerRegistry::new().with_handler(Recorder::new("cassandra", &journal));
        let spec = spec();

        let err = ClusterAction::new(&registry, &provider, &spec).err().unwrap();
        assert!(matches!(err, ClusterError::UnknownRole(ref r) if r == "zk"));

        let lenient = ClusterAction::lenient(&registry, &provider, &spec);
        for stage in [ClusterActionStage::Bootstrap, ClusterActionStage::Configure] {
            let err = lenient.execute(stage, Some(Cluster::empty())).await.unwrap_err();
            assert!(matches!(err, ClusterError::UnknownRole(ref r) if r == "zk"));
        }
        assert!(journal.entries().is_empty());
    }

    #[tokio::test]
    async fn test_hook_failure_stops_remaining_roles() {
        let journal = Journal::default();
        let provider = MemoryProvider::with_journal(journal.clone());
        let registry = HandlerRegistry::new()
            .with_handler(Recorder::new("zk", &journal).failing_in(Hook::BeforeBootstrap))
            .with_handler(Recorder::new("cassandra", &journal));
        let spec = spec();
        let action = ClusterAction::new(&registry, &provider, &spec).unwrap();

        let err = action
            .execute(ClusterActionStage::Bootstrap, None)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), crate::error::ErrorKind::Handler);
        assert_eq!(journal.count("before_bootstrap cassandra"), 0);
        assert_eq!(journal.count("create_nodes"), 0);
    }

    #[tokio::test]
    async fn test_short_node_count_is_provisioning_error() {
        struct Stingy(MemoryProvider);

        #[async_trait]
        impl ProvisioningProvider for Stingy {
            fn name(&self) -> &str {
                "stingy"
            }
            async fn create_nodes(
                &self,
                spec: &ClusterSpec,
                template: &NodeTemplate,
            ) -> Result<Vec<NodeMetadata>> {
                let mut nodes = self.0.create_nodes(spec, template).await?;
                nodes.truncate(template.count - 1);
                Ok(nodes)
            }
            async fn list_nodes(
                &self,
                predicate: &crate::provider::NodePredicate,
            ) -> Result<Vec<NodeMetadata>> {
                self.0.list_nodes(predicate).await
            }
            async fn run_script(
                &self,
                spec: &ClusterSpec,
                instance: &Instance,
                script: &str,
            ) -> Result<()> {
                self.0.run_script(spec, instance, script).await
            }
            async fn open_port(
                &self,
                spec: &ClusterSpec,
                instance: &Instance,
                rule: &crate::provider::IngressRule,
            ) -> Result<()> {
                self.0.open_port(spec, instance, rule).await
            }
            async fn destroy_nodes(
                &self,
                predicate: &crate::provider::NodePredicate,
            ) -> Result<Vec<NodeMetadata>> {
                self.0.destroy_nodes(predicate).await
            }
        }

        let journal = Journal::default();
        let provider = Stingy(MemoryProvider::with_journal(journal.clone()));
        let registry = registry(&journal);
        let spec = spec();
        let action = ClusterAction::new(&registry, &provider, &spec).unwrap();

        let err = action
            .execute(ClusterActionStage::Bootstrap, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Provisioning);
        assert_eq!(journal.count("after_bootstrap"), 0);
    }

    #[tokio::test]
    async fn test_configure_runs_scripts_per_role() {
        let journal = Journal::default();
        let provider = MemoryProvider::with_journal(journal.clone());
        let registry = registry(&journal);
        let spec = spec();
        let action = ClusterAction::new(&registry, &provider, &spec).unwrap();

        let cluster = action
            .execute(ClusterActionStage::Bootstrap, None)
            .await
            .unwrap();
        let configured = action
            .execute(ClusterActionStage::Configure, Some(cluster.clone()))
            .await
            .unwrap();
        assert_eq!(configured, cluster);

        let scripts = provider.scripts();
        assert_eq!(scripts.len(), 3);
        for (id, script) in &scripts {
            let instance = cluster.get(id).unwrap();
            if instance.has_role("zk") {
                assert_eq!(script, "runurl http://example.org/zk/configure\n");
            } else {
                assert_eq!(script, "runurl http://example.org/cassandra/configure\n");
            }
        }

        let last_before = journal.position("before_configure cassandra").unwrap();
        let first_script = journal.position("run_script").unwrap();
        let first_after = journal.position("after_configure").unwrap();
        assert!(journal.position("before_configure zk").unwrap() < last_before);
        assert!(last_before < first_script);
        assert!(journal.position("run_script").unwrap() < first_after);
    }

    #[tokio::test]
    async fn test_multi_role_instance_gets_one_script() {
        let journal = Journal::default();
        let provider = MemoryProvider::with_journal(journal.clone());
        let registry = registry(&journal);
        let spec = ClusterSpec::builder()
            .service_name("svc")
            .cluster_name("analytics")
            .provider("memory")
            .run_url_base("http://example.org")
            .instance_template(InstanceTemplate::new(1, ["zk", "cassandra"]).unwrap())
            .build()
            .unwrap();
        let action = ClusterAction::new(&registry, &provider, &spec).unwrap();

        let cluster = action
            .execute(ClusterActionStage::Bootstrap, None)
            .await
            .unwrap();
        assert_eq!(
            provider.templates()[0]
                .statements
                .iter()
                .map(|s| s.path())
                .collect::<Vec<_>>(),
            vec!["zk/install", "cassandra/install"]
        );

        action
            .execute(ClusterActionStage::Configure, Some(cluster))
            .await
            .unwrap();
        let scripts = provider.scripts();
        assert_eq!(scripts.len(), 1);
        assert_eq!(
            scripts[0].1,
            "runurl http://example.org/zk/configure\nrunurl http://example.org/cassandra/configure\n"
        );
    }

    #[tokio::test]
    async fn test_configure_requires_cluster() {
        let journal = Journal::default();
        let provider = MemoryProvider::with_journal(journal.clone());
        let registry = registry(&journal);
        let spec = spec();
        let action = ClusterAction::new(&registry, &provider, &spec).unwrap();

        let err = action
            .execute(ClusterActionStage::Configure, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ClusterError::MissingCluster(_)));
        assert!(journal.entries().is_empty());
    }

    #[tokio::test]
    async fn test_configure_requires_private_addresses() {
        let journal = Journal::default();
        let provider = MemoryProvider::with_journal(journal.clone());
        let registry = registry(&journal);
        let spec = spec();
        let action = ClusterAction::new(&registry, &provider, &spec).unwrap();
        let cluster = Cluster::new(vec![Instance::new("bare", ["cassandra"])]);

        let err = action
            .execute(ClusterActionStage::Configure, Some(cluster))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("bare"));
        assert_eq!(journal.count("before_configure"), 0);
    }

    #[tokio::test]
    async fn test_script_failure_aborts_configure() {
        let journal = Journal::default();
        let provider = MemoryProvider::with_journal(journal.clone());
        let registry = registry(&journal);
        let spec = spec();
        let action = ClusterAction::new(&registry, &provider, &spec).unwrap();
        let cluster = action
            .execute(ClusterActionStage::Bootstrap, None)
            .await
            .unwrap();

        provider.fail_on(FailOn::RunScript);
        let err = action
            .execute(ClusterActionStage::Configure, Some(cluster))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Provisioning);
        assert_eq!(journal.count("after_configure"), 0);
    }

    #[tokio::test]
    async fn test_destroy_runs_hooks_before_destroy_call() {
        let journal = Journal::default();
        let provider = MemoryProvider::with_journal(journal.clone())
            .with_node(
                NodeMetadata::new("other", NodeState::Running)
                    .with_group("web")
                    .with_role("cassandra"),
            );
        let registry = registry(&journal);
        let spec = spec();
        let action = ClusterAction::new(&registry, &provider, &spec).unwrap();
        action
            .execute(ClusterActionStage::Bootstrap, None)
            .await
            .unwrap();

        let result = action
            .execute(ClusterActionStage::Destroy, None)
            .await
            .unwrap();
        assert!(result.is_empty());

        assert_eq!(journal.count("before_destroy zk"), 1);
        assert_eq!(journal.count("before_destroy cassandra cluster=3"), 1);
        assert_eq!(journal.count("destroy_nodes"), 1);
        let destroy_call = journal.position("destroy_nodes").unwrap();
        assert!(journal.position("before_destroy cassandra").unwrap() < destroy_call);
        assert!(journal.position("after_destroy zk").unwrap() > destroy_call);

        let remaining = provider.nodes();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, "other");
    }

    #[tokio::test]
    async fn test_destroy_skips_roles_without_handler() {
        let journal = Journal::default();
        let provider = MemoryProvider::with_journal(journal.clone());
        let registry = HandlerRegistry::new().with_handler(Recorder::new("cassandra", &journal));
        let spec = spec();
        let action = ClusterAction::lenient(&registry, &provider, &spec);

        action
            .execute(ClusterActionStage::Destroy, Some(Cluster::empty()))
            .await
            .unwrap();
        assert_eq!(journal.count("before_destroy cassandra"), 1);
        assert_eq!(journal.count("before_destroy zk"), 0);
        assert_eq!(journal.count("destroy_nodes"), 1);
    }

    #[tokio::test]
    async fn test_before_destroy_failure_keeps_nodes() {
        let journal = Journal::default();
        let provider = MemoryProvider::with_journal(journal.clone());
        let registry = HandlerRegistry::new()
            .with_handler(Recorder::new("zk", &journal).failing_in(Hook::BeforeDestroy))
            .with_handler(Recorder::new("cassandra", &journal));
        let spec = spec();
        let action = ClusterAction::new(&registry, &provider, &spec).unwrap();
        action
            .execute(ClusterActionStage::Bootstrap, None)
            .await
            .unwrap();

        let err = action
            .execute(ClusterActionStage::Destroy, None)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), crate::error::ErrorKind::Handler);
        assert_eq!(journal.count("before_destroy zk"), 1);
        assert_eq!(journal.count("before_destroy cassandra"), 0);
        assert_eq!(journal.count("destroy_nodes"), 0);
        assert_eq!(journal.count("after_destroy"), 0);
        assert_eq!(provider.nodes().len(), 3);
    }

    #[tokio::test]
    async fn test_configure_hook_failure_stops_remaining_roles() {
        let journal = Journal::default();
        let provider = MemoryProvider::with_journal(journal.clone());
        let registry = HandlerRegistry::new()
            .with_handler(
                Recorder::new("zk", &journal)
                    .configures("zk/configure")
                    .failing_in(Hook::BeforeConfigure),
            )
            .with_handler(Recorder::new("cassandra", &journal).configures("cassandra/configure"));
        let spec = spec();
        let action = ClusterAction::new(&registry, &provider, &spec).unwrap();
        let cluster = action
            .execute(ClusterActionStage::Bootstrap, None)
            .await
            .unwrap();

        let err = action
            .execute(ClusterActionStage::Configure, Some(cluster))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), crate::error::ErrorKind::Handler);
        assert_eq!(journal.count("before_configure zk"), 1);
        assert_eq!(journal.count("before_configure cassandra"), 0);
        assert_eq!(journal.count("run_script"), 0);
        assert_eq!(journal.count("after_configure"), 0);
    }

    #[test]
    fn test_stage_hooks() {
        assert_eq!(
            ClusterActionStage::Configure.hooks(),
            (Hook::BeforeConfigure, Hook::AfterConfigure)
        );
        assert_eq!(Hook::AfterDestroy.stage(), ClusterActionStage::Destroy);
        assert_eq!(ClusterActionStage::Bootstrap.to_string(), "bootstrap");
    }
}
