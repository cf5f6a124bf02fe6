//! In-memory provisioning provider for tests
//!
//! Every call is appended to a shared [`Journal`] so tests can assert on the
//! exact interleaving of provider calls and handler hooks.

use crate::cluster::{Instance, NodeMetadata, NodeState};
use crate::error::{ClusterError, Result};
use crate::provider::{IngressRule, NodePredicate, NodeTemplate, ProvisioningProvider};
use crate::spec::ClusterSpec;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

/// Ordered log shared between a provider and test handlers
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn record(&self, entry: impl Into<String>) {
        lock(&self.0).push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        lock(&self.0).clone()
    }

    /// Position of the first entry starting with `prefix`
    pub fn position(&self, prefix: &str) -> Option<usize> {
        lock(&self.0).iter().position(|e| e.starts_with(prefix))
    }

    pub fn count(&self, prefix: &str) -> usize {
        lock(&self.0).iter().filter(|e| e.starts_with(prefix)).count()
    }
}

/// Provider operation a [`MemoryProvider`] can be told to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOn {
    CreateNodes,
    ListNodes,
    RunScript,
    OpenPort,
    DestroyNodes,
}

#[derive(Debug, Default)]
struct Inner {
    nodes: Vec<NodeMetadata>,
    next_id: usize,
    rules: BTreeSet<(String, IngressRule)>,
    scripts: Vec<(String, String)>,
    templates: Vec<NodeTemplate>,
    fail_on: Option<FailOn>,
}

/// Provider that keeps its nodes in memory
#[derive(Debug, Default)]
pub struct MemoryProvider {
    inner: Mutex<Inner>,
    journal: Journal,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_journal(journal: Journal) -> Self {
        Self {
            inner: Mutex::default(),
            journal,
        }
    }

    /// Seed a pre-existing node
    pub fn with_node(self, node: NodeMetadata) -> Self {
        lock(&self.inner).nodes.push(node);
        self
    }

    pub fn fail_on(&self, op: FailOn) {
        lock(&self.inner).fail_on = Some(op);
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn nodes(&self) -> Vec<NodeMetadata> {
        lock(&self.inner).nodes.clone()
    }

    /// Open rules as (instance id, rule) pairs
    pub fn rules(&self) -> Vec<(String, IngressRule)> {
        lock(&self.inner).rules.iter().cloned().collect()
    }

    /// Scripts run so far as (instance id, script) pairs
    pub fn scripts(&self) -> Vec<(String, String)> {
        lock(&self.inner).scripts.clone()
    }

    /// Templates passed to `create_nodes`, in call order
    pub fn templates(&self) -> Vec<NodeTemplate> {
        lock(&self.inner).templates.clone()
    }

    fn check(&self, op: FailOn) -> Result<()> {
        if lock(&self.inner).fail_on == Some(op) {
            return Err(ClusterError::Provisioning(format!("injected failure: {:?}", op)));
        }
        Ok(())
    }
}

#[async_trait]
impl ProvisioningProvider for MemoryProvider {
    fn name(&self) -> &str {
        "memory"
    }

    async fn create_nodes(
        &self,
        spec: &ClusterSpec,
        template: &NodeTemplate,
    ) -> Result<Vec<NodeMetadata>> {
        self.journal.record(format!(
            "create_nodes {} x{}",
            template.roles.join("+"),
            template.count
        ));
        self.check(FailOn::CreateNodes)?;

        let mut inner = lock(&self.inner);
        inner.templates.push(template.clone());
        let mut created = Vec::with_capacity(template.count);
        for _ in 0..template.count {
            inner.next_id += 1;
            let n = inner.next_id;
            let mut node = NodeMetadata::new(format!("node-{}", n), NodeState::Running)
                .with_group(spec.cluster_name())
                .with_public_address(format!("203.0.113.{}", n))
                .with_private_address(format!("10.0.0.{}", n));
            node.roles = template.roles.iter().cloned().collect();
            node.image_id = Some("ubuntu".to_string());
            node.location_id = Some("memory-1".to_string());
            inner.nodes.push(node.clone());
            created.push(node);
        }
        Ok(created)
    }

    async fn list_nodes(&self, predicate: &NodePredicate) -> Result<Vec<NodeMetadata>> {
        self.journal.record("list_nodes");
        self.check(FailOn::ListNodes)?;
        Ok(lock(&self.inner)
            .nodes
            .iter()
            .filter(|n| predicate(n))
            .cloned()
            .collect())
    }

    async fn run_script(
        &self,
        _spec: &ClusterSpec,
        instance: &Instance,
        script: &str,
    ) -> Result<()> {
        self.journal.record(format!("run_script {}", instance.id()));
        self.check(FailOn::RunScript)?;
        lock(&self.inner)
            .scripts
            .push((instance.id().to_string(), script.to_string()));
        Ok(())
    }

    async fn open_port(
        &self,
        _spec: &ClusterSpec,
        instance: &Instance,
        rule: &IngressRule,
    ) -> Result<()> {
        self.journal
            .record(format!("open_port {} {}", instance.id(), rule.port));
        self.check(FailOn::OpenPort)?;
        lock(&self.inner)
            .rules
            .insert((instance.id().to_string(), rule.clone()));
        Ok(())
    }

    async fn destroy_nodes(&self, predicate: &NodePredicate) -> Result<Vec<NodeMetadata>> {
        self.check(FailOn::DestroyNodes)?;
        let mut inner = lock(&self.inner);
        let (destroyed, kept): (Vec<_>, Vec<_>) =
            inner.nodes.drain(..).partition(|n| predicate(n));
        inner.nodes = kept;
        let ids: Vec<_> = destroyed.iter().map(|n| n.id.as_str()).collect();
        self.journal.record(format!("destroy_nodes {}", ids.join(",")));
        Ok(destroyed)
    }
}
