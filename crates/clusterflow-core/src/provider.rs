//! Provisioning provider trait definition

use crate::cluster::{Instance, NodeMetadata};
use crate::error::Result;
use crate::spec::ClusterSpec;
use crate::statement::{OsFamily, ScriptStatement};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Node filter passed to list and destroy calls
pub type NodePredicate = dyn Fn(&NodeMetadata) -> bool + Send + Sync;

/// Provisioning provider abstraction trait
///
/// Backends (Sakura Cloud, test doubles, ...) implement this trait so the
/// cluster pipeline never has to know which compute service it talks to.
/// Retries and timeouts are the provider's business.
#[async_trait]
pub trait ProvisioningProvider: Send + Sync {
    /// Returns the provider identifier (e.g., "sakura-cloud")
    fn name(&self) -> &str;

    /// Platform that scripts for this provider are rendered for
    fn os_family(&self) -> OsFamily {
        OsFamily::Unix
    }

    /// Create `template.count` nodes in the spec's cluster group
    ///
    /// The template statements are attached as node startup work.
    async fn create_nodes(
        &self,
        spec: &ClusterSpec,
        template: &NodeTemplate,
    ) -> Result<Vec<NodeMetadata>>;

    /// List all nodes matching `predicate`
    async fn list_nodes(&self, predicate: &NodePredicate) -> Result<Vec<NodeMetadata>>;

    /// Run a rendered script on one instance
    async fn run_script(&self, spec: &ClusterSpec, instance: &Instance, script: &str)
    -> Result<()>;

    /// Open a port on one instance; must succeed if the rule already exists
    async fn open_port(
        &self,
        spec: &ClusterSpec,
        instance: &Instance,
        rule: &IngressRule,
    ) -> Result<()>;

    /// Destroy all nodes matching `predicate`, returning what was destroyed
    async fn destroy_nodes(&self, predicate: &NodePredicate) -> Result<Vec<NodeMetadata>>;
}

/// Nodes to create for one instance template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeTemplate {
    /// Roles every created node serves
    pub roles: Vec<String>,

    /// Number of nodes to create
    pub count: usize,

    /// Install statements run at node startup
    pub statements: Vec<ScriptStatement>,
}

impl NodeTemplate {
    pub fn new(roles: Vec<String>, count: usize) -> Self {
        Self {
            roles,
            count,
            statements: Vec::new(),
        }
    }

    pub fn with_statements(mut self, statements: Vec<ScriptStatement>) -> Self {
        self.statements = statements;
        self
    }
}

/// Transport protocol of an ingress rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
        }
    }
}

/// Inbound access to one port, scoped to a cluster group
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IngressRule {
    pub group: String,
    pub port: u16,
    pub protocol: Protocol,
}

impl IngressRule {
    pub fn tcp(group: impl Into<String>, port: u16) -> Self {
        Self {
            group: group.into(),
            port,
            protocol: Protocol::Tcp,
        }
    }
}

impl fmt::Display for IngressRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} ({})", self.port, self.protocol, self.group)
    }
}

/// Nodes tagged with `group`, in any state
pub fn in_group(group: &str) -> impl Fn(&NodeMetadata) -> bool + Send + Sync + use<> {
    let group = group.to_string();
    move |node| node.group.as_deref() == Some(group.as_str())
}

/// Running nodes tagged with `group`
pub fn running_in_group(group: &str) -> impl Fn(&NodeMetadata) -> bool + Send + Sync + use<> {
    let in_group = in_group(group);
    move |node| in_group(node) && node.is_running()
}
