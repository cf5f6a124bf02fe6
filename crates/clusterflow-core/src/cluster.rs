//! Cluster and instance value types

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::net::IpAddr;

/// Lifecycle state of a provider node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    Pending,
    Running,
    Suspended,
    Terminated,
    Error,
    Unrecognized,
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeState::Pending => write!(f, "PENDING"),
            NodeState::Running => write!(f, "RUNNING"),
            NodeState::Suspended => write!(f, "SUSPENDED"),
            NodeState::Terminated => write!(f, "TERMINATED"),
            NodeState::Error => write!(f, "ERROR"),
            NodeState::Unrecognized => write!(f, "UNRECOGNIZED"),
        }
    }
}

/// Node as reported by a provisioning provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMetadata {
    /// Provider-assigned node ID
    pub id: String,

    /// Group tag; nodes of one cluster share the cluster name
    pub group: Option<String>,

    /// Roles the node was created for
    #[serde(default)]
    pub roles: BTreeSet<String>,

    pub image_id: Option<String>,

    pub location_id: Option<String>,

    #[serde(default)]
    pub public_addresses: Vec<String>,

    #[serde(default)]
    pub private_addresses: Vec<String>,

    pub state: NodeState,
}

impl NodeMetadata {
    pub fn new(id: impl Into<String>, state: NodeState) -> Self {
        Self {
            id: id.into(),
            group: None,
            roles: BTreeSet::new(),
            image_id: None,
            location_id: None,
            public_addresses: Vec::new(),
            private_addresses: Vec::new(),
            state,
        }
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    pub fn with_public_address(mut self, address: impl Into<String>) -> Self {
        self.public_addresses.push(address.into());
        self
    }

    pub fn with_private_address(mut self, address: impl Into<String>) -> Self {
        self.private_addresses.push(address.into());
        self
    }

    pub fn first_public_address(&self) -> Option<&str> {
        self.public_addresses.first().map(String::as_str)
    }

    pub fn first_private_address(&self) -> Option<&str> {
        self.private_addresses.first().map(String::as_str)
    }

    pub fn is_running(&self) -> bool {
        self.state == NodeState::Running
    }
}

/// One provisioned node participating in a cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    id: String,
    roles: BTreeSet<String>,
    public_address: Option<IpAddr>,
    private_address: Option<IpAddr>,
}

impl Instance {
    pub fn new<I, S>(id: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            roles: roles.into_iter().map(Into::into).collect(),
            public_address: None,
            private_address: None,
        }
    }

    /// Build an instance from provider metadata; unparsable addresses are skipped
    pub fn from_node(node: &NodeMetadata) -> Self {
        Self {
            id: node.id.clone(),
            roles: node.roles.clone(),
            public_address: first_ip(&node.public_addresses),
            private_address: first_ip(&node.private_addresses),
        }
    }

    pub fn with_public_address(mut self, address: IpAddr) -> Self {
        self.public_address = Some(address);
        self
    }

    pub fn with_private_address(mut self, address: IpAddr) -> Self {
        self.private_address = Some(address);
        self
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn roles(&self) -> &BTreeSet<String> {
        &self.roles
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    pub fn public_address(&self) -> Option<IpAddr> {
        self.public_address
    }

    pub fn private_address(&self) -> Option<IpAddr> {
        self.private_address
    }
}

fn first_ip(addresses: &[String]) -> Option<IpAddr> {
    addresses.iter().find_map(|a| a.parse().ok())
}

/// The instances making up a cluster, in provider iteration order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    instances: Vec<Instance>,
}

impl Cluster {
    /// Create a cluster; later duplicates of an instance ID are dropped
    pub fn new(instances: impl IntoIterator<Item = Instance>) -> Self {
        let mut seen = HashSet::new();
        let instances = instances
            .into_iter()
            .filter(|i| seen.insert(i.id.clone()))
            .collect();
        Self { instances }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    /// Instances carrying `role`, keeping cluster order
    pub fn instances_with_role(&self, role: &str) -> Vec<&Instance> {
        self.instances.iter().filter(|i| i.has_role(role)).collect()
    }

    pub fn get(&self, id: &str) -> Option<&Instance> {
        self.instances.iter().find(|i| i.id == id)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// New cluster with `more` appended after the existing instances
    pub fn extended(&self, more: impl IntoIterator<Item = Instance>) -> Self {
        Self::new(self.instances.iter().cloned().chain(more))
    }
}
