//! Cluster specification
//!
//! A [`ClusterSpec`] is the validated, immutable description of the desired
//! cluster. It can only be obtained through [`ClusterSpecBuilder::build`], so a
//! value of this type has always passed validation.

use crate::error::{ClusterError, Result};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Install catalog used when the spec does not name one
pub const DEFAULT_RUN_URL_BASE: &str = "http://clusterflow.s3.amazonaws.com/scripts/";

/// A group of identical instances serving one or more roles
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceTemplate {
    roles: Vec<String>,
    count: usize,
}

impl InstanceTemplate {
    pub fn new<I, S>(count: usize, roles: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let roles: Vec<String> = roles.into_iter().map(Into::into).collect();
        if roles.is_empty() {
            return Err(ClusterError::InvalidSpec(
                "instance template requires at least one role".to_string(),
            ));
        }
        for role in &roles {
            validate_role_name(role)?;
        }
        if count == 0 {
            return Err(ClusterError::InvalidSpec(format!(
                "instance template '{}' requests zero instances",
                roles.join("+")
            )));
        }
        Ok(Self { roles, count })
    }

    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

impl fmt::Display for InstanceTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.count, self.roles.join("+"))
    }
}

fn validate_role_name(role: &str) -> Result<()> {
    if role.is_empty() {
        return Err(ClusterError::InvalidSpec("role name is empty".to_string()));
    }
    if role
        .chars()
        .any(|c| c.is_whitespace() || c == '+' || c == ',')
    {
        return Err(ClusterError::InvalidSpec(format!(
            "role name '{}' contains a reserved character",
            role
        )));
    }
    Ok(())
}

/// Parse the textual template form, e.g. `"3 cassandra, 1 cassandra+jmx"`
pub fn parse_instance_templates(input: &str) -> Result<Vec<InstanceTemplate>> {
    let mut templates = Vec::new();
    for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let mut fields = part.split_whitespace();
        let count = fields
            .next()
            .and_then(|c| c.parse::<usize>().ok())
            .ok_or_else(|| {
                ClusterError::InvalidSpec(format!(
                    "instance template '{}' must start with a count",
                    part
                ))
            })?;
        let roles = fields.next().ok_or_else(|| {
            ClusterError::InvalidSpec(format!("instance template '{}' has no roles", part))
        })?;
        if fields.next().is_some() {
            return Err(ClusterError::InvalidSpec(format!(
                "instance template '{}' has trailing fields",
                part
            )));
        }
        templates.push(InstanceTemplate::new(count, roles.split('+'))?);
    }
    Ok(templates)
}

/// Immutable, validated desired state of a cluster
#[derive(Clone)]
pub struct ClusterSpec {
    service_name: String,
    cluster_name: String,
    provider: String,
    identity: Option<String>,
    credential: Option<String>,
    run_url_base: String,
    instance_templates: Vec<InstanceTemplate>,
    config: BTreeMap<String, String>,
}

impl ClusterSpec {
    pub fn builder() -> ClusterSpecBuilder {
        ClusterSpecBuilder::default()
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    /// Provisioning provider identifier (e.g. "sakura-cloud")
    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }

    pub fn run_url_base(&self) -> &str {
        &self.run_url_base
    }

    pub fn instance_templates(&self) -> &[InstanceTemplate] {
        &self.instance_templates
    }

    /// Distinct roles in declaration order
    pub fn roles(&self) -> Vec<&str> {
        self.instance_templates
            .iter()
            .flat_map(|t| t.roles.iter().map(String::as_str))
            .collect()
    }

    /// Desired instance count per role, in declaration order
    pub fn role_counts(&self) -> Vec<(&str, usize)> {
        self.instance_templates
            .iter()
            .flat_map(|t| t.roles.iter().map(move |r| (r.as_str(), t.count)))
            .collect()
    }

    pub fn get_config(&self, key: &str) -> Option<&str> {
        self.config.get(key).map(String::as_str)
    }

    pub fn config(&self) -> &BTreeMap<String, String> {
        &self.config
    }
}

impl fmt::Debug for ClusterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterSpec")
            .field("service_name", &self.service_name)
            .field("cluster_name", &self.cluster_name)
            .field("provider", &self.provider)
            .field("identity", &self.identity)
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .field("run_url_base", &self.run_url_base)
            .field("instance_templates", &self.instance_templates)
            .field("config", &self.config)
            .finish()
    }
}

/// Builder for [`ClusterSpec`]; all validation happens in [`build`](Self::build)
#[derive(Clone, Default)]
pub struct ClusterSpecBuilder {
    service_name: Option<String>,
    cluster_name: Option<String>,
    provider: Option<String>,
    identity: Option<String>,
    credential: Option<String>,
    run_url_base: Option<String>,
    instance_templates: Vec<InstanceTemplate>,
    config: BTreeMap<String, String>,
}

impl fmt::Debug for ClusterSpecBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterSpecBuilder")
            .field("service_name", &self.service_name)
            .field("cluster_name", &self.cluster_name)
            .field("provider", &self.provider)
            .field("identity", &self.identity)
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .field("run_url_base", &self.run_url_base)
            .field("instance_templates", &self.instance_templates)
            .field("config", &self.config)
            .finish()
    }
}

impl ClusterSpecBuilder {
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    pub fn cluster_name(mut self, name: impl Into<String>) -> Self {
        self.cluster_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    pub fn credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }

    pub fn run_url_base(mut self, base: impl Into<String>) -> Self {
        self.run_url_base = Some(base.into());
        self
    }

    pub fn instance_template(mut self, template: InstanceTemplate) -> Self {
        self.instance_templates.push(template);
        self
    }

    /// Replace all templates
    pub fn instance_templates(mut self, templates: Vec<InstanceTemplate>) -> Self {
        self.instance_templates = templates;
        self
    }

    pub fn config(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> Result<ClusterSpec> {
        let service_name = required(self.service_name, "service name")?;
        let cluster_name = required(self.cluster_name, "cluster name")?;
        let provider = required(self.provider, "provider")?;

        if self.instance_templates.is_empty() {
            return Err(ClusterError::InvalidSpec(
                "at least one instance template is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for role in self.instance_templates.iter().flat_map(|t| t.roles.iter()) {
            if !seen.insert(role.as_str()) {
                return Err(ClusterError::InvalidSpec(format!(
                    "role '{}' is declared by more than one instance template",
                    role
                )));
            }
        }

        let run_url_base = match self.run_url_base {
            Some(base) if !base.trim().is_empty() => base,
            _ => DEFAULT_RUN_URL_BASE.to_string(),
        };

        Ok(ClusterSpec {
            service_name,
            cluster_name,
            provider,
            identity: self.identity,
            credential: self.credential,
            run_url_base,
            instance_templates: self.instance_templates,
            config: self.config,
        })
    }
}

fn required(value: Option<String>, what: &str) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ClusterError::InvalidSpec(format!("{} is required", what))),
    }
}
