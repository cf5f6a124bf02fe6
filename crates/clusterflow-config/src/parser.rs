//! KDL cluster spec parsing

use crate::error::{ConfigError, Result};
use clusterflow_core::{ClusterSpec, ClusterSpecBuilder, InstanceTemplate, parse_instance_templates};
use kdl::{KdlDocument, KdlNode, KdlValue};

/// Command-line values that take precedence over the spec file
#[derive(Debug, Clone, Default)]
pub struct SpecOverrides {
    pub service_name: Option<String>,
    pub cluster_name: Option<String>,
    pub provider: Option<String>,
    pub identity: Option<String>,
    pub credential: Option<String>,
    /// Textual form, e.g. `"3 cassandra,1 cassandra+jmx"`
    pub instance_templates: Option<String>,
    pub run_url_base: Option<String>,
}

impl SpecOverrides {
    fn apply(&self, mut builder: ClusterSpecBuilder) -> Result<ClusterSpecBuilder> {
        if let Some(v) = &self.service_name {
            builder = builder.service_name(v);
        }
        if let Some(v) = &self.cluster_name {
            builder = builder.cluster_name(v);
        }
        if let Some(v) = &self.provider {
            builder = builder.provider(v);
        }
        if let Some(v) = &self.identity {
            builder = builder.identity(v);
        }
        if let Some(v) = &self.credential {
            builder = builder.credential(v);
        }
        if let Some(v) = &self.run_url_base {
            builder = builder.run_url_base(v);
        }
        if let Some(v) = &self.instance_templates {
            builder = builder.instance_templates(parse_instance_templates(v)?);
        }
        Ok(builder)
    }
}

/// Build a spec from overrides alone, without a spec file
pub fn spec_from_overrides(overrides: &SpecOverrides) -> Result<ClusterSpec> {
    Ok(overrides.apply(ClusterSpec::builder())?.build()?)
}

/// Parse a KDL document and pick the cluster to operate on
///
/// With several `cluster` nodes, `overrides.cluster_name` selects one. A single
/// `cluster` node is used as is.
pub fn parse_spec_str(content: &str, overrides: &SpecOverrides) -> Result<ClusterSpec> {
    let doc: KdlDocument = content.parse()?;

    let clusters: Vec<&KdlNode> = doc
        .nodes()
        .iter()
        .filter(|n| n.name().value() == "cluster")
        .collect();

    let node = match (&overrides.cluster_name, clusters.as_slice()) {
        (_, []) => {
            return Err(ConfigError::InvalidConfig(
                "no cluster node in spec file".to_string(),
            ));
        }
        (None, [only]) => *only,
        (None, _) => {
            return Err(ConfigError::InvalidConfig(
                "spec file defines several clusters; pass a cluster name".to_string(),
            ));
        }
        (Some(name), _) => clusters
            .iter()
            .copied()
            .find(|n| first_string(n) == Some(name.as_str()))
            .ok_or_else(|| ConfigError::ClusterNotFound(name.clone()))?,
    };

    let builder = parse_cluster(node)?;
    Ok(overrides.apply(builder)?.build()?)
}

fn parse_cluster(node: &KdlNode) -> Result<ClusterSpecBuilder> {
    let name = first_string(node)
        .ok_or_else(|| ConfigError::InvalidConfig("cluster requires a name".to_string()))?;
    tracing::debug!("Parsing cluster {}", name);

    let mut builder = ClusterSpec::builder().cluster_name(name);

    let Some(children) = node.children() else {
        return Ok(builder);
    };

    for child in children.nodes() {
        match child.name().value() {
            "service" => {
                builder = builder.service_name(required_string(child)?);
            }
            "provider" => {
                builder = builder.provider(required_string(child)?);
                if let Some(settings) = child.children() {
                    for setting in settings.nodes() {
                        match setting.name().value() {
                            "identity" => builder = builder.identity(required_string(setting)?),
                            "credential" => {
                                builder = builder.credential(required_string(setting)?)
                            }
                            other => {
                                return Err(ConfigError::InvalidConfig(format!(
                                    "unknown provider setting '{}'",
                                    other
                                )));
                            }
                        }
                    }
                }
            }
            "run-url-base" => {
                builder = builder.run_url_base(required_string(child)?);
            }
            "instance" => {
                builder = builder.instance_template(parse_instance(child)?);
            }
            "config" => {
                if let Some(entries) = child.children() {
                    for entry in entries.nodes() {
                        let key = entry.name().value();
                        let value = entry
                            .entries()
                            .first()
                            .and_then(|e| value_to_string(e.value()))
                            .ok_or_else(|| {
                                ConfigError::InvalidConfig(format!(
                                    "config key '{}' requires a value",
                                    key
                                ))
                            })?;
                        builder = builder.config(key, value);
                    }
                }
            }
            other => {
                return Err(ConfigError::InvalidConfig(format!(
                    "unknown cluster setting '{}'",
                    other
                )));
            }
        }
    }

    Ok(builder)
}

/// `instance "role" ["role2" ...] count=N`
fn parse_instance(node: &KdlNode) -> Result<InstanceTemplate> {
    let mut roles = Vec::new();
    let mut count = 1usize;

    for entry in node.entries() {
        match entry.name().map(|n| n.value()) {
            None => {
                let role = entry.value().as_string().ok_or_else(|| {
                    ConfigError::InvalidConfig("instance roles must be strings".to_string())
                })?;
                roles.push(role.to_string());
            }
            Some("count") => {
                count = entry
                    .value()
                    .as_integer()
                    .and_then(|c| usize::try_from(c).ok())
                    .ok_or_else(|| {
                        ConfigError::InvalidConfig(
                            "instance count must be a non-negative integer".to_string(),
                        )
                    })?;
            }
            Some(other) => {
                return Err(ConfigError::InvalidConfig(format!(
                    "unknown instance property '{}'",
                    other
                )));
            }
        }
    }

    Ok(InstanceTemplate::new(count, roles)?)
}

fn first_string(node: &KdlNode) -> Option<&str> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
}

fn required_string(node: &KdlNode) -> Result<String> {
    first_string(node).map(|s| s.to_string()).ok_or_else(|| {
        ConfigError::InvalidConfig(format!("'{}' requires a string value", node.name().value()))
    })
}

fn value_to_string(value: &KdlValue) -> Option<String> {
    if let Some(s) = value.as_string() {
        return Some(s.to_string());
    }
    if let Some(i) = value.as_integer() {
        return Some(i.to_string());
    }
    value.as_bool().map(|b| b.to_string())
}
