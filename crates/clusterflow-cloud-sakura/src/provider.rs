//! Sakura Cloud provisioning provider

use crate::error::{Result, SakuraError};
use crate::startup_scripts::{script_name, startup_script};
use crate::usacloud::{CreateServerConfig, Credentials, ServerInfo, SshKeyInfo, Usacloud};
use async_trait::async_trait;
use clusterflow_core::{
    ClusterSpec, IngressRule, Instance, NodeMetadata, NodePredicate, NodeState, NodeTemplate,
    ProvisioningProvider, render_script,
};
use futures_util::future::try_join_all;
use std::collections::BTreeSet;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::OnceCell;

pub const PROVIDER_NAME: &str = "sakura-cloud";

pub const GROUP_TAG: &str = "clusterflow-group=";
pub const ROLE_TAG: &str = "clusterflow-role=";

/// Parse plan string like "2core-4gb" to (core, memory_gb)
fn parse_plan(plan: &str) -> Option<(u32, u32)> {
    let (core, memory) = plan.split_once('-')?;
    let core = core.trim_end_matches("core").parse().ok()?;
    let memory = memory.trim_end_matches("gb").parse().ok()?;
    Some((core, memory))
}

/// Look up the IDs of the named SSH keys, keeping the requested order
fn resolve_key_ids(names: &[String], keys: &[SshKeyInfo]) -> Result<Vec<String>> {
    names
        .iter()
        .map(|name| {
            keys.iter()
                .find(|k| k.name == *name)
                .map(SshKeyInfo::id_str)
                .ok_or_else(|| SakuraError::SshKeyNotFound(name.clone()))
        })
        .collect()
}

/// Provider settings read from the spec's `sakura.*` config keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SakuraSettings {
    pub zone: String,
    pub core: u32,
    pub memory: u32,
    pub os_type: String,
    pub disk_size: u32,
    /// Names of SSH keys registered to the account
    pub ssh_keys: Vec<String>,
    pub ssh_user: String,
}

impl Default for SakuraSettings {
    fn default() -> Self {
        Self {
            zone: "tk1a".to_string(),
            core: 1,
            memory: 1,
            os_type: "ubuntu".to_string(),
            disk_size: 20,
            ssh_keys: Vec::new(),
            ssh_user: "ubuntu".to_string(),
        }
    }
}

impl SakuraSettings {
    pub fn from_spec(spec: &ClusterSpec) -> Result<Self> {
        let mut settings = Self::default();

        if let Some(zone) = spec.get_config("sakura.zone") {
            settings.zone = zone.to_string();
        }
        if let Some(plan) = spec.get_config("sakura.plan") {
            let (core, memory) = parse_plan(plan).ok_or_else(|| SakuraError::InvalidSetting {
                key: "sakura.plan".to_string(),
                value: plan.to_string(),
            })?;
            settings.core = core;
            settings.memory = memory;
        }
        if let Some(os_type) = spec.get_config("sakura.os-type") {
            settings.os_type = os_type.to_string();
        }
        if let Some(size) = spec.get_config("sakura.disk-size") {
            settings.disk_size = size.parse().map_err(|_| SakuraError::InvalidSetting {
                key: "sakura.disk-size".to_string(),
                value: size.to_string(),
            })?;
        }
        if let Some(keys) = spec.get_config("sakura.ssh-key") {
            settings.ssh_keys = keys
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(user) = spec.get_config("sakura.ssh-user") {
            settings.ssh_user = user.to_string();
        }

        Ok(settings)
    }
}

/// Sakura Cloud provider
///
/// Servers are managed through `usacloud`; scripts and firewall rules are
/// applied over `ssh` as [`SakuraSettings::ssh_user`].
pub struct SakuraCloudProvider {
    usacloud: Usacloud,
    settings: SakuraSettings,
    ssh_key_ids: OnceCell<Vec<String>>,
}

impl SakuraCloudProvider {
    pub fn new(settings: SakuraSettings) -> Self {
        Self {
            usacloud: Usacloud::new(&settings.zone),
            settings,
            ssh_key_ids: OnceCell::new(),
        }
    }

    /// Build a provider from the spec's settings and credentials
    ///
    /// Without identity and credential in the spec, usacloud falls back to its
    /// own environment or profile.
    pub fn from_spec(spec: &ClusterSpec) -> Result<Self> {
        let mut provider = Self::new(SakuraSettings::from_spec(spec)?);
        if let (Some(token), Some(secret)) = (spec.identity(), spec.credential()) {
            provider.usacloud = provider.usacloud.with_credentials(Credentials {
                token: token.to_string(),
                secret: secret.to_string(),
            });
        }
        Ok(provider)
    }

    pub fn settings(&self) -> &SakuraSettings {
        &self.settings
    }

    /// IDs of the configured SSH keys, looked up once per provider
    async fn ssh_key_ids(&self) -> Result<&[String]> {
        let ids = self
            .ssh_key_ids
            .get_or_try_init(|| async {
                if self.settings.ssh_keys.is_empty() {
                    return Ok(Vec::new());
                }
                let all_keys = self.usacloud.list_ssh_keys().await?;
                resolve_key_ids(&self.settings.ssh_keys, &all_keys)
            })
            .await?;
        Ok(ids.as_slice())
    }

    async fn list_servers(&self) -> Result<Vec<(ServerInfo, NodeMetadata)>> {
        let servers = self.usacloud.list_servers().await?;
        Ok(servers
            .into_iter()
            .map(|s| {
                let node = to_node_metadata(&s, self.usacloud.zone());
                (s, node)
            })
            .collect())
    }

    fn ssh_target(&self, instance: &Instance) -> Result<String> {
        let address = instance
            .public_address()
            .ok_or_else(|| SakuraError::NoPublicAddress(instance.id().to_string()))?;
        Ok(format!("{}@{}", self.settings.ssh_user, address))
    }

    /// Run `command` on the instance, feeding `stdin` to it when given
    async fn ssh(&self, instance: &Instance, command: &str, stdin: Option<&str>) -> Result<()> {
        let target = self.ssh_target(instance)?;
        let mut cmd = Command::new("ssh");
        cmd.args(ssh_args(&target, command));
        cmd.stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        tracing::debug!("Running on {}: {}", target, command);

        let mut child = cmd.spawn()?;
        if let Some(input) = stdin {
            if let Some(mut pipe) = child.stdin.take() {
                pipe.write_all(input.as_bytes()).await?;
            }
        }
        let output = child.wait_with_output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SakuraError::SshFailed {
                host: target,
                message: stderr.trim().to_string(),
            });
        }
        Ok(())
    }
}

fn ssh_args(target: &str, command: &str) -> Vec<String> {
    vec![
        "-o".to_string(),
        "StrictHostKeyChecking=no".to_string(),
        "-o".to_string(),
        "BatchMode=yes".to_string(),
        target.to_string(),
        command.to_string(),
    ]
}

/// Map usacloud's instance status to a node state
fn node_state(status: Option<&str>) -> NodeState {
    match status {
        Some("up") => NodeState::Running,
        Some("down") => NodeState::Suspended,
        Some("cleaning") => NodeState::Terminated,
        Some("migrating") | None => NodeState::Pending,
        Some(_) => NodeState::Unrecognized,
    }
}

fn server_tags(cluster: &str, roles: &[String]) -> Vec<String> {
    std::iter::once(format!("{}{}", GROUP_TAG, cluster))
        .chain(roles.iter().map(|r| format!("{}{}", ROLE_TAG, r)))
        .collect()
}

/// Convert a server into node metadata
///
/// Servers without a private switch use their shared address as the private one.
pub fn to_node_metadata(server: &ServerInfo, zone: &str) -> NodeMetadata {
    let mut node = NodeMetadata::new(
        server.id_str(),
        node_state(server.instance_status.as_deref()),
    );
    for tag in server.tags() {
        if let Some(group) = tag.strip_prefix(GROUP_TAG) {
            node = node.with_group(group);
        } else if let Some(role) = tag.strip_prefix(ROLE_TAG) {
            node = node.with_role(role);
        }
    }
    node.location_id = Some(zone.to_string());

    let public = server.ip_address();
    let private = server.user_ip_address().or_else(|| public.clone());
    if let Some(address) = public {
        node = node.with_public_address(address);
    }
    if let Some(address) = private {
        node = node.with_private_address(address);
    }
    node
}

#[async_trait]
impl ProvisioningProvider for SakuraCloudProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn create_nodes(
        &self,
        spec: &ClusterSpec,
        template: &NodeTemplate,
    ) -> clusterflow_core::Result<Vec<NodeMetadata>> {
        let cluster = spec.cluster_name();
        let tags = server_tags(cluster, &template.roles);
        // Resolved before any note or server is created
        let ssh_key_ids = self.ssh_key_ids().await?;

        let name = script_name(cluster, &template.roles);
        let body = render_script(&template.statements, self.os_family());
        let note = self
            .usacloud
            .create_note(&name, &startup_script(&name, &body), &tags[..1])
            .await?;
        tracing::info!("Created startup script {} ({})", name, note.id_str());

        let configs: Vec<CreateServerConfig> = (1..=template.count)
            .map(|i| CreateServerConfig {
                name: format!("{}-{}-{}", cluster, template.roles.join("-"), i),
                core: self.settings.core,
                memory: self.settings.memory,
                disk_size: self.settings.disk_size,
                os_type: self.settings.os_type.clone(),
                ssh_key_ids: ssh_key_ids.to_vec(),
                note_ids: vec![note.id_str()],
                tags: tags.clone(),
            })
            .collect();

        tracing::info!(
            "Creating {} server(s) for {} in {}",
            configs.len(),
            template.roles.join("+"),
            self.usacloud.zone()
        );
        let servers =
            try_join_all(configs.iter().map(|c| self.usacloud.create_server(c))).await?;

        Ok(servers
            .iter()
            .map(|s| to_node_metadata(s, self.usacloud.zone()))
            .collect())
    }

    async fn list_nodes(
        &self,
        predicate: &NodePredicate,
    ) -> clusterflow_core::Result<Vec<NodeMetadata>> {
        Ok(self
            .list_servers()
            .await?
            .into_iter()
            .map(|(_, node)| node)
            .filter(|n| predicate(n))
            .collect())
    }

    async fn run_script(
        &self,
        _spec: &ClusterSpec,
        instance: &Instance,
        script: &str,
    ) -> clusterflow_core::Result<()> {
        tracing::info!("Running configure script on {}", instance.id());
        self.ssh(instance, "sudo bash -s", Some(script)).await?;
        Ok(())
    }

    async fn open_port(
        &self,
        _spec: &ClusterSpec,
        instance: &Instance,
        rule: &IngressRule,
    ) -> clusterflow_core::Result<()> {
        tracing::debug!("Opening {} on {}", rule, instance.id());
        let command = format!("sudo ufw allow {}/{}", rule.port, rule.protocol);
        self.ssh(instance, &command, None).await?;
        Ok(())
    }

    async fn destroy_nodes(
        &self,
        predicate: &NodePredicate,
    ) -> clusterflow_core::Result<Vec<NodeMetadata>> {
        let targets: Vec<NodeMetadata> = self
            .list_servers()
            .await?
            .into_iter()
            .map(|(_, node)| node)
            .filter(|n| predicate(n))
            .collect();

        try_join_all(
            targets
                .iter()
                .map(|n| self.usacloud.delete_server(&n.id, true)),
        )
        .await?;
        tracing::info!("Deleted {} server(s)", targets.len());

        let groups: BTreeSet<String> = targets
            .iter()
            .filter_map(|n| n.group.as_ref())
            .map(|g| format!("{}{}", GROUP_TAG, g))
            .collect();
        if !groups.is_empty() {
            let notes = self.usacloud.list_notes().await?;
            let stale: Vec<_> = notes
                .iter()
                .filter(|n| n.tags().iter().any(|t| groups.contains(t)))
                .collect();
            try_join_all(stale.iter().map(|n| {
                let id = n.id_str();
                async move { self.usacloud.delete_note(&id).await }
            }))
            .await?;
        }

        Ok(targets)
    }
}
