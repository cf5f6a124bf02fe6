//! usacloud CLI wrapper
//!
//! Wraps the usacloud CLI commands for Sakura Cloud operations.

use crate::error::{Result, SakuraError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use tokio::process::Command;

pub const ACCESS_TOKEN_ENV: &str = "SAKURACLOUD_ACCESS_TOKEN";
pub const ACCESS_TOKEN_SECRET_ENV: &str = "SAKURACLOUD_ACCESS_TOKEN_SECRET";

/// API credentials passed to usacloud through its environment
#[derive(Clone)]
pub struct Credentials {
    pub token: String,
    pub secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &self.token)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// usacloud CLI wrapper
#[derive(Debug, Clone)]
pub struct Usacloud {
    zone: String,
    credentials: Option<Credentials>,
}

impl Usacloud {
    pub fn new(zone: impl Into<String>) -> Self {
        Self {
            zone: zone.into(),
            credentials: None,
        }
    }

    /// Use explicit credentials instead of usacloud's own profile
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn zone(&self) -> &str {
        &self.zone
    }

    /// Run a usacloud command and return stdout
    async fn run_command(&self, args: &[&str]) -> Result<String> {
        let mut cmd = Command::new("usacloud");
        cmd.arg("--zone").arg(&self.zone);
        cmd.args(args);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        if let Some(credentials) = &self.credentials {
            cmd.env(ACCESS_TOKEN_ENV, &credentials.token);
            cmd.env(ACCESS_TOKEN_SECRET_ENV, &credentials.secret);
        }

        tracing::debug!("Running: usacloud --zone {} {}", self.zone, args.join(" "));

        let output = cmd.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SakuraError::UsacloudNotFound
            } else {
                SakuraError::IoError(e)
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SakuraError::CommandFailed(stderr.trim().to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// List all servers in the zone
    pub async fn list_servers(&self) -> Result<Vec<ServerInfo>> {
        let output = self
            .run_command(&["server", "list", "--output-type", "json"])
            .await?;
        parse_list(&output)
    }

    /// Create a server and wait until it is up
    pub async fn create_server(&self, config: &CreateServerConfig) -> Result<ServerInfo> {
        let core_str = config.core.to_string();
        let memory_str = config.memory.to_string();
        let disk_size_str = config.disk_size.to_string();

        let mut args = vec![
            "server",
            "create",
            "--name",
            config.name.as_str(),
            "--cpu",
            core_str.as_str(),
            "--memory",
            memory_str.as_str(),
            "--disk-size",
            disk_size_str.as_str(),
            "--os-type",
            config.os_type.as_str(),
            "--output-type",
            "json",
            "--yes",
        ];

        for tag in &config.tags {
            args.push("--tags");
            args.push(tag.as_str());
        }

        for id in &config.ssh_key_ids {
            args.push("--disk-edit-ssh-key-ids");
            args.push(id.as_str());
        }

        for id in &config.note_ids {
            args.push("--disk-edit-note-ids");
            args.push(id.as_str());
        }

        let output = self.run_command(&args).await?;
        parse_one(&output)
    }

    /// Delete a server, optionally with its disks
    pub async fn delete_server(&self, id: &str, with_disks: bool) -> Result<()> {
        let mut args = vec!["server", "delete", id, "--force", "--yes"];

        if with_disks {
            args.push("--with-disks");
        }

        self.run_command(&args).await?;
        Ok(())
    }

    /// List SSH keys registered to the account
    pub async fn list_ssh_keys(&self) -> Result<Vec<SshKeyInfo>> {
        let output = self
            .run_command(&["ssh-key", "list", "--output-type", "json"])
            .await?;
        parse_list(&output)
    }

    /// List startup scripts
    pub async fn list_notes(&self) -> Result<Vec<NoteInfo>> {
        let output = self
            .run_command(&["note", "list", "--output-type", "json"])
            .await?;
        parse_list(&output)
    }

    /// Create a shell startup script
    pub async fn create_note(&self, name: &str, content: &str, tags: &[String]) -> Result<NoteInfo> {
        let mut args = vec![
            "note",
            "create",
            "--name",
            name,
            "--class",
            "shell",
            "--content",
            content,
            "--output-type",
            "json",
            "--yes",
        ];
        for tag in tags {
            args.push("--tags");
            args.push(tag.as_str());
        }

        let output = self.run_command(&args).await?;
        parse_one(&output)
    }

    pub async fn delete_note(&self, id: &str) -> Result<()> {
        self.run_command(&["note", "delete", id, "--yes"]).await?;
        Ok(())
    }
}

/// Parse a JSON array, treating empty output as no items
fn parse_list<T: DeserializeOwned>(output: &str) -> Result<Vec<T>> {
    let trimmed = output.trim();
    if trimmed.is_empty() || trimmed == "[]" {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(trimmed)?)
}

/// Parse a single resource; usacloud wraps results of write commands in an array
fn parse_one<T: DeserializeOwned>(output: &str) -> Result<T> {
    let value: serde_json::Value = serde_json::from_str(output.trim())?;
    let item = match value {
        serde_json::Value::Array(mut items) if !items.is_empty() => items.swap_remove(0),
        serde_json::Value::Array(_) => {
            return Err(SakuraError::UnexpectedOutput("empty result".to_string()));
        }
        other => other,
    };
    Ok(serde_json::from_value(item)?)
}

/// Resource IDs come back as strings or numbers depending on the command
fn id_to_string(id: &serde_json::Value) -> String {
    match id {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Server information from usacloud
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    #[serde(rename = "ID")]
    pub id: serde_json::Value,

    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "Tags")]
    pub tags: Option<Vec<String>>,

    #[serde(rename = "InstanceStatus")]
    pub instance_status: Option<String>,

    #[serde(rename = "Interfaces")]
    pub interfaces: Option<Vec<InterfaceInfo>>,
}

impl ServerInfo {
    pub fn id_str(&self) -> String {
        id_to_string(&self.id)
    }

    pub fn tags(&self) -> &[String] {
        self.tags.as_deref().unwrap_or_default()
    }

    /// Address on the shared segment
    pub fn ip_address(&self) -> Option<String> {
        self.interfaces
            .as_ref()?
            .iter()
            .find_map(|i| i.ip_address.clone())
    }

    /// Address on a private switch, if the server is connected to one
    pub fn user_ip_address(&self) -> Option<String> {
        self.interfaces
            .as_ref()?
            .iter()
            .find_map(|i| i.user_ip_address.clone())
    }

    /// Check if server is running
    pub fn is_running(&self) -> bool {
        self.instance_status.as_deref() == Some("up")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceInfo {
    #[serde(rename = "IPAddress")]
    pub ip_address: Option<String>,

    #[serde(rename = "UserIPAddress")]
    pub user_ip_address: Option<String>,
}

/// Configuration for creating a server
#[derive(Debug, Clone)]
pub struct CreateServerConfig {
    pub name: String,
    pub core: u32,
    pub memory: u32,
    pub disk_size: u32,
    pub os_type: String,
    pub ssh_key_ids: Vec<String>,
    pub note_ids: Vec<String>,
    pub tags: Vec<String>,
}

/// SSH key information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshKeyInfo {
    #[serde(rename = "ID")]
    pub id: serde_json::Value,

    #[serde(rename = "Name")]
    pub name: String,
}

impl SshKeyInfo {
    pub fn id_str(&self) -> String {
        id_to_string(&self.id)
    }
}

/// Startup script ("note") information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteInfo {
    #[serde(rename = "ID")]
    pub id: serde_json::Value,

    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "Tags")]
    pub tags: Option<Vec<String>>,
}

impl NoteInfo {
    pub fn id_str(&self) -> String {
        id_to_string(&self.id)
    }

    pub fn tags(&self) -> &[String] {
        self.tags.as_deref().unwrap_or_default()
    }
}
