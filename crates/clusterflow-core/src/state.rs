//! Local record of launched clusters
//!
//! Each launched cluster gets a directory under the state root (by default
//! `~/.clusterflow/<cluster-name>/`) holding `instances.json` and, while an
//! invocation owns the cluster, `lock.json`.

use crate::cluster::Cluster;
use crate::error::{ClusterError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

const STATE_VERSION: u32 = 1;
const STATE_DIR: &str = ".clusterflow";
const STATE_FILE: &str = "instances.json";
const STATE_BACKUP: &str = "instances.json.backup";
const LOCK_FILE: &str = "lock.json";

/// Persisted cluster record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterState {
    /// State file version
    pub version: u32,

    pub service_name: String,

    pub cluster_name: String,

    /// Last modified timestamp
    pub updated_at: DateTime<Utc>,

    pub cluster: Cluster,
}

impl ClusterState {
    pub fn new(
        service_name: impl Into<String>,
        cluster_name: impl Into<String>,
        cluster: Cluster,
    ) -> Self {
        Self {
            version: STATE_VERSION,
            service_name: service_name.into(),
            cluster_name: cluster_name.into(),
            updated_at: Utc::now(),
            cluster,
        }
    }
}

/// Reads and writes cluster state files
pub struct ClusterStateStore {
    root: PathBuf,
}

impl ClusterStateStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Store rooted at `~/.clusterflow`
    pub fn in_home_dir() -> Result<Self> {
        let home = dirs::home_dir().ok_or_else(|| {
            ClusterError::StateError("home directory could not be determined".to_string())
        })?;
        Ok(Self::new(home.join(STATE_DIR)))
    }

    fn cluster_dir(&self, cluster_name: &str) -> PathBuf {
        self.root.join(cluster_name)
    }

    fn state_path(&self, cluster_name: &str) -> PathBuf {
        self.cluster_dir(cluster_name).join(STATE_FILE)
    }

    fn backup_path(&self, cluster_name: &str) -> PathBuf {
        self.cluster_dir(cluster_name).join(STATE_BACKUP)
    }

    fn lock_path(&self, cluster_name: &str) -> PathBuf {
        self.cluster_dir(cluster_name).join(LOCK_FILE)
    }

    async fn ensure_cluster_dir(&self, cluster_name: &str) -> Result<()> {
        let dir = self.cluster_dir(cluster_name);
        if !dir.exists() {
            fs::create_dir_all(&dir).await?;
            tracing::debug!("Created state directory: {}", dir.display());
        }
        Ok(())
    }

    /// Load the recorded state, if any
    pub async fn load(&self, cluster_name: &str) -> Result<Option<ClusterState>> {
        let path = self.state_path(cluster_name);
        if !path.exists() {
            tracing::debug!("No state recorded for cluster {}", cluster_name);
            return Ok(None);
        }

        let content = fs::read_to_string(&path).await?;
        let state: ClusterState = serde_json::from_str(&content)?;

        if state.version > STATE_VERSION {
            return Err(ClusterError::StateError(format!(
                "State file version {} is newer than supported version {}",
                state.version, STATE_VERSION
            )));
        }

        tracing::debug!(
            "Loaded state for cluster {} with {} instance(s)",
            cluster_name,
            state.cluster.len()
        );
        Ok(Some(state))
    }

    /// Save the state, keeping the previous file as a backup
    pub async fn save(&self, state: &ClusterState) -> Result<()> {
        let name = state.cluster_name.as_str();
        self.ensure_cluster_dir(name).await?;

        let path = self.state_path(name);
        let backup = self.backup_path(name);

        if path.exists() {
            if backup.exists() {
                fs::remove_file(&backup).await?;
            }
            fs::rename(&path, &backup).await?;
            tracing::debug!("Created state backup for cluster {}", name);
        }

        let content = serde_json::to_string_pretty(state)?;
        fs::write(&path, content).await?;

        tracing::debug!(
            "Saved state for cluster {} with {} instance(s)",
            name,
            state.cluster.len()
        );
        Ok(())
    }

    /// Delete the recorded state and its backup
    pub async fn remove(&self, cluster_name: &str) -> Result<()> {
        for path in [self.state_path(cluster_name), self.backup_path(cluster_name)] {
            if path.exists() {
                fs::remove_file(&path).await?;
            }
        }
        tracing::debug!("Removed state for cluster {}", cluster_name);
        Ok(())
    }

    /// Acquire exclusive ownership of a cluster
    pub async fn acquire_lock(&self, cluster_name: &str) -> Result<StateLock> {
        self.ensure_cluster_dir(cluster_name).await?;

        let lock_path = self.lock_path(cluster_name);
        let lock_info = LockInfo {
            holder: std::env::var("HOSTNAME")
                .or_else(|_| std::env::var("HOST"))
                .unwrap_or_else(|_| "unknown".to_string()),
            acquired_at: Utc::now(),
        };
        let content = serde_json::to_string_pretty(&lock_info)?;

        match create_lock_file(&lock_path, &content).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                remove_stale_lock(&lock_path, cluster_name).await?;
                create_lock_file(&lock_path, &content)
                    .await
                    .map_err(|e| match e.kind() {
                        io::ErrorKind::AlreadyExists => ClusterError::LockError(format!(
                            "Cluster {} was locked by another invocation",
                            cluster_name
                        )),
                        _ => e.into(),
                    })?;
            }
            Err(e) => return Err(e.into()),
        }

        tracing::debug!("Acquired lock for cluster {}", cluster_name);
        Ok(StateLock {
            lock_path,
            released: false,
        })
    }
}

/// Create the lock file, failing with `AlreadyExists` if it is present
async fn create_lock_file(path: &Path, content: &str) -> io::Result<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    file.write_all(content.as_bytes()).await?;
    file.flush().await
}

/// Remove an existing lock if it is abandoned, otherwise report who holds it
async fn remove_stale_lock(lock_path: &Path, cluster_name: &str) -> Result<()> {
    let content = match fs::read_to_string(lock_path).await {
        Ok(content) => content,
        // Released between our create attempt and this read
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    // An unparsable lock is still being written by its holder
    let Ok(lock_info) = serde_json::from_str::<LockInfo>(&content) else {
        return Err(ClusterError::LockError(format!(
            "Cluster {} is being locked by another invocation",
            cluster_name
        )));
    };

    // Locks older than an hour are considered abandoned
    let age = Utc::now().signed_duration_since(lock_info.acquired_at);
    if age.num_hours() < 1 {
        return Err(ClusterError::LockError(format!(
            "Cluster {} is locked by {} since {}",
            cluster_name, lock_info.holder, lock_info.acquired_at
        )));
    }

    tracing::warn!("Removing stale lock from {}", lock_info.holder);
    match fs::remove_file(lock_path).await {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    holder: String,
    acquired_at: DateTime<Utc>,
}

/// RAII guard for a cluster lock
pub struct StateLock {
    lock_path: PathBuf,
    released: bool,
}

impl StateLock {
    pub async fn release(mut self) -> Result<()> {
        if !self.released {
            if self.lock_path.exists() {
                fs::remove_file(&self.lock_path).await?;
                tracing::debug!("Released lock {}", self.lock_path.display());
            }
            self.released = true;
        }
        Ok(())
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if !self.released && self.lock_path.exists() {
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}
