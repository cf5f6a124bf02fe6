//! Sakura Cloud provider error types

use clusterflow_core::ClusterError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SakuraError {
    #[error("usacloud not found. Please install: https://github.com/sacloud/usacloud")]
    UsacloudNotFound,

    #[error("usacloud command failed: {0}")]
    CommandFailed(String),

    #[error("ssh to {host} failed: {message}")]
    SshFailed { host: String, message: String },

    #[error("Instance has no public address: {0}")]
    NoPublicAddress(String),

    #[error("SSH key not registered to the account: {0}")]
    SshKeyNotFound(String),

    #[error("Invalid setting {key}: {value}")]
    InvalidSetting { key: String, value: String },

    #[error("Unexpected usacloud output: {0}")]
    UnexpectedOutput(String),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SakuraError>;

impl From<SakuraError> for ClusterError {
    fn from(err: SakuraError) -> Self {
        match err {
            SakuraError::InvalidSetting { .. } => ClusterError::InvalidSpec(err.to_string()),
            SakuraError::CommandFailed(_) | SakuraError::SshFailed { .. } => {
                ClusterError::CommandFailed(err.to_string())
            }
            other => ClusterError::Provisioning(other.to_string()),
        }
    }
}
