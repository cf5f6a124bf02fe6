//! Cluster error types

use thiserror::Error;

/// Errors raised while provisioning or managing a cluster
#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("Invalid cluster spec: {0}")]
    InvalidSpec(String),

    #[error("No handler registered for role: {0}")]
    UnknownRole(String),

    #[error("Stage {0} requires a cluster produced by a previous stage")]
    MissingCluster(String),

    #[error("Provisioning failed: {0}")]
    Provisioning(String),

    #[error("Command execution failed: {0}")]
    CommandFailed(String),

    #[error("Handler for role '{role}' failed in {hook}: {message}")]
    Handler {
        role: String,
        hook: String,
        message: String,
    },

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("State file error: {0}")]
    StateError(String),

    #[error("Lock acquisition failed: {0}")]
    LockError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse classification of a [`ClusterError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed spec or unknown role, raised before any remote call
    Validation,
    /// Provider I/O failure; cluster state is indeterminate
    Provisioning,
    /// A blocking remote call was interrupted
    Cancellation,
    /// A role hook failed
    Handler,
}

impl ClusterError {
    pub fn handler(
        role: impl Into<String>,
        hook: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Handler {
            role: role.into(),
            hook: hook.into(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidSpec(_) | Self::UnknownRole(_) | Self::MissingCluster(_) => {
                ErrorKind::Validation
            }
            Self::Handler { .. } => ErrorKind::Handler,
            Self::Cancelled(_) => ErrorKind::Cancellation,
            Self::Provisioning(_)
            | Self::CommandFailed(_)
            | Self::StateError(_)
            | Self::LockError(_)
            | Self::Io(_)
            | Self::Json(_) => ErrorKind::Provisioning,
        }
    }

    /// Whether a presentation layer should report this as a usage problem
    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }
}

pub type Result<T> = std::result::Result<T, ClusterError>;
