use clusterflow_core::ClusterError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "cluster spec file not found. Looked in:\n\
        - the current directory: cluster.local.kdl, cluster.kdl\n\
        - the ./.clusterflow/ directory\n\
        - ~/.config/clusterflow/cluster.kdl\n\
        Set CLUSTERFLOW_CONFIG_PATH or pass --config to point at a file"
    )]
    SpecFileNotFound,

    #[error("KDL parse error: {0}")]
    KdlParse(#[from] kdl::KdlError),

    #[error("invalid cluster spec: {0}")]
    InvalidConfig(String),

    #[error("cluster not found in spec file: {0}")]
    ClusterNotFound(String),

    #[error(transparent)]
    Spec(#[from] ClusterError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
