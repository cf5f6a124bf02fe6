//! Sakura Cloud provider for ClusterFlow
//!
//! Implements [`ProvisioningProvider`](clusterflow_core::ProvisioningProvider)
//! for Sakura Cloud.
//!
//! # Requirements
//!
//! - `usacloud` CLI must be installed
//! - `ssh` access to new servers with the configured user
//!
//! Credentials come from the spec's identity and credential, or from
//! usacloud's own configuration when the spec has none.
//!
//! # Example
//!
//! ```ignore
//! use clusterflow_cloud_sakura::SakuraCloudProvider;
//!
//! let provider = SakuraCloudProvider::from_spec(&spec)?;
//! let nodes = provider.list_nodes(&running_in_group("ring")).await?;
//! ```

pub mod error;
pub mod provider;
pub mod startup_scripts;
pub mod usacloud;

pub use error::{Result, SakuraError};
pub use provider::{PROVIDER_NAME, SakuraCloudProvider, SakuraSettings};
pub use usacloud::{CreateServerConfig, Credentials, NoteInfo, ServerInfo, SshKeyInfo, Usacloud};
