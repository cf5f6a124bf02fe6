//! Role handler contract
//!
//! A [`RoleHandler`] supplies the lifecycle hooks for one role. The pipeline
//! resolves one handler per role through a [`HandlerRegistry`] and calls its
//! hooks around each stage's provider action. Every hook defaults to a no-op.

use crate::action::ClusterActionStage;
use crate::cluster::Cluster;
use crate::error::{ClusterError, Result};
use crate::provider::ProvisioningProvider;
use crate::spec::ClusterSpec;
use crate::statement::ScriptStatement;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Hook points, in the order a stage runs them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    BeforeBootstrap,
    AfterBootstrap,
    BeforeConfigure,
    AfterConfigure,
    BeforeDestroy,
    AfterDestroy,
}

impl Hook {
    pub fn stage(&self) -> ClusterActionStage {
        match self {
            Hook::BeforeBootstrap | Hook::AfterBootstrap => ClusterActionStage::Bootstrap,
            Hook::BeforeConfigure | Hook::AfterConfigure => ClusterActionStage::Configure,
            Hook::BeforeDestroy | Hook::AfterDestroy => ClusterActionStage::Destroy,
        }
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Hook::BeforeBootstrap => "before_bootstrap",
            Hook::AfterBootstrap => "after_bootstrap",
            Hook::BeforeConfigure => "before_configure",
            Hook::AfterConfigure => "after_configure",
            Hook::BeforeDestroy => "before_destroy",
            Hook::AfterDestroy => "after_destroy",
        };
        write!(f, "{}", name)
    }
}

/// Context for a single hook call
///
/// Built fresh for every (hook, role) pair. The statement list only grows; the
/// pipeline collects it with [`into_statements`](Self::into_statements) once
/// the hook returns.
pub struct StageEvent<'a> {
    hook: Hook,
    role: &'a str,
    spec: &'a ClusterSpec,
    cluster: &'a Cluster,
    provider: &'a dyn ProvisioningProvider,
    statements: Vec<ScriptStatement>,
}

impl<'a> StageEvent<'a> {
    pub fn new(
        hook: Hook,
        role: &'a str,
        spec: &'a ClusterSpec,
        cluster: &'a Cluster,
        provider: &'a dyn ProvisioningProvider,
    ) -> Self {
        Self {
            hook,
            role,
            spec,
            cluster,
            provider,
            statements: Vec::new(),
        }
    }

    pub fn hook(&self) -> Hook {
        self.hook
    }

    pub fn stage(&self) -> ClusterActionStage {
        self.hook.stage()
    }

    pub fn role(&self) -> &'a str {
        self.role
    }

    pub fn spec(&self) -> &'a ClusterSpec {
        self.spec
    }

    pub fn cluster(&self) -> &'a Cluster {
        self.cluster
    }

    pub fn provider(&self) -> &'a dyn ProvisioningProvider {
        self.provider
    }

    pub fn statements(&self) -> &[ScriptStatement] {
        &self.statements
    }

    pub fn add_statement(&mut self, statement: ScriptStatement) {
        self.statements.push(statement);
    }

    /// Append a catalog script resolved against the spec's run-url base
    pub fn add_run_url<I, S>(&mut self, path: &str, args: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let statement = ScriptStatement::new(self.spec.run_url_base(), path).with_args(args);
        self.statements.push(statement);
    }

    /// Build a handler error attributed to this event's role and hook
    pub fn error(&self, message: impl Into<String>) -> ClusterError {
        ClusterError::handler(self.role, self.hook.to_string(), message)
    }

    pub fn into_statements(self) -> Vec<ScriptStatement> {
        self.statements
    }
}

/// Lifecycle hooks for one role
#[async_trait]
pub trait RoleHandler: Send + Sync {
    /// Role this handler serves; the registry key
    fn role(&self) -> &str;

    /// Append install statements for the role's nodes
    async fn before_bootstrap(&self, _event: &mut StageEvent<'_>) -> Result<()> {
        Ok(())
    }

    async fn after_bootstrap(&self, _event: &mut StageEvent<'_>) -> Result<()> {
        Ok(())
    }

    /// Open ports, discover peers and append configure statements
    async fn before_configure(&self, _event: &mut StageEvent<'_>) -> Result<()> {
        Ok(())
    }

    async fn after_configure(&self, _event: &mut StageEvent<'_>) -> Result<()> {
        Ok(())
    }

    async fn before_destroy(&self, _event: &mut StageEvent<'_>) -> Result<()> {
        Ok(())
    }

    async fn after_destroy(&self, _event: &mut StageEvent<'_>) -> Result<()> {
        Ok(())
    }
}

/// Call the handler method matching `hook`
pub(crate) async fn invoke(
    handler: &dyn RoleHandler,
    hook: Hook,
    event: &mut StageEvent<'_>,
) -> Result<()> {
    match hook {
        Hook::BeforeBootstrap => handler.before_bootstrap(event).await,
        Hook::AfterBootstrap => handler.after_bootstrap(event).await,
        Hook::BeforeConfigure => handler.before_configure(event).await,
        Hook::AfterConfigure => handler.after_configure(event).await,
        Hook::BeforeDestroy => handler.before_destroy(event).await,
        Hook::AfterDestroy => handler.after_destroy(event).await,
    }
}

/// Static mapping from role name to handler
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn RoleHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handler(mut self, handler: impl RoleHandler + 'static) -> Self {
        self.register(Arc::new(handler));
        self
    }

    pub fn register(&mut self, handler: Arc<dyn RoleHandler>) {
        let role = handler.role().to_string();
        if self.handlers.insert(role.clone(), handler).is_some() {
            tracing::warn!("Replacing handler for role {}", role);
        }
    }

    pub fn get(&self, role: &str) -> Option<Arc<dyn RoleHandler>> {
        self.handlers.get(role).cloned()
    }

    pub fn roles(&self) -> Vec<&str> {
        let mut roles: Vec<_> = self.handlers.keys().map(String::as_str).collect();
        roles.sort_unstable();
        roles
    }

    /// Handlers for every role of `spec`, in declaration order
    ///
    /// Fails on the first role without a registered handler.
    pub fn resolve(&self, spec: &ClusterSpec) -> Result<Vec<Arc<dyn RoleHandler>>> {
        spec.roles()
            .into_iter()
            .map(|role| {
                self.get(role)
                    .ok_or_else(|| ClusterError::UnknownRole(role.to_string()))
            })
            .collect()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("roles", &self.roles())
            .finish()
    }
}
