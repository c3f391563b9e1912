//! Composition root for a [`Scheduler`].

use std::sync::Arc;

use crate::config::{SchedulerConfig, StoreBackendConfig};
use crate::core::{
    ActionRegistry, AuditSink, HandlerRegistry, InMemoryAuditSink, Notifier, Scheduler,
    SchedulerError, ScopeDirectory, TaskStore,
};
use crate::infra::{InMemoryTaskStore, JsonlTaskStore};

/// Build the task store selected by configuration.
///
/// # Errors
///
/// Returns [`SchedulerError::Store`] if a file store cannot be opened.
pub fn build_store(cfg: &StoreBackendConfig) -> Result<Arc<dyn TaskStore>, SchedulerError> {
    match cfg {
        StoreBackendConfig::InMemory => Ok(Arc::new(InMemoryTaskStore::new())),
        StoreBackendConfig::File { path, stream } => {
            Ok(Arc::new(JsonlTaskStore::open(path, stream.clone())?))
        }
    }
}

/// Assembles a scheduler from configuration and collaborators.
///
/// ```rust,ignore
/// let scheduler = SchedulerBuilder::new(SchedulerConfig::from_env()?)
///     .handler(TaskKind::Gateway, Arc::new(GatewayHandler::new(client)))
///     .scopes(projects)
///     .notifier(websocket_fanout)
///     .build()?;
/// scheduler.recover()?;
/// ```
pub struct SchedulerBuilder {
    config: SchedulerConfig,
    handlers: HandlerRegistry,
    actions: ActionRegistry,
    store: Option<Arc<dyn TaskStore>>,
    scopes: Option<Arc<dyn ScopeDirectory>>,
    notifier: Option<Arc<dyn Notifier>>,
    audit: Option<Box<dyn AuditSink>>,
}

impl SchedulerBuilder {
    /// Start from a configuration.
    #[must_use]
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            handlers: HandlerRegistry::new(),
            actions: ActionRegistry::new(),
            store: None,
            scopes: None,
            notifier: None,
            audit: None,
        }
    }

    /// Register a handler.
    #[must_use]
    pub fn handler(mut self, kind: crate::core::TaskKind, handler: Arc<dyn crate::core::TaskHandler>) -> Self {
        self.handlers.register(kind, handler);
        self
    }

    /// Replace the handler table.
    #[must_use]
    pub fn handlers(mut self, handlers: HandlerRegistry) -> Self {
        self.handlers = handlers;
        self
    }

    /// Replace the immediate-action table.
    #[must_use]
    pub fn actions(mut self, actions: ActionRegistry) -> Self {
        self.actions = actions;
        self
    }

    /// Use this store instead of the configured backend.
    #[must_use]
    pub fn store(mut self, store: Arc<dyn TaskStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Scope directory for orphan detection.
    #[must_use]
    pub fn scopes(mut self, scopes: Arc<dyn ScopeDirectory>) -> Self {
        self.scopes = Some(scopes);
        self
    }

    /// Notification sink.
    #[must_use]
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Audit sink; overrides `audit_capacity`.
    #[must_use]
    pub fn audit(mut self, audit: Box<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Validate the configuration and build the scheduler.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Config`] for invalid configuration and
    /// [`SchedulerError::Store`] when the store backend cannot be opened.
    pub fn build(self) -> Result<Arc<Scheduler>, SchedulerError> {
        self.config.validate().map_err(SchedulerError::Config)?;

        let store = match self.store {
            Some(store) => store,
            None => build_store(&self.config.store)?,
        };
        let mut scheduler = Scheduler::new(self.config.limits(), self.handlers, store)
            .with_actions(self.actions);
        if let Some(scopes) = self.scopes {
            scheduler = scheduler.with_scopes(scopes);
        }
        if let Some(notifier) = self.notifier {
            scheduler = scheduler.with_notifier(notifier);
        }
        let audit = self.audit.or_else(|| {
            (self.config.audit_capacity > 0).then(|| {
                Box::new(InMemoryAuditSink::new(self.config.audit_capacity)) as Box<dyn AuditSink>
            })
        });
        if let Some(audit) = audit {
            scheduler = scheduler.with_audit(audit);
        }

        tracing::info!(
            priority_max = self.config.priority.max_active,
            normal_max = self.config.normal.max_active,
            handlers = ?scheduler.handlers().kinds(),
            "scheduler built"
        );
        Ok(Arc::new(scheduler))
    }
}
