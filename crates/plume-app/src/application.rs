//! The application: registered services, application-wide hooks and the
//! event bus.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use dashmap::DashMap;
use plume_core::{EventBroadcaster, Result, ServiceError};
use plume_hooks::{ChainRunner, HookMap, HookRegistry, Pipeline};
use plume_service::{Service, ServiceHandle, ServiceHost};
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::hooked::{HookedService, normalize_path};
use crate::observability;

pub(crate) struct AppInner {
    services: DashMap<String, Arc<HookedService>>,
    order: RwLock<Vec<String>>,
    pub(crate) hooks: HookRegistry,
    pub(crate) broadcaster: Arc<EventBroadcaster>,
    pub(crate) pipeline: Pipeline,
    config: AppConfig,
}

impl AppInner {
    fn service(&self, path: &str) -> Result<Arc<HookedService>> {
        let path = normalize_path(path);
        self.services
            .get(&path)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ServiceError::not_found(format!("Can not find service '{path}'")))
    }
}

impl ServiceHost for AppInner {
    fn lookup(&self, path: &str) -> Result<Arc<dyn ServiceHandle>> {
        let service: Arc<dyn ServiceHandle> = self.service(path)?;
        Ok(service)
    }
}

/// A Plume application.
///
/// Cloning is cheap and every clone refers to the same application.
#[derive(Clone)]
pub struct Application {
    inner: Arc<AppInner>,
}

impl Application {
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    /// Build an application from `config`, applying its logging level.
    pub fn with_config(config: AppConfig) -> Self {
        observability::init_tracing_from_config(&config.logging);
        let runner = ChainRunner::new()
            .with_slow_hook_warning(Duration::from_millis(config.pipeline.slow_hook_warn_ms));
        let inner = AppInner {
            services: DashMap::new(),
            order: RwLock::new(Vec::new()),
            hooks: HookRegistry::new(),
            broadcaster: Arc::new(EventBroadcaster::with_capacity(
                config.events.channel_capacity,
            )),
            pipeline: Pipeline::new(runner),
            config,
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    /// Register `service` at `path`, replacing any service already there.
    ///
    /// # Errors
    ///
    /// Fails when the service implements none of the standard methods.
    pub fn use_service<S: Service>(&self, path: &str, service: S) -> Result<Arc<HookedService>> {
        self.use_arc(path, Arc::new(service))
    }

    pub fn use_arc(&self, path: &str, service: Arc<dyn Service>) -> Result<Arc<HookedService>> {
        let hooked = Arc::new(HookedService::from_arc(path, service)?);
        Ok(self.use_hooked(hooked))
    }

    /// Register a service that is already wrapped. Its hooks and listeners are
    /// kept as they are; registering the same wrapper again changes nothing.
    pub fn use_hooked(&self, hooked: Arc<HookedService>) -> Arc<HookedService> {
        let path = hooked.path().to_string();
        if let Some(existing) = self.inner.services.get(&path) {
            if Arc::ptr_eq(existing.value(), &hooked) {
                debug!(path = %path, "Service already registered");
                return hooked;
            }
        }

        hooked.attach(&self.inner);
        let replaced = self
            .inner
            .services
            .insert(path.clone(), hooked.clone())
            .is_some();
        if !replaced {
            self.inner
                .order
                .write()
                .unwrap_or_else(|e| e.into_inner())
                .push(path.clone());
        }
        info!(path = %path, replaced, "Registered service");
        hooked
    }

    /// # Errors
    ///
    /// Returns a `NotFound` error if no service is registered at `path`.
    pub fn service(&self, path: &str) -> Result<Arc<HookedService>> {
        self.inner.service(path)
    }

    /// Registered paths in registration order.
    pub fn paths(&self) -> Vec<String> {
        self.inner
            .order
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Register hooks that run for every service.
    pub fn hooks(&self, map: HookMap) -> Result<&Self> {
        self.inner.hooks.hooks(map)?;
        Ok(self)
    }

    pub fn registry(&self) -> &HookRegistry {
        &self.inner.hooks
    }

    /// Bus on which every service event is republished.
    pub fn broadcaster(&self) -> Arc<EventBroadcaster> {
        self.inner.broadcaster.clone()
    }

    /// Run each service's `setup` once, in registration order.
    pub async fn setup(&self) -> Result<()> {
        for path in self.paths() {
            let service = self.inner.service(&path)?;
            service.setup(self.inner.as_ref()).await?;
            debug!(path = %path, "Service set up");
        }
        info!(services = self.inner.services.len(), "Application set up");
        Ok(())
    }
}

impl Default for Application {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceHost for Application {
    fn lookup(&self, path: &str) -> Result<Arc<dyn ServiceHandle>> {
        self.inner.lookup(path)
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("services", &self.paths())
            .field("hooks", &self.inner.hooks)
            .field("config", &self.inner.config)
            .finish()
    }
}
