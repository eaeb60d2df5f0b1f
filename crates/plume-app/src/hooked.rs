//! HookedService - a service wrapper that runs every standard method call
//! through the hook pipeline.
//!
//! The wrapper owns the service's hook registry and event emitter. Calls to
//! methods the service does not implement fail immediately; everything else
//! goes `before` hooks, service method, `after` hooks, with failures diverted
//! into the `error` hooks. Successful mutations are then emitted as events.
//!
//! # Example
//!
//! ```ignore
//! let messages = app.use_service("messages", Messages::default())?;
//! messages.hooks(HookMap::new().before(ServiceMethod::Create, require_auth()))?;
//! messages.on("created", |message, _ctx| println!("new message {message}"));
//!
//! messages.create(json!({"text": "Hello"}), None).await?;
//! ```

use std::sync::{Arc, OnceLock, Weak};

use async_trait::async_trait;
use plume_core::{Id, Params, Result, ServiceError, ServiceMethod};
use plume_hooks::{Chains, HookContext, HookMap, HookRegistry, Pipeline};
use plume_service::{MethodArgs, Service, ServiceCapabilities, ServiceHandle, ServiceHost, invoke};
use serde_json::Value;
use tracing::{Instrument, debug, info_span, warn};

use crate::application::AppInner;
use crate::bridge;
use crate::emitter::{ListenerId, ServiceEmitter};

/// Strip leading and trailing slashes from a service path.
pub fn normalize_path(path: &str) -> String {
    path.trim_matches('/').to_string()
}

/// A service with its hooks and event emitter attached.
pub struct HookedService {
    path: String,
    service: Arc<dyn Service>,
    capabilities: ServiceCapabilities,
    self_managed_events: Vec<String>,
    hooks: HookRegistry,
    emitter: ServiceEmitter,
    app: OnceLock<Weak<AppInner>>,
}

impl HookedService {
    /// Wrap a service outside of any application.
    ///
    /// # Errors
    ///
    /// Fails when the service implements none of the standard methods.
    pub fn new<S: Service>(path: &str, service: S) -> Result<Self> {
        Self::from_arc(path, Arc::new(service))
    }

    pub fn from_arc(path: &str, service: Arc<dyn Service>) -> Result<Self> {
        let path = normalize_path(path);
        let capabilities = service.capabilities();
        if capabilities.is_empty() {
            return Err(ServiceError::general(format!(
                "Invalid service object passed for path `{path}`"
            )));
        }
        debug!(
            path = %path,
            methods = ?capabilities.iter().collect::<Vec<_>>(),
            "Wrapped service"
        );
        Ok(Self {
            emitter: ServiceEmitter::new(&path),
            hooks: HookRegistry::for_service(capabilities),
            self_managed_events: service.events(),
            path,
            service,
            capabilities,
            app: OnceLock::new(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Standard methods the wrapped service implements.
    pub fn capabilities(&self) -> ServiceCapabilities {
        self.capabilities
    }

    /// The wrapped service itself.
    pub fn inner(&self) -> &Arc<dyn Service> {
        &self.service
    }

    pub fn registry(&self) -> &HookRegistry {
        &self.hooks
    }

    /// Register a set of hooks. Returns `self` so calls can be chained.
    pub fn hooks(&self, map: HookMap) -> Result<&Self> {
        self.hooks.hooks(map)?;
        Ok(self)
    }

    pub fn emitter(&self) -> &ServiceEmitter {
        &self.emitter
    }

    pub fn on<F>(&self, event: impl Into<String>, listener: F) -> ListenerId
    where
        F: Fn(&Value, Option<&HookContext>) + Send + Sync + 'static,
    {
        self.emitter.on(event, listener)
    }

    /// Bind the service to an application. A service keeps the first
    /// application it is bound to.
    pub(crate) fn attach(&self, app: &Arc<AppInner>) {
        if self.app.set(Arc::downgrade(app)).is_err() {
            debug!(path = %self.path, "Service already attached to an application");
        }
        self.emitter.attach_broadcaster(app.broadcaster.clone());
    }

    pub(crate) async fn setup(&self, host: &dyn ServiceHost) -> Result<()> {
        self.service.setup(host, &self.path).await
    }

    pub async fn find(&self, params: Option<Params>) -> Result<Value> {
        self.call(ServiceMethod::Find, MethodArgs::find(params)).await
    }

    pub async fn get(&self, id: impl Into<Id>, params: Option<Params>) -> Result<Value> {
        self.call(ServiceMethod::Get, MethodArgs::get(id, params)).await
    }

    pub async fn create(&self, data: Value, params: Option<Params>) -> Result<Value> {
        self.call(ServiceMethod::Create, MethodArgs::create(data, params))
            .await
    }

    pub async fn update(
        &self,
        id: Option<Id>,
        data: Value,
        params: Option<Params>,
    ) -> Result<Value> {
        self.call(ServiceMethod::Update, MethodArgs::update(id, data, params))
            .await
    }

    pub async fn patch(
        &self,
        id: Option<Id>,
        data: Value,
        params: Option<Params>,
    ) -> Result<Value> {
        self.call(ServiceMethod::Patch, MethodArgs::patch(id, data, params))
            .await
    }

    pub async fn remove(&self, id: Option<Id>, params: Option<Params>) -> Result<Value> {
        self.call(ServiceMethod::Remove, MethodArgs::remove(id, params))
            .await
    }

    /// Run one standard method call through the pipeline.
    ///
    /// # Errors
    ///
    /// Returns `MethodNotAllowed` without running any hook when the service
    /// does not implement `method`. Every other failure has been through the
    /// error hooks.
    pub async fn call(&self, method: ServiceMethod, args: MethodArgs) -> Result<Value> {
        if !self.capabilities.contains(method) {
            warn!(path = %self.path, method = %method, "Call to unsupported method");
            return Err(ServiceError::method_not_allowed(format!(
                "Method `{method}` is not supported by this endpoint."
            )));
        }

        let app = self.app.get().and_then(Weak::upgrade);
        let mut ctx = HookContext::new(self.path.clone(), method, args);
        let span = info_span!(
            "service_call",
            path = %self.path,
            method = %method,
            invocation_id = %ctx.invocation_id()
        );

        let pipeline = match &app {
            Some(app) => {
                ctx = ctx.with_app(app.clone());
                app.pipeline.clone()
            }
            None => Pipeline::default(),
        };
        let app_hooks = app.as_ref().map(|app| app.hooks.snapshot());
        let chains = Chains::resolve(app_hooks.as_deref(), &self.hooks.snapshot(), method);

        let service = self.service.clone();
        async move {
            let settled = pipeline
                .execute(ctx, &chains, move |args| async move {
                    invoke(service.as_ref(), method, args).await
                })
                .await;

            let (ctx, outcome) = pipeline.finish(settled, &chains.finally).await;
            if outcome.is_ok() {
                bridge::emit_for_call(&self.emitter, &self.self_managed_events, &ctx);
            }
            outcome
        }
        .instrument(span)
        .await
    }

    /// Forward a non-standard operation to the service. No hooks run.
    pub async fn call_custom(
        &self,
        name: &str,
        data: Value,
        params: Option<Params>,
    ) -> Result<Value> {
        debug!(path = %self.path, operation = %name, "Custom service operation");
        self.service
            .custom(name, data, params.unwrap_or_default())
            .await
    }
}

#[async_trait]
impl ServiceHandle for HookedService {
    fn path(&self) -> &str {
        &self.path
    }

    async fn call(&self, method: ServiceMethod, args: MethodArgs) -> Result<Value> {
        HookedService::call(self, method, args).await
    }

    fn emit(&self, event: &str, payload: Value) {
        self.emitter.emit_custom(event, payload);
    }
}

impl std::fmt::Debug for HookedService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookedService")
            .field("path", &self.path)
            .field("capabilities", &self.capabilities)
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}
