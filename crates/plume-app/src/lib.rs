//! # plume-app
//!
//! Applications built from hooked services.
//!
//! An [`Application`] holds services registered under paths. Each one is
//! wrapped in a [`HookedService`], which runs every standard method call
//! through the hook pipeline from `plume-hooks` and emits `created`,
//! `updated`, `patched` and `removed` events afterwards.
//!
//! ## Example
//!
//! ```ignore
//! use plume_app::prelude::*;
//!
//! let app = Application::new();
//! let messages = app.use_service("messages", Messages::default())?;
//! messages.hooks(
//!     HookMap::new()
//!         .before(ServiceMethod::Create, require_auth())
//!         .after_all(discard(["internal"])),
//! )?;
//! app.setup().await?;
//!
//! let created = messages.create(json!({"text": "Hello"}), None).await?;
//! ```

pub mod application;
pub mod bridge;
pub mod config;
pub mod emitter;
pub mod hooked;
pub mod observability;

pub use application::Application;
pub use config::{AppConfig, ConfigError};
pub use emitter::{Listener, ListenerId, ServiceEmitter};
pub use hooked::{HookedService, normalize_path};

/// Common imports for building applications.
pub mod prelude {
    pub use crate::{AppConfig, Application, HookedService, ServiceEmitter};
    pub use plume_core::{
        ErrorKind, EventBroadcaster, Id, Paginated, Params, Result, ServiceError, ServiceEvent,
        ServiceMethod,
    };
    pub use plume_hooks::common::*;
    pub use plume_hooks::{
        Hook, HookContext, HookMap, HookRef, HookType, MethodSelector, hook_fn, named_sync_hook,
        sync_hook,
    };
    pub use plume_service::{MethodArgs, Service, ServiceCapabilities, ServiceHandle, ServiceHost};
}
