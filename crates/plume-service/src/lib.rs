//! # plume-service
//!
//! Service contract for the Plume framework.
//!
//! This crate defines the trait application services implement. It contains
//! no hook machinery; services stay plain CRUD handlers and the pipeline in
//! `plume-app` wraps them.
//!
//! ## Overview
//!
//! The main trait is [`Service`], which defines:
//! - The five standard methods (`find`, `get`, `create`, `update`, `patch`, `remove`)
//! - An explicit [`ServiceCapabilities`] declaration of which of them exist
//! - An optional `setup` step and custom events
//!
//! ## Implementing a service
//!
//! ```ignore
//! use async_trait::async_trait;
//! use plume_service::{Service, ServiceCapabilities};
//!
//! struct Messages;
//!
//! #[async_trait]
//! impl Service for Messages {
//!     fn capabilities(&self) -> ServiceCapabilities {
//!         ServiceCapabilities::of(&[ServiceMethod::Create])
//!     }
//!
//!     async fn create(&self, data: Value, _params: Params) -> Result<Value> {
//!         Ok(data)
//!     }
//! }
//! ```

mod args;
mod capabilities;
mod traits;

pub use args::MethodArgs;
pub use capabilities::ServiceCapabilities;
pub use traits::{Service, ServiceHandle, ServiceHost, invoke};

pub use plume_core::{Id, Params, Result, ServiceError, ServiceMethod};

/// Type alias for a shareable service trait object.
pub type DynService = std::sync::Arc<dyn Service>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use plume_service::prelude::*;
/// ```
pub mod prelude {
    pub use crate::args::MethodArgs;
    pub use crate::capabilities::ServiceCapabilities;
    pub use crate::traits::{Service, ServiceHandle, ServiceHost, invoke};
    pub use crate::DynService;
    pub use plume_core::{Id, Paginated, Params, Result, ServiceError, ServiceMethod};
}
