//! Service traits.
//!
//! [`Service`] is what applications implement. [`ServiceHandle`] and
//! [`ServiceHost`] are what the framework hands back to services so they can
//! reach other (wrapped) services during `setup`.

use std::sync::Arc;

use async_trait::async_trait;
use plume_core::{Id, Params, Result, ServiceError, ServiceMethod};
use serde_json::Value;
use tracing::trace;

use crate::args::MethodArgs;
use crate::capabilities::ServiceCapabilities;

/// The contract every application service implements.
///
/// Only the methods named by [`Service::capabilities`] are ever called by the
/// framework. The default bodies exist so implementations can omit methods
/// they don't support.
///
/// Methods return a single JSON value, an array, or a paginated envelope
/// (see [`plume_core::Paginated`]).
#[async_trait]
pub trait Service: Send + Sync + 'static {
    /// Which standard methods this service implements.
    fn capabilities(&self) -> ServiceCapabilities;

    /// Event names this service emits itself.
    ///
    /// A standard event listed here (for example `created`) is not emitted
    /// automatically after a successful call.
    fn events(&self) -> Vec<String> {
        Vec::new()
    }

    /// Called once when the application is set up.
    async fn setup(&self, _host: &dyn ServiceHost, _path: &str) -> Result<()> {
        Ok(())
    }

    async fn find(&self, _params: Params) -> Result<Value> {
        Err(unsupported(ServiceMethod::Find))
    }

    async fn get(&self, _id: Id, _params: Params) -> Result<Value> {
        Err(unsupported(ServiceMethod::Get))
    }

    async fn create(&self, _data: Value, _params: Params) -> Result<Value> {
        Err(unsupported(ServiceMethod::Create))
    }

    async fn update(&self, _id: Option<Id>, _data: Value, _params: Params) -> Result<Value> {
        Err(unsupported(ServiceMethod::Update))
    }

    async fn patch(&self, _id: Option<Id>, _data: Value, _params: Params) -> Result<Value> {
        Err(unsupported(ServiceMethod::Patch))
    }

    async fn remove(&self, _id: Option<Id>, _params: Params) -> Result<Value> {
        Err(unsupported(ServiceMethod::Remove))
    }

    /// Non-standard operations. Forwarded as-is, without hooks.
    async fn custom(&self, name: &str, _data: Value, _params: Params) -> Result<Value> {
        Err(ServiceError::method_not_allowed(format!(
            "Method `{name}` is not supported by this endpoint."
        )))
    }
}

/// A registered, hook-wrapped service as seen from inside another service.
#[async_trait]
pub trait ServiceHandle: Send + Sync {
    /// Service path without leading or trailing slashes.
    fn path(&self) -> &str;

    /// Call a standard method through the full hook pipeline.
    async fn call(&self, method: ServiceMethod, args: MethodArgs) -> Result<Value>;

    /// Emit a custom event from this service.
    fn emit(&self, event: &str, payload: Value);
}

/// Lookup of registered services, passed to [`Service::setup`].
pub trait ServiceHost: Send + Sync {
    /// # Errors
    ///
    /// Returns a `NotFound` error if no service is registered at `path`.
    fn lookup(&self, path: &str) -> Result<Arc<dyn ServiceHandle>>;
}

/// Call the raw service method matching `method`, spreading `args` into its
/// positional parameters.
///
/// # Errors
///
/// Returns `BadRequest` when a required argument is absent, otherwise
/// whatever the service returns.
pub async fn invoke(
    service: &dyn Service,
    method: ServiceMethod,
    args: MethodArgs,
) -> Result<Value> {
    trace!(method = %method, "Invoking service method");
    let params = args.params.unwrap_or_default();
    match method {
        ServiceMethod::Find => service.find(params).await,
        ServiceMethod::Get => {
            let id = args.id.ok_or_else(|| {
                ServiceError::bad_request("An id must be provided to the 'get' method")
            })?;
            service.get(id, params).await
        }
        ServiceMethod::Create => service.create(required_data(method, args.data)?, params).await,
        ServiceMethod::Update => {
            service
                .update(args.id, required_data(method, args.data)?, params)
                .await
        }
        ServiceMethod::Patch => {
            service
                .patch(args.id, required_data(method, args.data)?, params)
                .await
        }
        ServiceMethod::Remove => service.remove(args.id, params).await,
    }
}

fn required_data(method: ServiceMethod, data: Option<Value>) -> Result<Value> {
    data.ok_or_else(|| {
        ServiceError::bad_request(format!(
            "A data object must be provided to the '{method}' method"
        ))
    })
}

fn unsupported(method: ServiceMethod) -> ServiceError {
    ServiceError::method_not_allowed(format!(
        "Method `{method}` is not supported by this endpoint."
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use plume_core::ErrorKind;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl Service for Echo {
        fn capabilities(&self) -> ServiceCapabilities {
            ServiceCapabilities::of(&[ServiceMethod::Get, ServiceMethod::Create])
        }

        async fn get(&self, id: Id, _params: Params) -> Result<Value> {
            Ok(json!({ "id": id.to_value() }))
        }

        async fn create(&self, data: Value, _params: Params) -> Result<Value> {
            Ok(data)
        }
    }

    // Compile-time test that the traits are object-safe
    fn _assert_service_object_safe(_: &dyn Service) {}
    fn _assert_host_object_safe(_: &dyn ServiceHost) {}
    fn _assert_handle_object_safe(_: &dyn ServiceHandle) {}

    #[tokio::test]
    async fn test_invoke_spreads_arguments() {
        let service = Echo;
        let result = invoke(&service, ServiceMethod::Get, MethodArgs::get(10, None))
            .await
            .unwrap();
        assert_eq!(result, json!({"id": 10}));

        let result = invoke(
            &service,
            ServiceMethod::Create,
            MethodArgs::create(json!({"text": "hi"}), None),
        )
        .await
        .unwrap();
        assert_eq!(result, json!({"text": "hi"}));
    }

    #[tokio::test]
    async fn test_default_methods_are_not_allowed() {
        let err = invoke(&Echo, ServiceMethod::Remove, MethodArgs::remove(None, None))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MethodNotAllowed);

        let err = Echo
            .custom("archive", json!({}), Params::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MethodNotAllowed);
    }
}
