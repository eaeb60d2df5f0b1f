//! Hook trait and closure adapters.
//!
//! Every hook follows one asynchronous contract: it receives the call's
//! [`HookContext`] by mutable reference, may change it in place (or replace
//! it wholesale with `*ctx = ...`), and signals failure by returning `Err`.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use plume_core::Result;

use crate::context::HookContext;

/// A function run before, after, or on error of a service call.
///
/// # Example
///
/// ```ignore
/// struct StampCreatedAt;
///
/// #[async_trait]
/// impl Hook for StampCreatedAt {
///     fn name(&self) -> &str { "stamp_created_at" }
///
///     async fn run(&self, ctx: &mut HookContext) -> Result<()> {
///         if let Some(data) = ctx.data.as_mut() {
///             data["createdAt"] = json!(now());
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Hook: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str {
        "anonymous"
    }

    async fn run(&self, ctx: &mut HookContext) -> Result<()>;
}

/// Shared handle to a registered hook.
pub type HookRef = Arc<dyn Hook>;

/// Future returned by closure hooks.
pub type HookFuture<'a> = BoxFuture<'a, Result<()>>;

/// Hook backed by an async closure.
pub struct FnHook<F> {
    name: String,
    f: F,
}

impl<F> FnHook<F>
where
    F: for<'a> Fn(&'a mut HookContext) -> HookFuture<'a> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

#[async_trait]
impl<F> Hook for FnHook<F>
where
    F: for<'a> Fn(&'a mut HookContext) -> HookFuture<'a> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &mut HookContext) -> Result<()> {
        (self.f)(ctx).await
    }
}

/// Hook backed by a plain closure that finishes without suspending.
pub struct SyncHook<F> {
    name: String,
    f: F,
}

impl<F> SyncHook<F>
where
    F: Fn(&mut HookContext) -> Result<()> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

#[async_trait]
impl<F> Hook for SyncHook<F>
where
    F: Fn(&mut HookContext) -> Result<()> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &mut HookContext) -> Result<()> {
        (self.f)(ctx)
    }
}

/// Wrap an async closure as a hook.
///
/// ```ignore
/// let hook = hook_fn(|ctx| Box::pin(async move {
///     ctx.params.insert("checked", true);
///     Ok(())
/// }));
/// ```
pub fn hook_fn<F>(f: F) -> HookRef
where
    F: for<'a> Fn(&'a mut HookContext) -> HookFuture<'a> + Send + Sync + 'static,
{
    Arc::new(FnHook::new("anonymous", f))
}

/// Wrap a synchronous closure as a hook.
pub fn sync_hook<F>(f: F) -> HookRef
where
    F: Fn(&mut HookContext) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(SyncHook::new("anonymous", f))
}

/// Same as [`sync_hook`] with a name for logs.
pub fn named_sync_hook<F>(name: impl Into<String>, f: F) -> HookRef
where
    F: Fn(&mut HookContext) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(SyncHook::new(name, f))
}

/// Anything that can be registered as an ordered list of hooks.
pub trait IntoHooks {
    fn into_hooks(self) -> Vec<HookRef>;
}

impl IntoHooks for HookRef {
    fn into_hooks(self) -> Vec<HookRef> {
        vec![self]
    }
}

impl IntoHooks for Vec<HookRef> {
    fn into_hooks(self) -> Vec<HookRef> {
        self
    }
}

impl<const N: usize> IntoHooks for [HookRef; N] {
    fn into_hooks(self) -> Vec<HookRef> {
        self.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plume_core::{ServiceError, ServiceMethod};
    use plume_service::MethodArgs;
    use serde_json::json;

    fn context() -> HookContext {
        HookContext::new("todos", ServiceMethod::Find, MethodArgs::find(None))
    }

    #[tokio::test]
    async fn test_async_closure_hook() {
        let hook = hook_fn(|ctx| {
            Box::pin(async move {
                tokio::task::yield_now().await;
                ctx.set("visited", true);
                Ok(())
            })
        });

        let mut ctx = context();
        hook.run(&mut ctx).await.unwrap();
        assert_eq!(ctx.get("visited"), Some(&json!(true)));
        assert_eq!(hook.name(), "anonymous");
    }

    #[tokio::test]
    async fn test_sync_closure_hook_error() {
        let hook = named_sync_hook("deny", |_ctx| Err(ServiceError::forbidden("denied")));

        let mut ctx = context();
        let err = hook.run(&mut ctx).await.unwrap_err();
        assert_eq!(err.message(), "denied");
        assert_eq!(hook.name(), "deny");
    }

    #[test]
    fn test_into_hooks() {
        let single: HookRef = sync_hook(|_| Ok(()));
        assert_eq!(single.into_hooks().len(), 1);

        let array = [sync_hook(|_| Ok(())), sync_hook(|_| Ok(()))];
        assert_eq!(array.into_hooks().len(), 2);
    }
}
