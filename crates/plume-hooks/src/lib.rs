//! # plume-hooks
//!
//! Hook context, hook registry and the pipeline that runs hooks around
//! service calls.
//!
//! - [`HookContext`]: the mutable record of one call
//! - [`Hook`]: the asynchronous hook contract, plus closure adapters
//! - [`HookRegistry`]: ordered chains keyed by phase and method
//! - [`Pipeline`]: drives a call through `before`, the method, `after`,
//!   and `error` hooks
//! - [`common`]: ready-made authentication and data-shaping hooks

pub mod common;
pub mod context;
pub mod hook;
pub mod pipeline;
pub mod registry;

pub use context::{FailureStage, HookContext, HookType};
pub use hook::{
    FnHook, Hook, HookFuture, HookRef, IntoHooks, SyncHook, hook_fn, named_sync_hook, sync_hook,
};
pub use pipeline::{ChainRunner, Chains, Pipeline, PipelineState, Settled};
pub use registry::{HookMap, HookRegistry, HookTable, MethodSelector, compose};
