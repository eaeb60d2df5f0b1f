//! Pipeline executor.
//!
//! [`Pipeline::execute`] drives one call through its states:
//!
//! ```text
//!  running-before ──(result set)──────────────┐
//!        │                                    ▼
//!        └──► running-method ──────────► running-after ──► settled-success
//!                    │                        │                  ▲
//!        (any failure, including validation)  │                  │ result set
//!                    ▼                        ▼                  │
//!               running-error ◄───────────────┘ ─────────────────┤
//!                    │                                           │
//!                    └──(no result)──► settled-failure           │
//! ```
//!
//! Hooks of one chain run strictly one after another against the same
//! context. The first failing `before`/`after` hook stops its chain. Error
//! hooks always run to the end of the chain: a failing error hook replaces the
//! error and the next error hook sees the replacement.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use plume_core::{Result, ServiceError, ServiceMethod};
use plume_service::MethodArgs;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::context::{FailureStage, HookContext, HookType};
use crate::hook::HookRef;
use crate::registry::{HookTable, compose};

/// States of one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    RunningBefore,
    RunningMethod,
    RunningAfter,
    RunningError,
    SettledSuccess,
    SettledFailure,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::RunningBefore => "running-before",
            PipelineState::RunningMethod => "running-method",
            PipelineState::RunningAfter => "running-after",
            PipelineState::RunningError => "running-error",
            PipelineState::SettledSuccess => "settled-success",
            PipelineState::SettledFailure => "settled-failure",
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            PipelineState::SettledSuccess | PipelineState::SettledFailure
        )
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The hook chains of one call, resolved from the registries when it starts.
#[derive(Clone, Default)]
pub struct Chains {
    pub before: Vec<HookRef>,
    pub after: Vec<HookRef>,
    pub error: Vec<HookRef>,
    pub finally: Vec<HookRef>,
}

impl Chains {
    /// Resolve every phase for `method`, merging application-wide hooks.
    pub fn resolve(app: Option<&HookTable>, service: &HookTable, method: ServiceMethod) -> Self {
        Self {
            before: compose(app, service, HookType::Before, method),
            after: compose(app, service, HookType::After, method),
            error: compose(app, service, HookType::Error, method),
            finally: compose(app, service, HookType::Finally, method),
        }
    }

    pub fn get(&self, hook_type: HookType) -> &[HookRef] {
        match hook_type {
            HookType::Before => &self.before,
            HookType::After => &self.after,
            HookType::Error => &self.error,
            HookType::Finally => &self.finally,
        }
    }
}

/// Runs a chain of hooks in order against one context.
#[derive(Debug, Clone, Default)]
pub struct ChainRunner {
    slow_hook_warn: Option<Duration>,
}

impl ChainRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log hooks that take longer than `threshold`. Nothing is cancelled.
    pub fn with_slow_hook_warning(mut self, threshold: Duration) -> Self {
        self.slow_hook_warn = (!threshold.is_zero()).then_some(threshold);
        self
    }

    /// Run `hooks` in order, stopping at the first failure.
    pub async fn run(&self, hooks: &[HookRef], ctx: &mut HookContext) -> Result<()> {
        for hook in hooks {
            self.run_one(hook, ctx).await?;
        }
        Ok(())
    }

    /// Run every hook of an error chain. A failing hook replaces `ctx.error`.
    pub async fn run_error_chain(&self, hooks: &[HookRef], ctx: &mut HookContext) {
        for hook in hooks {
            if let Err(e) = self.run_one(hook, ctx).await {
                debug!(
                    hook = %hook.name(),
                    kind = %e.kind(),
                    "Error hook replaced the error"
                );
                ctx.replace_error(e, FailureStage::ErrorHook);
            }
        }
    }

    async fn run_one(&self, hook: &HookRef, ctx: &mut HookContext) -> Result<()> {
        let frame = ctx.frame();
        let started = Instant::now();

        let outcome = AssertUnwindSafe(hook.run(ctx)).catch_unwind().await;

        let elapsed = started.elapsed();
        if let Some(threshold) = self.slow_hook_warn {
            if elapsed > threshold {
                warn!(
                    hook = %hook.name(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    threshold_ms = threshold.as_millis() as u64,
                    "Slow hook"
                );
            }
        }

        let result = match outcome {
            Ok(result) => result,
            Err(panic) => {
                let panic_msg = panic_message(panic.as_ref());
                error!(hook = %hook.name(), panic = %panic_msg, "Hook panicked");
                Err(ServiceError::general(format!(
                    "Hook '{}' panicked: {panic_msg}",
                    hook.name()
                )))
            }
        };

        // A hook may swap the whole context, but only for one of the same call.
        if let Err(reason) = ctx.restore_frame(frame) {
            return Err(ServiceError::general(format!("Hook '{}' {reason}", hook.name())));
        }

        result
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

/// Final context and outcome of a settled call.
#[derive(Debug)]
pub struct Settled {
    pub context: HookContext,
    pub state: PipelineState,
    pub outcome: Result<Value>,
}

impl Settled {
    pub fn is_success(&self) -> bool {
        self.state == PipelineState::SettledSuccess
    }
}

/// Drives calls through the before, method, after and error phases.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    runner: ChainRunner,
}

impl Pipeline {
    pub fn new(runner: ChainRunner) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> &ChainRunner {
        &self.runner
    }

    /// Run one call to a settled state.
    ///
    /// `call` performs the underlying service method with the arguments drawn
    /// back out of the context after the `before` hooks. It is not invoked
    /// when validation fails or a `before` hook set a result.
    pub async fn execute<F, Fut>(&self, mut ctx: HookContext, chains: &Chains, call: F) -> Settled
    where
        F: FnOnce(MethodArgs) -> Fut,
        Fut: Future<Output = Result<Value>>,
    {
        let mut call = Some(call);
        let mut state = PipelineState::RunningBefore;

        if let Err(e) = ctx.to_args().validate(ctx.method()) {
            ctx.fail(e, FailureStage::Validation);
            state = PipelineState::RunningError;
        }

        while !state.is_settled() {
            debug!(state = %state, "Pipeline transition");
            state = match state {
                PipelineState::RunningBefore => {
                    ctx.enter_phase(HookType::Before);
                    match self.runner.run(&chains.before, &mut ctx).await {
                        Ok(()) if ctx.has_result() => {
                            debug!("Result set in before hook, skipping service method");
                            PipelineState::RunningAfter
                        }
                        Ok(()) => PipelineState::RunningMethod,
                        Err(e) => self.divert(&mut ctx, e, FailureStage::BeforeHook),
                    }
                }
                PipelineState::RunningMethod => {
                    let outcome = match call.take() {
                        Some(call) => {
                            let args = ctx.to_args();
                            AssertUnwindSafe(async move { call(args).await })
                                .catch_unwind()
                                .await
                                .unwrap_or_else(|panic| {
                                    let panic_msg = panic_message(panic.as_ref());
                                    error!(panic = %panic_msg, "Service method panicked");
                                    Err(ServiceError::general(format!(
                                        "Service method '{}' panicked: {panic_msg}",
                                        ctx.method()
                                    )))
                                })
                        }
                        None => Err(ServiceError::general("Service method called twice")),
                    };
                    match outcome {
                        Ok(value) => {
                            ctx.result = Some(value);
                            PipelineState::RunningAfter
                        }
                        Err(e) => self.divert(&mut ctx, e, FailureStage::Method),
                    }
                }
                PipelineState::RunningAfter => {
                    ctx.enter_phase(HookType::After);
                    match self.runner.run(&chains.after, &mut ctx).await {
                        Ok(()) => PipelineState::SettledSuccess,
                        Err(e) => self.divert(&mut ctx, e, FailureStage::AfterHook),
                    }
                }
                PipelineState::RunningError => {
                    ctx.enter_phase(HookType::Error);
                    self.runner.run_error_chain(&chains.error, &mut ctx).await;
                    if ctx.has_result() {
                        debug!(stage = ?ctx.failure_stage(), "Error recovered by error hook");
                        ctx.error = None;
                        PipelineState::SettledSuccess
                    } else {
                        PipelineState::SettledFailure
                    }
                }
                settled => settled,
            };
        }

        let outcome = match state {
            PipelineState::SettledSuccess => Ok(ctx.response().cloned().unwrap_or(Value::Null)),
            _ => {
                let err = ctx
                    .error
                    .clone()
                    .unwrap_or_else(|| ServiceError::general("Call failed without an error"));
                warn!(
                    kind = %err.kind(),
                    stage = ?ctx.failure_stage(),
                    error = %err,
                    "Service call failed"
                );
                Err(err)
            }
        };

        Settled {
            context: ctx,
            state,
            outcome,
        }
    }

    /// Run the `finally` chain of a settled call.
    ///
    /// On success the caller receives the response as the `finally` hooks left
    /// it. A failing `finally` hook rejects the call with its own error; it
    /// does not enter the error chain.
    pub async fn finish(
        &self,
        settled: Settled,
        hooks: &[HookRef],
    ) -> (HookContext, Result<Value>) {
        let Settled {
            context: mut ctx,
            outcome,
            ..
        } = settled;
        if hooks.is_empty() {
            return (ctx, outcome);
        }

        ctx.enter_phase(HookType::Finally);
        if let Err(e) = self.runner.run(hooks, &mut ctx).await {
            warn!(kind = %e.kind(), error = %e, "Finally hook failed");
            ctx.replace_error(e.clone(), FailureStage::FinallyHook);
            return (ctx, Err(e));
        }

        let outcome = outcome.map(|_| ctx.response().cloned().unwrap_or(Value::Null));
        (ctx, outcome)
    }

    fn divert(
        &self,
        ctx: &mut HookContext,
        error: ServiceError,
        stage: FailureStage,
    ) -> PipelineState {
        debug!(kind = %error.kind(), stage = ?stage, "Diverting to error hooks");
        ctx.fail(error, stage);
        PipelineState::RunningError
    }
}
