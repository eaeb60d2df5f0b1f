//! Registry and pipeline working together, without an application.

use assert_json_diff::assert_json_eq;
use plume_core::{ErrorKind, Result, ServiceError, ServiceMethod};
use plume_hooks::{
    Chains, FailureStage, HookContext, HookMap, HookRegistry, HookType, MethodSelector, Pipeline,
    PipelineState, sync_hook,
};
use plume_service::MethodArgs;
use serde_json::{Value, json};

fn counter_hook(expected: i64) -> plume_hooks::HookRef {
    sync_hook(move |ctx| {
        let current = ctx.get("counter").and_then(Value::as_i64).unwrap_or(0);
        if current != expected {
            return Err(ServiceError::general(format!(
                "expected counter {expected}, saw {current}"
            )));
        }
        ctx.set("counter", current + 1);
        Ok(())
    })
}

fn get_ctx() -> HookContext {
    HookContext::new("dummy", ServiceMethod::Get, MethodArgs::get("dishes", None))
}

async fn run(
    registry: &HookRegistry,
    ctx: HookContext,
    fail_with: Option<&str>,
) -> plume_hooks::Settled {
    let chains = Chains::resolve(None, &registry.snapshot(), ctx.method());
    let fail_with = fail_with.map(str::to_string);
    Pipeline::default()
        .execute(ctx, &chains, |args| async move {
            match fail_with {
                Some(message) => Err(ServiceError::general(message)),
                None => Ok(json!({ "id": args.id.map(|id| id.to_value()) })),
            }
        })
        .await
}

#[tokio::test]
async fn test_each_hook_observes_previous_mutations() {
    let registry = HookRegistry::new();
    registry
        .hooks(
            HookMap::new()
                .before_all([counter_hook(0), counter_hook(1)])
                .before(ServiceMethod::Get, [counter_hook(2), counter_hook(3)])
                .after(ServiceMethod::Get, counter_hook(4)),
        )
        .unwrap();

    let settled = run(&registry, get_ctx(), None).await;
    assert_eq!(settled.state, PipelineState::SettledSuccess);
    assert_eq!(settled.context.get("counter"), Some(&json!(5)));
    assert_json_eq!(settled.outcome.unwrap(), json!({"id": "dishes"}));
}

#[tokio::test]
async fn test_error_passthrough_keeps_message() {
    for (phase, stage) in [
        (HookType::Before, FailureStage::BeforeHook),
        (HookType::After, FailureStage::AfterHook),
    ] {
        let registry = HookRegistry::new();
        registry
            .register(
                phase,
                MethodSelector::All,
                sync_hook(|ctx| {
                    Err(ServiceError::bad_request(format!(
                        "{} failed",
                        ctx.hook_type()
                    )))
                }),
            )
            .unwrap();
        registry
            .register(HookType::Error, MethodSelector::All, sync_hook(|_| Ok(())))
            .unwrap();

        let settled = run(&registry, get_ctx(), None).await;
        assert_eq!(settled.context.failure_stage(), Some(stage));
        let err = settled.outcome.unwrap_err();
        assert_eq!(err.message(), format!("{phase} failed"));
    }

    let settled = run(&HookRegistry::new(), get_ctx(), Some("Something went wrong")).await;
    assert_eq!(settled.context.failure_stage(), Some(FailureStage::Method));
    assert_eq!(settled.outcome.unwrap_err().message(), "Something went wrong");
}

#[tokio::test]
async fn test_error_hook_swallows_failure() {
    let registry = HookRegistry::new();
    registry
        .register(
            HookType::Error,
            ServiceMethod::Get,
            sync_hook(|ctx| {
                ctx.result = Some(json!({"message": "I fixed it"}));
                Ok(())
            }),
        )
        .unwrap();

    let settled = run(&registry, get_ctx(), Some("Something went wrong")).await;
    assert!(settled.is_success());
    assert!(settled.context.error.is_none());
    assert_json_eq!(settled.outcome.unwrap(), json!({"message": "I fixed it"}));
}

#[tokio::test]
async fn test_null_result_recovers() {
    let registry = HookRegistry::new();
    registry
        .register(
            HookType::Error,
            MethodSelector::All,
            sync_hook(|ctx| {
                ctx.result = Some(Value::Null);
                Ok(())
            }),
        )
        .unwrap();

    let settled = run(&registry, get_ctx(), Some("gone")).await;
    assert_eq!(settled.outcome.unwrap(), Value::Null);
}

#[tokio::test]
async fn test_error_hook_sees_phase_of_failure() {
    let registry = HookRegistry::new();
    registry
        .register(
            HookType::After,
            MethodSelector::All,
            sync_hook(|ctx| {
                ctx.set("after_ran", true);
                Err(ServiceError::not_found("missing"))
            }),
        )
        .unwrap();
    registry
        .register(
            HookType::Error,
            MethodSelector::All,
            sync_hook(|ctx| {
                let original = ctx
                    .original()
                    .ok_or_else(|| ServiceError::general("no original"))?;
                assert_eq!(original.hook_type(), HookType::After);
                assert_eq!(original.get("after_ran"), Some(&json!(true)));
                assert_eq!(ctx.hook_type(), HookType::Error);
                Ok(())
            }),
        )
        .unwrap();

    let settled = run(&registry, get_ctx(), None).await;
    let err = settled.outcome.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_one_shot_error_hook_can_be_popped() -> Result<()> {
    let registry = HookRegistry::new();
    registry.register(
        HookType::Error,
        MethodSelector::All,
        sync_hook(|ctx| {
            ctx.result = Some(json!("recovered"));
            Ok(())
        }),
    )?;

    let settled = run(&registry, get_ctx(), Some("first")).await;
    assert_eq!(settled.outcome?, json!("recovered"));

    registry.pop(HookType::Error, MethodSelector::All);
    let settled = run(&registry, get_ctx(), Some("second")).await;
    assert_eq!(settled.outcome.unwrap_err().message(), "second");
    Ok(())
}
