mod common;

use std::sync::{Arc, Mutex};

use assert_json_diff::assert_json_eq;
use async_trait::async_trait;
use common::MemoryService;
use plume_app::prelude::*;
use serde_json::{Value, json};

fn push(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> HookRef {
    let log = log.clone();
    named_sync_hook(name, move |_| {
        log.lock().unwrap().push(name);
        Ok(())
    })
}

#[tokio::test]
async fn test_app_and_service_hook_order() {
    let app = Application::new();
    let log = Arc::new(Mutex::new(Vec::new()));

    app.hooks(
        HookMap::new()
            .before_all(push(&log, "app before"))
            .after_all(push(&log, "app after")),
    )
    .unwrap();
    let todos = app.use_service("todos", MemoryService::new()).unwrap();
    todos
        .hooks(
            HookMap::new()
                .before(ServiceMethod::Create, push(&log, "service before create"))
                .before_all(push(&log, "service before all"))
                .after_all(push(&log, "service after all"))
                .after(ServiceMethod::Create, push(&log, "service after create")),
        )
        .unwrap();

    todos.create(json!({"text": "a"}), None).await.unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "app before",
            "service before all",
            "service before create",
            "service after all",
            "service after create",
            "app after",
        ]
    );
}

#[tokio::test]
async fn test_before_hook_short_circuits_service_call() {
    let app = Application::new();
    let memory = Arc::new(MemoryService::new());
    let todos = app.use_arc("todos", memory.clone()).unwrap();
    todos
        .hooks(HookMap::new().before(
            ServiceMethod::Get,
            sync_hook(|ctx| {
                ctx.result = Some(json!({"id": ctx.id().map(Id::to_value), "cached": true}));
                Ok(())
            }),
        ))
        .unwrap();

    let result = todos.get(7, None).await.unwrap();
    assert_json_eq!(result, json!({"id": 7, "cached": true}));
    assert_eq!(memory.calls(), 0);
}

#[tokio::test]
async fn test_hooks_modify_params_and_query() {
    let app = Application::new();
    let todos = app.use_service("todos", MemoryService::new()).unwrap();
    todos.create(json!({"owner": 1, "text": "mine"}), None).await.unwrap();
    todos.create(json!({"owner": 2, "text": "theirs"}), None).await.unwrap();
    todos
        .hooks(HookMap::new().before(ServiceMethod::Find, query_with_user_id("owner", "id")))
        .unwrap();

    let params = Params::external("rest").with_user(json!({"id": 1}));
    let found = todos.find(Some(params)).await.unwrap();
    assert_json_eq!(found, json!([{"owner": 1, "text": "mine", "id": 1}]));

    let err = todos.find(Some(Params::external("rest"))).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotAuthenticated);
}

#[tokio::test]
async fn test_wrapping_twice_does_not_duplicate_hooks() {
    let app = Application::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    let todos = app.use_service("todos", MemoryService::new()).unwrap();
    todos
        .hooks(HookMap::new().before_all(push(&log, "once")))
        .unwrap();

    let again = app.use_hooked(todos.clone());
    again.find(None).await.unwrap();

    assert_eq!(*log.lock().unwrap(), vec!["once"]);
    assert_eq!(again.registry().len(), 1);
}

#[tokio::test]
async fn test_hooks_for_unknown_method_are_rejected() {
    let app = Application::new();
    let echo = app.use_service("echo", common::EchoService).unwrap();

    let err = echo
        .hooks(HookMap::new().before(ServiceMethod::Remove, sync_hook(|_| Ok(()))))
        .unwrap_err();
    assert!(err.message().contains("'remove'"));

    assert!(
        echo.registry()
            .register_named("before", "destroy", sync_hook(|_| Ok(())))
            .is_err()
    );
}

#[tokio::test]
async fn test_setup_runs_in_registration_order() {
    struct Recorder {
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Service for Recorder {
        fn capabilities(&self) -> ServiceCapabilities {
            ServiceCapabilities::of(&[ServiceMethod::Find])
        }

        async fn setup(&self, host: &dyn ServiceHost, path: &str) -> Result<()> {
            // Other services are reachable during setup.
            host.lookup("first")?;
            self.log.lock().unwrap().push(path.to_string());
            Ok(())
        }

        async fn find(&self, _params: Params) -> Result<Value> {
            Ok(json!([]))
        }
    }

    let log = Arc::new(Mutex::new(Vec::new()));
    let app = Application::new();
    app.use_service("first", Recorder { log: log.clone() }).unwrap();
    app.use_service("second", Recorder { log: log.clone() }).unwrap();
    app.setup().await.unwrap();

    assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
}
