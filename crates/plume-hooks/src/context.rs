//! The mutable record threaded through one service-method invocation.

use std::str::FromStr;
use std::sync::Arc;

use plume_core::{Id, Params, ServiceError, ServiceMethod, generate_id};
use plume_service::{MethodArgs, ServiceHost};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Phase of the pipeline a hook runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookType {
    Before,
    After,
    Error,
    Finally,
}

impl HookType {
    pub const ALL: [HookType; 4] = [
        HookType::Before,
        HookType::After,
        HookType::Error,
        HookType::Finally,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HookType::Before => "before",
            HookType::After => "after",
            HookType::Error => "error",
            HookType::Finally => "finally",
        }
    }
}

impl std::fmt::Display for HookType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for HookType {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ServiceError::general(format!("'{s}' is not a valid hook type")))
    }
}

/// Where in the pipeline a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    /// Malformed call arguments.
    Validation,
    /// A `before` hook failed.
    BeforeHook,
    /// The underlying service method failed.
    Method,
    /// An `after` hook failed.
    AfterHook,
    /// An `error` hook raised while handling an earlier failure.
    ErrorHook,
    /// A `finally` hook failed.
    FinallyHook,
}

/// Context of one in-flight service call.
///
/// `method`, `path`, and `id` are fixed at creation. Everything else is open
/// to hooks. Setting `result` (or `dispatch`) in a `before` hook skips the
/// underlying service call; setting it in an `error` hook turns the failure
/// into a success.
#[derive(Clone)]
pub struct HookContext {
    method: ServiceMethod,
    path: String,
    id: Option<Id>,
    hook_type: HookType,
    invocation_id: String,
    app: Option<Arc<dyn ServiceHost>>,
    original: Option<Arc<HookContext>>,
    failure_stage: Option<FailureStage>,
    pub params: Params,
    pub data: Option<Value>,
    pub result: Option<Value>,
    /// Safe projection of `result` sent to external consumers instead of it.
    pub dispatch: Option<Value>,
    /// Only set while `hook_type` is `Error` (and afterwards in `finally`).
    pub error: Option<ServiceError>,
    pub status_code: Option<u16>,
    /// Event emitted on success. `None` suppresses emission.
    pub event: Option<String>,
    /// Free-form values hooks attach for later hooks or event listeners.
    pub extra: Map<String, Value>,
}

impl HookContext {
    /// Build the context of a call from its normalised arguments.
    pub fn new(path: impl Into<String>, method: ServiceMethod, args: MethodArgs) -> Self {
        Self {
            method,
            path: path.into(),
            id: args.id,
            hook_type: HookType::Before,
            invocation_id: generate_id(),
            app: None,
            original: None,
            failure_stage: None,
            params: args.params.unwrap_or_default(),
            data: args.data,
            result: None,
            dispatch: None,
            error: None,
            status_code: None,
            event: method.event_name().map(str::to_string),
            extra: Map::new(),
        }
    }

    /// Attach the application the call runs in.
    pub fn with_app(mut self, app: Arc<dyn ServiceHost>) -> Self {
        self.app = Some(app);
        self
    }

    pub fn method(&self) -> ServiceMethod {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn id(&self) -> Option<&Id> {
        self.id.as_ref()
    }

    pub fn hook_type(&self) -> HookType {
        self.hook_type
    }

    /// Unique id of this invocation, used to correlate log lines.
    pub fn invocation_id(&self) -> &str {
        &self.invocation_id
    }

    /// Application the call runs in, for calling other services.
    pub fn app(&self) -> Option<&Arc<dyn ServiceHost>> {
        self.app.as_ref()
    }

    /// Snapshot of the context as it was when the call failed.
    pub fn original(&self) -> Option<&HookContext> {
        self.original.as_deref()
    }

    pub fn failure_stage(&self) -> Option<FailureStage> {
        self.failure_stage
    }

    /// Move the context into another phase. Called by the pipeline driver.
    pub fn enter_phase(&mut self, hook_type: HookType) {
        self.hook_type = hook_type;
    }

    /// Divert the context into the error phase.
    ///
    /// Keeps a copy of the context as it is right now in `original`, so error
    /// hooks can tell which phase failed and what it had computed. `result`
    /// and `dispatch` start out empty in the error phase; setting either one
    /// recovers the call.
    pub fn fail(&mut self, error: ServiceError, stage: FailureStage) {
        let mut snapshot = self.clone();
        snapshot.original = None;
        self.original = Some(Arc::new(snapshot));
        self.result = None;
        self.dispatch = None;
        self.hook_type = HookType::Error;
        self.error = Some(error);
        self.failure_stage = Some(stage);
    }

    /// Replace the error while already in the error phase.
    pub fn replace_error(&mut self, error: ServiceError, stage: FailureStage) {
        self.error = Some(error);
        self.failure_stage = Some(stage);
    }

    /// True once `result` or `dispatch` has been set.
    pub fn has_result(&self) -> bool {
        self.result.is_some() || self.dispatch.is_some()
    }

    /// What the caller receives: `dispatch` if set, otherwise `result`.
    pub fn response(&self) -> Option<&Value> {
        self.dispatch.as_ref().or(self.result.as_ref())
    }

    /// Arguments for the raw service call, drawn back out of the context.
    pub fn to_args(&self) -> MethodArgs {
        MethodArgs {
            id: self.id.clone(),
            data: self.data.clone(),
            params: Some(self.params.clone()),
        }
    }

    pub fn suppress_event(&mut self) {
        self.event = None;
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.extra.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    /// Context for one element of a batch result.
    pub fn for_element(&self, element: Value) -> HookContext {
        let mut ctx = self.element_template();
        ctx.result = Some(element);
        ctx
    }

    /// Contexts for every element of a batch result, in order.
    pub fn for_elements<'a>(
        &'a self,
        elements: &'a [Value],
    ) -> impl Iterator<Item = HookContext> + 'a {
        let template = self.element_template();
        elements.iter().map(move |element| {
            let mut ctx = template.clone();
            ctx.result = Some(element.clone());
            ctx
        })
    }

    /// Copy of the call without its batch payloads (`data`, `result`,
    /// `dispatch` and `original`).
    fn element_template(&self) -> HookContext {
        HookContext {
            method: self.method,
            path: self.path.clone(),
            id: self.id.clone(),
            hook_type: self.hook_type,
            invocation_id: self.invocation_id.clone(),
            app: self.app.clone(),
            original: None,
            failure_stage: self.failure_stage,
            params: self.params.clone(),
            data: None,
            result: None,
            dispatch: None,
            error: self.error.clone(),
            status_code: self.status_code,
            event: self.event.clone(),
            extra: self.extra.clone(),
        }
    }

    pub(crate) fn frame(&self) -> CallFrame {
        CallFrame {
            method: self.method,
            path: self.path.clone(),
            id: self.id.clone(),
            hook_type: self.hook_type,
            invocation_id: self.invocation_id.clone(),
            app: self.app.clone(),
            original: self.original.clone(),
            failure_stage: self.failure_stage,
            error: self.error.clone(),
        }
    }

    /// Carry the call's own state over after a hook swapped the context.
    ///
    /// A replacement must describe the same call: same method, path and id.
    /// One that does not is rejected, and the call keeps its own identity.
    pub(crate) fn restore_frame(&mut self, frame: CallFrame) -> Result<(), String> {
        let foreign = self.method != frame.method || self.path != frame.path || self.id != frame.id;
        if !foreign && self.invocation_id == frame.invocation_id {
            return Ok(());
        }
        let rejection = foreign.then(|| {
            format!(
                "replaced the context of '{}.{}' (id {:?}) with one for '{}.{}' (id {:?})",
                frame.path, frame.method, frame.id, self.path, self.method, self.id
            )
        });

        self.method = frame.method;
        self.path = frame.path;
        self.id = frame.id;
        self.invocation_id = frame.invocation_id;
        self.hook_type = frame.hook_type;
        self.original = frame.original;
        self.failure_stage = frame.failure_stage;
        if self.error.is_none() {
            self.error = frame.error;
        }
        if self.app.is_none() {
            self.app = frame.app;
        }
        rejection.map_or(Ok(()), Err)
    }
}

/// The parts of a context that belong to the call rather than to its hooks.
pub(crate) struct CallFrame {
    method: ServiceMethod,
    path: String,
    id: Option<Id>,
    hook_type: HookType,
    invocation_id: String,
    app: Option<Arc<dyn ServiceHost>>,
    original: Option<Arc<HookContext>>,
    failure_stage: Option<FailureStage>,
    error: Option<ServiceError>,
}

impl std::fmt::Debug for HookContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookContext")
            .field("path", &self.path)
            .field("method", &self.method)
            .field("type", &self.hook_type)
            .field("id", &self.id)
            .field("params", &self.params)
            .field("data", &self.data)
            .field("result", &self.result)
            .field("dispatch", &self.dispatch)
            .field("error", &self.error)
            .field("status_code", &self.status_code)
            .field("event", &self.event)
            .field("failure_stage", &self.failure_stage)
            .finish_non_exhaustive()
    }
}
