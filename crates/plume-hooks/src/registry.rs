//! Per-service storage of ordered hook chains.
//!
//! Chains are keyed by `(phase, method)`, with [`MethodSelector::All`]
//! covering every method. The table lives behind an [`ArcSwap`]: calls take a
//! snapshot when they start, so registrations made while a call is in flight
//! only affect later calls.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use arc_swap::ArcSwap;
use plume_core::{Result, ServiceError, ServiceMethod};
use plume_service::ServiceCapabilities;
use tracing::debug;

use crate::context::HookType;
use crate::hook::{HookRef, IntoHooks};

/// Which methods a registration applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodSelector {
    /// Every method. These hooks run before method-specific ones.
    All,
    Method(ServiceMethod),
}

impl MethodSelector {
    pub fn as_str(&self) -> &'static str {
        match self {
            MethodSelector::All => "all",
            MethodSelector::Method(method) => method.as_str(),
        }
    }
}

impl From<ServiceMethod> for MethodSelector {
    fn from(method: ServiceMethod) -> Self {
        MethodSelector::Method(method)
    }
}

impl FromStr for MethodSelector {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "all" {
            return Ok(MethodSelector::All);
        }
        s.parse::<ServiceMethod>()
            .map(MethodSelector::Method)
            .map_err(|e| ServiceError::general(format!("Can not register hooks: {e}")))
    }
}

impl std::fmt::Display for MethodSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable snapshot of every registered chain.
#[derive(Clone, Default)]
pub struct HookTable {
    chains: HashMap<(HookType, MethodSelector), Vec<HookRef>>,
}

impl HookTable {
    /// Hooks to run for `method` in `hook_type`: the `all` hooks followed by
    /// the method's own hooks, each in registration order.
    pub fn chain(&self, hook_type: HookType, method: ServiceMethod) -> Vec<HookRef> {
        let all = self.chains.get(&(hook_type, MethodSelector::All));
        let own = self.chains.get(&(hook_type, MethodSelector::Method(method)));
        all.into_iter().chain(own).flatten().cloned().collect()
    }

    /// Hooks registered under exactly this key.
    pub fn registered(&self, hook_type: HookType, selector: MethodSelector) -> &[HookRef] {
        self.chains
            .get(&(hook_type, selector))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Total number of registered hooks.
    pub fn len(&self) -> usize {
        self.chains.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn append(&mut self, hook_type: HookType, selector: MethodSelector, hooks: &[HookRef]) {
        self.chains
            .entry((hook_type, selector))
            .or_default()
            .extend(hooks.iter().cloned());
    }

    fn pop(&mut self, hook_type: HookType, selector: MethodSelector) -> Option<HookRef> {
        self.chains.get_mut(&(hook_type, selector))?.pop()
    }
}

impl std::fmt::Debug for HookTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for ((hook_type, selector), hooks) in &self.chains {
            let names: Vec<&str> = hooks.iter().map(|h| h.name()).collect();
            map.entry(&format_args!("{hook_type}.{selector}"), &names);
        }
        map.finish()
    }
}

/// Hooks for several phases and methods, registered in one step.
///
/// ```ignore
/// service.hooks(
///     HookMap::new()
///         .before_all(require_auth())
///         .before(ServiceMethod::Create, hash_password("password", hasher))
///         .after_all(discard(["password"])),
/// )?;
/// ```
#[derive(Default)]
pub struct HookMap {
    entries: Vec<(HookType, MethodSelector, Vec<HookRef>)>,
}

impl HookMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        mut self,
        hook_type: HookType,
        selector: impl Into<MethodSelector>,
        hooks: impl IntoHooks,
    ) -> Self {
        self.entries
            .push((hook_type, selector.into(), hooks.into_hooks()));
        self
    }

    pub fn before_all(self, hooks: impl IntoHooks) -> Self {
        self.add(HookType::Before, MethodSelector::All, hooks)
    }

    pub fn before(self, method: ServiceMethod, hooks: impl IntoHooks) -> Self {
        self.add(HookType::Before, method, hooks)
    }

    pub fn after_all(self, hooks: impl IntoHooks) -> Self {
        self.add(HookType::After, MethodSelector::All, hooks)
    }

    pub fn after(self, method: ServiceMethod, hooks: impl IntoHooks) -> Self {
        self.add(HookType::After, method, hooks)
    }

    pub fn error_all(self, hooks: impl IntoHooks) -> Self {
        self.add(HookType::Error, MethodSelector::All, hooks)
    }

    pub fn error(self, method: ServiceMethod, hooks: impl IntoHooks) -> Self {
        self.add(HookType::Error, method, hooks)
    }

    pub fn finally_all(self, hooks: impl IntoHooks) -> Self {
        self.add(HookType::Finally, MethodSelector::All, hooks)
    }

    pub fn finally(self, method: ServiceMethod, hooks: impl IntoHooks) -> Self {
        self.add(HookType::Finally, method, hooks)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Registered hooks of one service, or of the application as a whole.
pub struct HookRegistry {
    table: ArcSwap<HookTable>,
    /// Methods hooks may be registered for. `None` accepts every method.
    capabilities: Option<ServiceCapabilities>,
}

impl HookRegistry {
    /// Registry accepting hooks for any method.
    pub fn new() -> Self {
        Self {
            table: ArcSwap::from_pointee(HookTable::default()),
            capabilities: None,
        }
    }

    /// Registry that rejects hooks for methods the service does not implement.
    pub fn for_service(capabilities: ServiceCapabilities) -> Self {
        Self {
            table: ArcSwap::from_pointee(HookTable::default()),
            capabilities: Some(capabilities),
        }
    }

    /// Append hooks to the chain for `hook_type` and `selector`.
    ///
    /// # Errors
    ///
    /// Fails without registering anything if `selector` names a method the
    /// service does not implement.
    pub fn register(
        &self,
        hook_type: HookType,
        selector: impl Into<MethodSelector>,
        hooks: impl IntoHooks,
    ) -> Result<()> {
        let selector = selector.into();
        self.check_selector(selector)?;
        let hooks = hooks.into_hooks();
        self.table.rcu(|current| {
            let mut next = HookTable::clone(current);
            next.append(hook_type, selector, &hooks);
            next
        });
        debug!(
            phase = %hook_type,
            method = %selector,
            count = hooks.len(),
            "Registered hooks"
        );
        Ok(())
    }

    /// Same as [`HookRegistry::register`] with the phase and method given by
    /// name, as in `register_named("before", "create", hooks)`.
    ///
    /// # Errors
    ///
    /// Fails on an unknown phase or method name.
    pub fn register_named(
        &self,
        hook_type: &str,
        selector: &str,
        hooks: impl IntoHooks,
    ) -> Result<()> {
        let hook_type: HookType = hook_type.parse()?;
        let selector: MethodSelector = selector.parse()?;
        self.register(hook_type, selector, hooks)
    }

    /// Register every entry of `map`. Nothing is registered if any entry is
    /// rejected.
    pub fn hooks(&self, map: HookMap) -> Result<()> {
        for (_, selector, _) in &map.entries {
            self.check_selector(*selector)?;
        }
        self.table.rcu(|current| {
            let mut next = HookTable::clone(current);
            for (hook_type, selector, hooks) in &map.entries {
                next.append(*hook_type, *selector, hooks);
            }
            next
        });
        debug!(entries = map.entries.len(), "Registered hook map");
        Ok(())
    }

    /// Remove the most recently registered hook under exactly this key.
    pub fn pop(&self, hook_type: HookType, selector: impl Into<MethodSelector>) -> Option<HookRef> {
        let selector = selector.into();
        let mut popped = None;
        self.table.rcu(|current| {
            let mut next = HookTable::clone(current);
            popped = next.pop(hook_type, selector);
            next
        });
        popped
    }

    /// Current table. Later registrations don't affect the returned snapshot.
    pub fn snapshot(&self) -> Arc<HookTable> {
        self.table.load_full()
    }

    pub fn chain(&self, hook_type: HookType, method: ServiceMethod) -> Vec<HookRef> {
        self.table.load().chain(hook_type, method)
    }

    pub fn len(&self) -> usize {
        self.table.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_selector(&self, selector: MethodSelector) -> Result<()> {
        match (selector, self.capabilities) {
            (MethodSelector::Method(method), Some(caps)) if !caps.contains(method) => {
                Err(ServiceError::general(format!(
                    "Can not register hooks for '{method}': the service does not implement it"
                )))
            }
            _ => Ok(()),
        }
    }
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("table", &self.table.load())
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

/// Combine application and service chains for one phase.
///
/// Application `before` hooks run first; in every other phase the service's
/// hooks run before the application's.
pub fn compose(
    app: Option<&HookTable>,
    service: &HookTable,
    hook_type: HookType,
    method: ServiceMethod,
) -> Vec<HookRef> {
    let own = service.chain(hook_type, method);
    let Some(app) = app else {
        return own;
    };
    let global = app.chain(hook_type, method);
    match hook_type {
        HookType::Before => global.into_iter().chain(own).collect(),
        _ => own.into_iter().chain(global).collect(),
    }
}
