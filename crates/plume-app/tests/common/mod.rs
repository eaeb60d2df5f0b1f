#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

use async_trait::async_trait;
use plume_core::{Id, Params, Result, ServiceError, ServiceMethod};
use plume_service::{Service, ServiceCapabilities};
use serde_json::{Value, json};

/// In-memory service keyed by numeric id. Array payloads to `create` are
/// created one by one.
pub struct MemoryService {
    store: Mutex<BTreeMap<i64, Value>>,
    next_id: AtomicI64,
    calls: AtomicUsize,
    events: Vec<String>,
}

impl MemoryService {
    pub fn new() -> Self {
        Self {
            store: Mutex::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
            calls: AtomicUsize::new(0),
            events: Vec::new(),
        }
    }

    pub fn with_events(mut self, events: &[&str]) -> Self {
        self.events = events.iter().map(|e| e.to_string()).collect();
        self
    }

    /// Number of times any service method ran.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn create_one(&self, mut data: Value) -> Value {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        data["id"] = json!(id);
        self.store.lock().unwrap().insert(id, data.clone());
        data
    }

    fn numeric(id: &Id) -> Result<i64> {
        match id {
            Id::Number(n) => Ok(*n),
            Id::String(s) => s
                .parse()
                .map_err(|_| ServiceError::not_found(format!("No record found for id '{s}'"))),
        }
    }

    fn tick(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Service for MemoryService {
    fn capabilities(&self) -> ServiceCapabilities {
        ServiceCapabilities::all()
    }

    fn events(&self) -> Vec<String> {
        self.events.clone()
    }

    async fn find(&self, params: Params) -> Result<Value> {
        self.tick();
        let store = self.store.lock().unwrap();
        let records = store
            .values()
            .filter(|record| {
                params
                    .query
                    .iter()
                    .all(|(key, value)| record.get(key) == Some(value))
            })
            .cloned()
            .collect();
        Ok(Value::Array(records))
    }

    async fn get(&self, id: Id, _params: Params) -> Result<Value> {
        self.tick();
        let key = Self::numeric(&id)?;
        self.store
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .ok_or_else(|| ServiceError::not_found(format!("No record found for id '{id}'")))
    }

    async fn create(&self, data: Value, _params: Params) -> Result<Value> {
        self.tick();
        match data {
            Value::Array(items) => Ok(Value::Array(
                items.into_iter().map(|item| self.create_one(item)).collect(),
            )),
            item => Ok(self.create_one(item)),
        }
    }

    async fn update(&self, id: Option<Id>, mut data: Value, _params: Params) -> Result<Value> {
        self.tick();
        let id = id.ok_or_else(|| ServiceError::bad_request("Multi update not supported"))?;
        let key = Self::numeric(&id)?;
        data["id"] = json!(key);
        self.store.lock().unwrap().insert(key, data.clone());
        Ok(data)
    }

    async fn patch(&self, id: Option<Id>, data: Value, _params: Params) -> Result<Value> {
        self.tick();
        let id = id.ok_or_else(|| ServiceError::bad_request("Multi patch not supported"))?;
        let key = Self::numeric(&id)?;
        let mut store = self.store.lock().unwrap();
        let record = store
            .get_mut(&key)
            .ok_or_else(|| ServiceError::not_found(format!("No record found for id '{id}'")))?;
        if let (Value::Object(target), Value::Object(changes)) = (record, data) {
            target.extend(changes);
        }
        Ok(store.get(&key).cloned().unwrap_or(Value::Null))
    }

    async fn remove(&self, id: Option<Id>, _params: Params) -> Result<Value> {
        self.tick();
        let mut store = self.store.lock().unwrap();
        match id {
            Some(id) => {
                let key = Self::numeric(&id)?;
                store.remove(&key).ok_or_else(|| {
                    ServiceError::not_found(format!("No record found for id '{id}'"))
                })
            }
            None => {
                let removed: Vec<Value> = std::mem::take(&mut *store).into_values().collect();
                Ok(Value::Array(removed))
            }
        }
    }
}

/// Service that only echoes `create` payloads back.
pub struct EchoService;

#[async_trait]
impl Service for EchoService {
    fn capabilities(&self) -> ServiceCapabilities {
        ServiceCapabilities::of(&[ServiceMethod::Create])
    }

    async fn create(&self, data: Value, _params: Params) -> Result<Value> {
        Ok(data)
    }
}

/// Service whose every method fails with a general error.
pub struct FailingService {
    pub message: &'static str,
}

#[async_trait]
impl Service for FailingService {
    fn capabilities(&self) -> ServiceCapabilities {
        ServiceCapabilities::of(&[ServiceMethod::Get, ServiceMethod::Create])
    }

    async fn get(&self, _id: Id, _params: Params) -> Result<Value> {
        Err(ServiceError::general(self.message))
    }

    async fn create(&self, _data: Value, _params: Params) -> Result<Value> {
        Err(ServiceError::general(self.message))
    }
}
