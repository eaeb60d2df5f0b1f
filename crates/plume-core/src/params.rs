//! Call-time parameters and the paginated result envelope.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Pagination override passed with a call.
///
/// `Toggle(false)` disables pagination for the call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Paginate {
    Toggle(bool),
    Limits {
        #[serde(default)]
        default: Option<u64>,
        max: u64,
    },
}

/// Parameters of a single service call.
///
/// `provider` names the transport that made the call and is `None` for
/// internal (server side) calls. Anything that is not one of the known
/// fields lands in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Params {
    #[serde(default)]
    pub query: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paginate: Option<Paginate>,
    /// Authenticated user, populated by authentication hooks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub headers: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub route: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Params for a call arriving through the named transport.
    pub fn external(provider: impl Into<String>) -> Self {
        Self {
            provider: Some(provider.into()),
            ..Self::default()
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn with_user(mut self, user: Value) -> Self {
        self.user = Some(user);
        self
    }

    pub fn with_paginate(mut self, paginate: Paginate) -> Self {
        self.paginate = Some(paginate);
        self
    }

    /// Store arbitrary caller metadata.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.extra.insert(key.into(), value.into())
    }

    /// True for calls made from inside the application.
    pub fn is_internal(&self) -> bool {
        self.provider.is_none()
    }

    /// Reads a field of the authenticated user.
    pub fn user_field(&self, field: &str) -> Option<&Value> {
        self.user.as_ref().and_then(|user| user.get(field))
    }

    /// True when the authenticated user carries a truthy `admin` flag.
    pub fn user_is_admin(&self) -> bool {
        self.user_field("admin")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// Paginated result envelope returned by `find` when pagination is active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paginated {
    pub total: u64,
    pub limit: u64,
    pub skip: u64,
    pub data: Vec<Value>,
}

impl Paginated {
    pub fn new(total: u64, limit: u64, skip: u64, data: Vec<Value>) -> Self {
        Self {
            total,
            limit,
            skip,
            data,
        }
    }

    /// Detects the envelope shape on an arbitrary result value.
    pub fn is_paginated(value: &Value) -> bool {
        match value.as_object() {
            Some(obj) => {
                obj.get("data").is_some_and(Value::is_array)
                    && ["total", "limit", "skip"]
                        .iter()
                        .all(|key| obj.get(*key).is_some_and(Value::is_u64))
            }
            None => false,
        }
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        if !Self::is_paginated(value) {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }

    pub fn into_value(self) -> Value {
        serde_json::json!({
            "total": self.total,
            "limit": self.limit,
            "skip": self.skip,
            "data": self.data,
        })
    }
}
