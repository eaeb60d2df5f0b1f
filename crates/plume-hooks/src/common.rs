//! Ready-made hooks for authentication and data shaping.
//!
//! ```ignore
//! users.hooks(
//!     HookMap::new()
//!         .before(ServiceMethod::Find, require_auth())
//!         .before(ServiceMethod::Create, [lowercase_email(), hash_password("password", hasher)])
//!         .after_all(discard(["password"])),
//! )?;
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use plume_core::{Id, Params, Paginated, Result, ServiceError};
use serde_json::{Map, Value};
use tracing::debug;

use crate::context::{HookContext, HookType};
use crate::hook::{Hook, HookRef, named_sync_hook};

/// Hashes passwords for [`hash_password`]. The algorithm is up to the
/// application.
#[async_trait]
pub trait PasswordHasher: Send + Sync {
    async fn hash(&self, password: &str) -> Result<String>;
}

/// Id of the authenticated user (`id`, falling back to `_id`).
pub fn current_user_id(params: &Params) -> Option<&Value> {
    params
        .user_field("id")
        .or_else(|| params.user_field("_id"))
}

/// Rejects external calls without an authenticated user.
///
/// Internal calls (no `provider`) always pass.
pub fn require_auth() -> HookRef {
    named_sync_hook("require_auth", |ctx| {
        if ctx.params.is_internal() || ctx.params.user.is_some() {
            return Ok(());
        }
        Err(ServiceError::not_authenticated("You are not authenticated."))
    })
}

/// Rejects every call.
pub fn stop() -> HookRef {
    named_sync_hook("stop", |ctx| {
        Err(ServiceError::forbidden(format!(
            "Method '{}' on '{}' is not allowed",
            ctx.method(),
            ctx.path()
        )))
    })
}

/// Replaces `data[field]` with its hash, for each record of an array payload
/// too. Records without the field are left alone.
pub fn hash_password(field: impl Into<String>, hasher: Arc<dyn PasswordHasher>) -> HookRef {
    Arc::new(HashPassword {
        field: field.into(),
        hasher,
    })
}

struct HashPassword {
    field: String,
    hasher: Arc<dyn PasswordHasher>,
}

impl HashPassword {
    async fn hash_record(&self, record: &mut Value) -> Result<()> {
        let Some(password) = record.get(&self.field) else {
            return Ok(());
        };
        let password = password.as_str().ok_or_else(|| {
            ServiceError::bad_request(format!("'{}' must be a string", self.field))
        })?;
        let hashed = self.hasher.hash(password).await?;
        record[self.field.as_str()] = Value::String(hashed);
        Ok(())
    }
}

#[async_trait]
impl Hook for HashPassword {
    fn name(&self) -> &str {
        "hash_password"
    }

    async fn run(&self, ctx: &mut HookContext) -> Result<()> {
        if ctx.hook_type() != HookType::Before {
            return Err(ServiceError::general(
                "The 'hash_password' hook should only be used as a 'before' hook.",
            ));
        }
        match ctx.data.as_mut() {
            Some(Value::Array(records)) => {
                for record in records {
                    self.hash_record(record).await?;
                }
                Ok(())
            }
            Some(record) => self.hash_record(record).await,
            None => Ok(()),
        }
    }
}

/// Lowercases `data.email` when it is a string.
pub fn lowercase_email() -> HookRef {
    named_sync_hook("lowercase_email", |ctx| {
        for_each_record(ctx.data.as_mut(), |record| {
            if let Some(Value::String(email)) = record.get_mut("email") {
                *email = email.to_lowercase();
            }
            Ok(())
        })
    })
}

/// Copies the authenticated user's id into `data[field]` unless already set.
pub fn set_user_id(field: impl Into<String>) -> HookRef {
    let field = field.into();
    named_sync_hook("set_user_id", move |ctx| {
        let Some(user_id) = current_user_id(&ctx.params).cloned() else {
            if ctx.params.is_internal() {
                return Ok(());
            }
            return Err(ServiceError::not_authenticated(
                "There is no current user to associate.",
            ));
        };
        for_each_record(ctx.data.as_mut(), |record| {
            if let Value::Object(map) = record {
                map.entry(field.clone()).or_insert_with(|| user_id.clone());
            }
            Ok(())
        })
    })
}

/// Drops `data.admin` unless the authenticated user is an admin.
pub fn require_admin_to_set_admin() -> HookRef {
    named_sync_hook("require_admin_to_set_admin", |ctx| {
        if ctx.params.is_internal() || ctx.params.user_is_admin() {
            return Ok(());
        }
        for_each_record(ctx.data.as_mut(), |record| {
            if let Value::Object(map) = record {
                map.remove("admin");
            }
            Ok(())
        })
    })
}

/// Restricts non-admin external callers to their own record.
///
/// Adds `query[id_field] = <user id>` and rejects calls addressing another
/// record by id.
pub fn restrict_to_self(id_field: impl Into<String>) -> HookRef {
    let id_field = id_field.into();
    named_sync_hook("restrict_to_self", move |ctx| {
        if ctx.params.is_internal() || ctx.params.user_is_admin() {
            return Ok(());
        }
        let user_id = current_user_id(&ctx.params)
            .cloned()
            .ok_or_else(|| ServiceError::not_authenticated("You are not authenticated."))?;

        if let Some(id) = ctx.id() {
            if Id::from_value(&user_id).as_ref() != Some(id) {
                return Err(ServiceError::forbidden(
                    "You do not have the permissions to access this.",
                ));
            }
        }
        ctx.params.query.insert(id_field.clone(), user_id);
        Ok(())
    })
}

/// Adds the authenticated user's `user_field` to the query as `id_in_db`.
pub fn query_with_user_id(id_in_db: impl Into<String>, user_field: impl Into<String>) -> HookRef {
    let id_in_db = id_in_db.into();
    let user_field = user_field.into();
    named_sync_hook("query_with_user_id", move |ctx| {
        match ctx.params.user_field(&user_field).cloned() {
            Some(value) => {
                ctx.params.query.insert(id_in_db.clone(), value);
                Ok(())
            }
            None if ctx.params.is_internal() => Ok(()),
            None => Err(ServiceError::not_authenticated(format!(
                "Current user is missing '{user_field}' field."
            ))),
        }
    })
}

/// Removes fields from what the caller sees.
///
/// In a `before` hook the fields are removed from `data`. Anywhere else
/// `dispatch` is set to the response without the fields, leaving `result`
/// intact for later hooks. Paginated envelopes are projected record by record.
pub fn discard<I, S>(fields: I) -> HookRef
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
    named_sync_hook("discard", move |ctx| {
        if ctx.hook_type() == HookType::Before {
            return for_each_record(ctx.data.as_mut(), |record| {
                strip(record, &fields);
                Ok(())
            });
        }
        let Some(response) = ctx.response().cloned() else {
            return Ok(());
        };
        ctx.dispatch = Some(project(response, &fields));
        Ok(())
    })
}

/// Logs the context at `debug`.
pub fn log() -> HookRef {
    named_sync_hook("log", |ctx| {
        debug!(
            path = %ctx.path(),
            method = %ctx.method(),
            phase = %ctx.hook_type(),
            id = ?ctx.id(),
            provider = ?ctx.params.provider,
            error = ?ctx.error,
            "Hook context"
        );
        Ok(())
    })
}

fn for_each_record<F>(data: Option<&mut Value>, mut f: F) -> Result<()>
where
    F: FnMut(&mut Value) -> Result<()>,
{
    match data {
        Some(Value::Array(records)) => records.iter_mut().try_for_each(f),
        Some(record) => f(record),
        None => Ok(()),
    }
}

fn project(response: Value, fields: &[String]) -> Value {
    if let Some(mut page) = Paginated::from_value(&response) {
        page.data.iter_mut().for_each(|record| strip(record, fields));
        return page.into_value();
    }
    match response {
        Value::Array(mut records) => {
            records.iter_mut().for_each(|record| strip(record, fields));
            Value::Array(records)
        }
        mut record => {
            strip(&mut record, fields);
            record
        }
    }
}

fn strip(record: &mut Value, fields: &[String]) {
    if let Value::Object(map) = record {
        retain_without(map, fields);
    }
}

fn retain_without(map: &mut Map<String, Value>, fields: &[String]) {
    map.retain(|key, _| !fields.iter().any(|f| f == key));
}
