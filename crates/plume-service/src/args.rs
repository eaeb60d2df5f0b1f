//! Positional call arguments and their validation.

use plume_core::{Id, Params, ServiceError, ServiceMethod};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Arguments of one service call, normalised from the positional form.
///
/// `id` is `None` both for methods that take no id and for multi-record
/// `update`/`patch`/`remove` calls. `params` is `None` when the caller passed
/// none; [`MethodArgs::params_or_default`] turns that into an empty mapping.
///
/// Transports can deserialize calls straight into this type; absent fields
/// become `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MethodArgs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Id>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Params>,
}

impl MethodArgs {
    pub fn find(params: Option<Params>) -> Self {
        Self {
            params,
            ..Self::default()
        }
    }

    pub fn get(id: impl Into<Id>, params: Option<Params>) -> Self {
        Self {
            id: Some(id.into()),
            data: None,
            params,
        }
    }

    pub fn create(data: Value, params: Option<Params>) -> Self {
        Self {
            id: None,
            data: Some(data),
            params,
        }
    }

    pub fn update(id: Option<Id>, data: Value, params: Option<Params>) -> Self {
        Self {
            id,
            data: Some(data),
            params,
        }
    }

    pub fn patch(id: Option<Id>, data: Value, params: Option<Params>) -> Self {
        Self::update(id, data, params)
    }

    pub fn remove(id: Option<Id>, params: Option<Params>) -> Self {
        Self {
            id,
            data: None,
            params,
        }
    }

    pub fn params_or_default(&self) -> Params {
        self.params.clone().unwrap_or_default()
    }

    /// Checks the arguments against the method's signature.
    ///
    /// # Errors
    ///
    /// Returns a `BadRequest` error describing the first malformed argument.
    pub fn validate(&self, method: ServiceMethod) -> Result<(), ServiceError> {
        if let Some(id) = &self.id {
            if id.is_empty() {
                return Err(missing_id(method));
            }
        }

        match method {
            ServiceMethod::Find => Ok(()),
            ServiceMethod::Get => match self.id {
                Some(_) => Ok(()),
                None => Err(missing_id(method)),
            },
            ServiceMethod::Create | ServiceMethod::Patch => check_data(method, self.data.as_ref()),
            ServiceMethod::Update => {
                check_data(method, self.data.as_ref())?;
                let multi = self.data.as_ref().is_some_and(Value::is_array);
                if self.id.is_none() && !multi {
                    return Err(ServiceError::bad_request(
                        "You can not replace multiple instances. Did you mean 'patch'?",
                    ));
                }
                Ok(())
            }
            ServiceMethod::Remove => Ok(()),
        }
    }
}

fn missing_id(method: ServiceMethod) -> ServiceError {
    ServiceError::bad_request(format!("An id must be provided to the '{method}' method"))
}

fn check_data(method: ServiceMethod, data: Option<&Value>) -> Result<(), ServiceError> {
    match data {
        Some(Value::Object(_)) | Some(Value::Array(_)) => Ok(()),
        _ => Err(ServiceError::bad_request(format!(
            "A data object must be provided to the '{method}' method"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plume_core::ErrorKind;
    use serde_json::json;

    #[test]
    fn test_get_requires_id() {
        let args = MethodArgs {
            id: None,
            ..MethodArgs::default()
        };
        let err = args.validate(ServiceMethod::Get).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
        assert_eq!(err.message(), "An id must be provided to the 'get' method");

        assert!(MethodArgs::get("dishes", None).validate(ServiceMethod::Get).is_ok());
    }

    #[test]
    fn test_empty_string_id_rejected() {
        let err = MethodArgs::remove(Some(Id::from("")), None)
            .validate(ServiceMethod::Remove)
            .unwrap_err();
        assert_eq!(err.message(), "An id must be provided to the 'remove' method");
    }

    #[test]
    fn test_create_requires_object_or_array() {
        assert!(
            MethodArgs::create(json!({"text": "hi"}), None)
                .validate(ServiceMethod::Create)
                .is_ok()
        );
        assert!(
            MethodArgs::create(json!([{"text": "hi"}]), None)
                .validate(ServiceMethod::Create)
                .is_ok()
        );
        let err = MethodArgs::create(json!("hi"), None)
            .validate(ServiceMethod::Create)
            .unwrap_err();
        assert_eq!(
            err.message(),
            "A data object must be provided to the 'create' method"
        );
    }

    #[test]
    fn test_update_multi_requires_array() {
        let err = MethodArgs::update(None, json!({"text": "hi"}), None)
            .validate(ServiceMethod::Update)
            .unwrap_err();
        assert!(err.message().contains("Did you mean 'patch'?"));

        assert!(
            MethodArgs::update(None, json!([{"text": "hi"}]), None)
                .validate(ServiceMethod::Update)
                .is_ok()
        );
    }

    #[test]
    fn test_patch_and_remove_accept_null_id() {
        assert!(
            MethodArgs::patch(None, json!({"read": true}), None)
                .validate(ServiceMethod::Patch)
                .is_ok()
        );
        assert!(MethodArgs::remove(None, None).validate(ServiceMethod::Remove).is_ok());
    }

    #[test]
    fn test_deserialize_transport_call() {
        let args: MethodArgs =
            serde_json::from_value(json!({"id": 3, "data": {"read": true}})).unwrap();
        assert_eq!(args.id, Some(Id::from(3)));
        assert!(args.params.is_none());
        assert!(args.validate(ServiceMethod::Patch).is_ok());
    }

    #[test]
    fn test_params_default_to_empty() {
        let args = MethodArgs::find(None);
        assert_eq!(args.params_or_default(), Params::default());
    }
}
