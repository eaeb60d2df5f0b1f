//! The five standard service methods and their fixed metadata.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A standard CRUD-style service method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceMethod {
    Find,
    Get,
    Create,
    Update,
    Patch,
    Remove,
}

impl ServiceMethod {
    pub const ALL: [ServiceMethod; 6] = [
        ServiceMethod::Find,
        ServiceMethod::Get,
        ServiceMethod::Create,
        ServiceMethod::Update,
        ServiceMethod::Patch,
        ServiceMethod::Remove,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceMethod::Find => "find",
            ServiceMethod::Get => "get",
            ServiceMethod::Create => "create",
            ServiceMethod::Update => "update",
            ServiceMethod::Patch => "patch",
            ServiceMethod::Remove => "remove",
        }
    }

    /// Positional argument names of the method, in call order.
    pub fn arguments(&self) -> &'static [&'static str] {
        match self {
            ServiceMethod::Find => &["params"],
            ServiceMethod::Get => &["id", "params"],
            ServiceMethod::Create => &["data", "params"],
            ServiceMethod::Update => &["id", "data", "params"],
            ServiceMethod::Patch => &["id", "data", "params"],
            ServiceMethod::Remove => &["id", "params"],
        }
    }

    pub fn takes_id(&self) -> bool {
        self.arguments().contains(&"id")
    }

    pub fn takes_data(&self) -> bool {
        self.arguments().contains(&"data")
    }

    /// Name of the event emitted after a successful call, if the method mutates.
    pub fn event_name(&self) -> Option<&'static str> {
        match self {
            ServiceMethod::Create => Some("created"),
            ServiceMethod::Update => Some("updated"),
            ServiceMethod::Patch => Some("patched"),
            ServiceMethod::Remove => Some("removed"),
            ServiceMethod::Find | ServiceMethod::Get => None,
        }
    }
}

impl std::fmt::Display for ServiceMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Returned when a string does not name one of the standard methods.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{0}' is not a valid service method")]
pub struct ParseMethodError(pub String);

impl FromStr for ServiceMethod {
    type Err = ParseMethodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|method| method.as_str() == s)
            .ok_or_else(|| ParseMethodError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_methods() {
        for method in ServiceMethod::ALL {
            assert_eq!(method.as_str().parse::<ServiceMethod>(), Ok(method));
        }
        let err = "destroy".parse::<ServiceMethod>().unwrap_err();
        assert_eq!(err.to_string(), "'destroy' is not a valid service method");
    }

    #[test]
    fn test_event_names() {
        assert_eq!(ServiceMethod::Create.event_name(), Some("created"));
        assert_eq!(ServiceMethod::Update.event_name(), Some("updated"));
        assert_eq!(ServiceMethod::Patch.event_name(), Some("patched"));
        assert_eq!(ServiceMethod::Remove.event_name(), Some("removed"));
        assert_eq!(ServiceMethod::Find.event_name(), None);
        assert_eq!(ServiceMethod::Get.event_name(), None);
    }

    #[test]
    fn test_argument_table() {
        assert!(ServiceMethod::Get.takes_id());
        assert!(!ServiceMethod::Get.takes_data());
        assert!(ServiceMethod::Update.takes_id() && ServiceMethod::Update.takes_data());
        assert!(!ServiceMethod::Find.takes_id());
        assert_eq!(ServiceMethod::Create.arguments(), &["data", "params"]);
    }
}
