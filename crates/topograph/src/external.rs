//! References to things the declaration does not own
//!
//! Two kinds exist: external resources (looked up by name in the target
//! account, lifecycle managed elsewhere) and secret references (a name
//! handed to the engine's secret store; the value never enters the
//! declaration).

use crate::node::LogicalId;
use serde::Serialize;
use serde_json::{Value, json};

/// A resource presumed to already exist in the target account
///
/// Resolved by name at apply time; the apply fails if it does not exist.
/// The engine must not create, update or delete it, which is why externals
/// live outside the provisioned-resource list and can never be the target
/// of an ordering edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExternalRef {
    logical_id: LogicalId,
    /// What kind of thing the name resolves to (e.g. "iam-role")
    kind: String,
    /// The name looked up in the target account
    name: String,
}

impl ExternalRef {
    pub(crate) fn new(logical_id: LogicalId, kind: &str, name: &str) -> Self {
        Self {
            logical_id,
            kind: kind.to_string(),
            name: name.to_string(),
        }
    }

    pub fn logical_id(&self) -> &LogicalId {
        &self.logical_id
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Property value embedding this reference
    pub fn to_value(&self) -> Value {
        json!({ "external": self.logical_id.as_str() })
    }
}

/// A named reference into the engine's secret store
///
/// Only the name is declared. Serializing a `SecretRef` can never leak a
/// credential because no credential is ever held.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretRef {
    name: String,
}

impl SecretRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Property value embedding this reference
    pub fn to_value(&self) -> Value {
        json!({ "secret": self.name })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_serializes_name_only() {
        let secret = SecretRef::new("database-admin");
        assert_eq!(secret.to_value(), json!({ "secret": "database-admin" }));
    }

    #[test]
    fn test_external_value_points_at_logical_id() {
        let ext = ExternalRef::new(LogicalId::new("Stack/Role"), "iam-role", "ec2_instance_role");
        assert_eq!(ext.to_value(), json!({ "external": "Stack/Role" }));
        assert_eq!(ext.name(), "ec2_instance_role");
    }
}
