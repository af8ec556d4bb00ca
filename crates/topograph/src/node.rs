//! Resource nodes and their stable logical identifiers

use serde::Serialize;
use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Stable logical name of a declared resource
///
/// Logical ids are slash-separated construct paths ("MyVpc/PublicSubnet1").
/// The reconciliation engine diffs successive runs by this name, so it must
/// be a pure function of the declaration, never of evaluation order or
/// anything environmental.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct LogicalId(String);

impl LogicalId {
    pub(crate) fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LogicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Build a property value that references another resource
///
/// References are the implicit counterpart of explicit ordering edges: the
/// engine can derive "create the referent first" from them, but the
/// declaration does not rely on that: ordering that must hold is stated
/// as an explicit edge.
pub fn reference(target: &LogicalId) -> Value {
    json!({ "ref": target.as_str() })
}

/// One declared resource: type, properties, edges
///
/// Properties are a `BTreeMap` so synthesized output is key-ordered and
/// re-evaluation produces byte-identical templates.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceNode {
    logical_id: LogicalId,
    #[serde(rename = "type")]
    resource_type: String,
    properties: BTreeMap<String, Value>,
    /// Explicit ordering edges: every id here must report ready before
    /// this resource is provisioned. Kept in authored order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    depends_on: Vec<LogicalId>,
    /// Implicit references collected from properties
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    references: BTreeSet<LogicalId>,
}

impl ResourceNode {
    pub(crate) fn new(logical_id: LogicalId, resource_type: &str) -> Self {
        Self {
            logical_id,
            resource_type: resource_type.to_string(),
            properties: BTreeMap::new(),
            depends_on: Vec::new(),
            references: BTreeSet::new(),
        }
    }

    pub fn logical_id(&self) -> &LogicalId {
        &self.logical_id
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn properties(&self) -> &BTreeMap<String, Value> {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Set a plain property value
    pub fn set(&mut self, key: &str, value: Value) -> &mut Self {
        self.properties.insert(key.to_string(), value);
        self
    }

    /// Set a property that references another resource
    pub fn set_ref(&mut self, key: &str, target: &LogicalId) -> &mut Self {
        self.references.insert(target.clone());
        self.properties.insert(key.to_string(), reference(target));
        self
    }

    /// Set a property to a list of references (e.g. a target pool)
    pub fn set_ref_list(&mut self, key: &str, targets: &[&LogicalId]) -> &mut Self {
        let values: Vec<Value> = targets.iter().map(|t| reference(t)).collect();
        for target in targets {
            self.references.insert((*target).clone());
        }
        self.properties.insert(key.to_string(), Value::Array(values));
        self
    }

    /// Record a reference without materializing it as a property
    pub fn add_reference(&mut self, target: &LogicalId) -> &mut Self {
        self.references.insert(target.clone());
        self
    }

    pub(crate) fn add_depends_on(&mut self, target: LogicalId) {
        if !self.depends_on.contains(&target) {
            self.depends_on.push(target);
        }
    }

    pub fn depends_on(&self) -> &[LogicalId] {
        &self.depends_on
    }

    pub fn references(&self) -> impl Iterator<Item = &LogicalId> {
        self.references.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_ref_records_reference() {
        let target = LogicalId::new("Stack/Db");
        let mut node = ResourceNode::new(LogicalId::new("Stack/App"), "compute-instance");
        node.set_ref("database", &target);

        assert_eq!(node.property("database"), Some(&reference(&target)));
        assert!(node.references().any(|r| r == &target));
        assert!(node.depends_on().is_empty());
    }

    #[test]
    fn test_depends_on_dedupes() {
        let mut node = ResourceNode::new(LogicalId::new("Stack/App"), "compute-instance");
        node.add_depends_on(LogicalId::new("Stack/Db"));
        node.add_depends_on(LogicalId::new("Stack/Db"));
        assert_eq!(node.depends_on().len(), 1);
    }

    #[test]
    fn test_ref_list_property_shape() {
        let a = LogicalId::new("Stack/A");
        let b = LogicalId::new("Stack/B");
        let mut node = ResourceNode::new(LogicalId::new("Stack/Pool"), "target-pool");
        node.set_ref_list("targets", &[&a, &b]);

        let targets = node.property("targets").unwrap();
        assert_eq!(targets, &serde_json::json!([{"ref": "Stack/A"}, {"ref": "Stack/B"}]));
        assert_eq!(node.references().count(), 2);
    }
}
