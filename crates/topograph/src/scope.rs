//! Construction scopes - the explicit context resources are declared in
//!
//! Nothing here is ambient or global: every resource constructor receives a
//! `&mut Scope` naming its parent, and child ids nest into the stable
//! logical path the engine diffs by.

use crate::error::GraphError;
use crate::external::ExternalRef;
use crate::graph::ResourceGraph;
use crate::node::{LogicalId, ResourceNode};
use crate::synth::Template;

/// Anything addressable as a node in the graph
///
/// Typed builders implement this so ordering edges can be declared between
/// them without reaching into their internals.
pub trait Construct {
    fn node_id(&self) -> &LogicalId;
}

/// Root of a declaration
///
/// Owns the graph being built. Evaluating the same declaration against two
/// fresh `App`s yields structurally identical graphs; nothing environmental
/// leaks in through this type.
#[derive(Debug, Default)]
pub struct App {
    graph: ResourceGraph,
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    /// The root scope, from which all construction starts
    pub fn root(&mut self) -> Scope<'_> {
        Scope {
            graph: &mut self.graph,
            path: String::new(),
        }
    }

    pub fn graph(&self) -> &ResourceGraph {
        &self.graph
    }

    /// Validate the graph and produce the synthesized template
    pub fn synth(&self) -> Result<Template, GraphError> {
        self.graph.validate()?;
        Ok(Template::from_graph(&self.graph))
    }
}

/// A parent handle threaded through resource constructors
pub struct Scope<'a> {
    graph: &'a mut ResourceGraph,
    path: String,
}

impl Scope<'_> {
    /// Enter a child scope
    ///
    /// The child's resources get logical ids prefixed with this scope's
    /// path plus `id`.
    pub fn child(&mut self, id: &str) -> Result<Scope<'_>, GraphError> {
        let path = self.qualify(id)?;
        Ok(Scope {
            graph: &mut *self.graph,
            path: path.as_str().to_string(),
        })
    }

    /// The logical id `id` resolves to under this scope
    pub fn qualify(&self, id: &str) -> Result<LogicalId, GraphError> {
        if id.is_empty() || id.contains('/') {
            return Err(GraphError::InvalidId(id.to_string()));
        }
        if self.path.is_empty() {
            Ok(LogicalId::new(id))
        } else {
            Ok(LogicalId::new(format!("{}/{id}", self.path)))
        }
    }

    /// Declare a resource node under this scope
    pub fn add_node(
        &mut self,
        id: &str,
        resource_type: &str,
    ) -> Result<&mut ResourceNode, GraphError> {
        let logical_id = self.qualify(id)?;
        self.graph.add_node(logical_id, resource_type)
    }

    /// Register an external reference under this scope
    ///
    /// `name` is what gets resolved against the target account at apply
    /// time; the engine does not manage the referent's lifecycle.
    pub fn import(&mut self, id: &str, kind: &str, name: &str) -> Result<ExternalRef, GraphError> {
        let logical_id = self.qualify(id)?;
        let external = ExternalRef::new(logical_id, kind, name);
        self.graph.add_external(external.clone())?;
        Ok(external)
    }

    pub fn node_mut(&mut self, logical_id: &LogicalId) -> Result<&mut ResourceNode, GraphError> {
        self.graph.node_mut(logical_id)
    }

    pub fn graph(&self) -> &ResourceGraph {
        &*self.graph
    }

    /// Declare an explicit ordering edge between two constructs
    pub fn add_dependency(
        &mut self,
        dependent: &dyn Construct,
        dependency: &dyn Construct,
    ) -> Result<(), GraphError> {
        self.graph.add_dependency(dependent.node_id(), dependency.node_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_scopes_nest_logical_ids() {
        let mut app = App::new();
        let mut root = app.root();
        let mut stack = root.child("WebStack").unwrap();
        let node = stack.add_node("MyVpc", "vpc").unwrap();
        assert_eq!(node.logical_id().as_str(), "WebStack/MyVpc");
    }

    #[test]
    fn test_invalid_child_id_rejected() {
        let mut app = App::new();
        let mut root = app.root();
        assert!(matches!(root.child(""), Err(GraphError::InvalidId(_))));
        assert!(matches!(root.child("a/b"), Err(GraphError::InvalidId(_))));
    }

    #[test]
    fn test_duplicate_sibling_rejected() {
        let mut app = App::new();
        let mut root = app.root();
        root.add_node("A", "thing").unwrap();
        let err = root.add_node("A", "thing").unwrap_err();
        assert!(matches!(err, GraphError::DuplicateId(_)));
    }

    #[test]
    fn test_import_registers_external() {
        let mut app = App::new();
        let mut root = app.root();
        let ext = root.import("Role", "iam-role", "ec2_instance_role").unwrap();
        assert_eq!(ext.logical_id().as_str(), "Role");
        assert!(app.graph().is_external(ext.logical_id()));
    }

    #[test]
    fn test_empty_external_name_rejected() {
        let mut app = App::new();
        let mut root = app.root();
        let err = root.import("Role", "iam-role", "").unwrap_err();
        assert!(matches!(err, GraphError::EmptyExternalName(_)));
    }
}
