//! The resource graph a declaration evaluates to

use crate::error::GraphError;
use crate::external::ExternalRef;
use crate::node::{LogicalId, ResourceNode};
use std::collections::{BTreeMap, BTreeSet};

/// An ordered collection of resource nodes, external references and the
/// edges between them
///
/// Nodes keep declaration order; every other collection is sorted. Given
/// the same declaration, two graphs are structurally identical.
#[derive(Debug, Default)]
pub struct ResourceGraph {
    nodes: Vec<ResourceNode>,
    index: BTreeMap<LogicalId, usize>,
    externals: Vec<ExternalRef>,
    external_ids: BTreeSet<LogicalId>,
}

impl ResourceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a new resource node, returning it for property population
    pub fn add_node(
        &mut self,
        logical_id: LogicalId,
        resource_type: &str,
    ) -> Result<&mut ResourceNode, GraphError> {
        if self.index.contains_key(&logical_id) || self.external_ids.contains(&logical_id) {
            return Err(GraphError::DuplicateId(logical_id));
        }
        let idx = self.nodes.len();
        self.index.insert(logical_id.clone(), idx);
        self.nodes.push(ResourceNode::new(logical_id, resource_type));
        Ok(&mut self.nodes[idx])
    }

    /// Register an external (name-resolved, unmanaged) reference
    pub fn add_external(&mut self, external: ExternalRef) -> Result<(), GraphError> {
        let id = external.logical_id().clone();
        if external.name().is_empty() {
            return Err(GraphError::EmptyExternalName(id));
        }
        if self.index.contains_key(&id) || self.external_ids.contains(&id) {
            return Err(GraphError::DuplicateId(id));
        }
        self.external_ids.insert(id);
        self.externals.push(external);
        Ok(())
    }

    /// Add an explicit ordering edge: `dependency` must be ready before
    /// `dependent` is provisioned
    pub fn add_dependency(
        &mut self,
        dependent: &LogicalId,
        dependency: &LogicalId,
    ) -> Result<(), GraphError> {
        if dependent == dependency {
            return Err(GraphError::SelfDependency(dependent.clone()));
        }
        if self.external_ids.contains(dependency) {
            return Err(GraphError::DependencyOnExternal {
                from: dependent.clone(),
                to: dependency.clone(),
            });
        }
        if !self.index.contains_key(dependency) {
            return Err(GraphError::UnknownDependency {
                from: dependent.clone(),
                to: dependency.clone(),
            });
        }
        let node = self.node_mut(dependent)?;
        node.add_depends_on(dependency.clone());
        Ok(())
    }

    pub fn node(&self, logical_id: &LogicalId) -> Option<&ResourceNode> {
        self.index.get(logical_id).map(|&i| &self.nodes[i])
    }

    pub fn node_mut(&mut self, logical_id: &LogicalId) -> Result<&mut ResourceNode, GraphError> {
        match self.index.get(logical_id) {
            Some(&i) => Ok(&mut self.nodes[i]),
            None => Err(GraphError::UnknownResource(logical_id.clone())),
        }
    }

    pub fn contains(&self, logical_id: &LogicalId) -> bool {
        self.index.contains_key(logical_id) || self.external_ids.contains(logical_id)
    }

    pub fn is_external(&self, logical_id: &LogicalId) -> bool {
        self.external_ids.contains(logical_id)
    }

    /// Nodes in declaration order
    pub fn nodes(&self) -> &[ResourceNode] {
        &self.nodes
    }

    pub fn externals(&self) -> &[ExternalRef] {
        &self.externals
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Check the whole graph for structural problems
    ///
    /// Verifies that every reference and ordering edge resolves, and that
    /// the union of explicit edges and node-to-node references is acyclic.
    /// An unsatisfiable ordering is a declaration bug; it must never reach
    /// the engine.
    pub fn validate(&self) -> Result<(), GraphError> {
        for node in &self.nodes {
            for dep in node.depends_on() {
                if !self.index.contains_key(dep) {
                    return Err(GraphError::UnknownDependency {
                        from: node.logical_id().clone(),
                        to: dep.clone(),
                    });
                }
            }
            for reference in node.references() {
                if !self.contains(reference) {
                    return Err(GraphError::UnknownReference {
                        from: node.logical_id().clone(),
                        to: reference.clone(),
                    });
                }
            }
        }
        self.check_cycles()
    }

    /// Ordering predecessors of a node: explicit edges first, then any
    /// referenced nodes not already listed
    fn predecessors<'a>(&'a self, node: &'a ResourceNode) -> Vec<&'a LogicalId> {
        let mut preds: Vec<&LogicalId> = node.depends_on().iter().collect();
        for reference in node.references() {
            if self.index.contains_key(reference) && !preds.contains(&reference) {
                preds.push(reference);
            }
        }
        preds
    }

    fn check_cycles(&self) -> Result<(), GraphError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            InProgress,
            Done,
        }

        fn visit(
            graph: &ResourceGraph,
            idx: usize,
            marks: &mut [Mark],
            stack: &mut Vec<usize>,
        ) -> Result<(), GraphError> {
            match marks[idx] {
                Mark::Done => return Ok(()),
                Mark::InProgress => {
                    // Back edge: the cycle is the stack suffix from the
                    // first occurrence of idx
                    let start = stack.iter().position(|&i| i == idx).unwrap_or(0);
                    let mut cycle: Vec<String> = stack[start..]
                        .iter()
                        .map(|&i| graph.nodes[i].logical_id().to_string())
                        .collect();
                    cycle.push(graph.nodes[idx].logical_id().to_string());
                    return Err(GraphError::DependencyCycle { cycle });
                }
                Mark::Unvisited => {}
            }
            marks[idx] = Mark::InProgress;
            stack.push(idx);
            for pred in graph.predecessors(&graph.nodes[idx]) {
                if let Some(&pidx) = graph.index.get(pred) {
                    visit(graph, pidx, marks, stack)?;
                }
            }
            stack.pop();
            marks[idx] = Mark::Done;
            Ok(())
        }

        let mut marks = vec![Mark::Unvisited; self.nodes.len()];
        let mut stack = Vec::new();
        for idx in 0..self.nodes.len() {
            visit(self, idx, &mut marks, &mut stack)?;
        }
        Ok(())
    }
}
