//! Synthesized template output
//!
//! The template is the contract surface handed to the reconciliation
//! engine: resource nodes in declaration order with key-ordered
//! properties, externals in their own section. Field order is fixed so
//! re-synthesizing an unchanged declaration is byte-identical.

use crate::external::ExternalRef;
use crate::graph::ResourceGraph;
use crate::node::ResourceNode;
use serde::Serialize;

/// Template format revision understood by the engine
pub const FORMAT_VERSION: u32 = 1;

/// The serializable result of evaluating a declaration
#[derive(Debug, Serialize)]
pub struct Template {
    format_version: u32,
    resources: Vec<ResourceNode>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    externals: Vec<ExternalRef>,
}

impl Template {
    pub(crate) fn from_graph(graph: &ResourceGraph) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            resources: graph.nodes().to_vec(),
            externals: graph.externals().to_vec(),
        }
    }

    pub fn resources(&self) -> &[ResourceNode] {
        &self.resources
    }

    pub fn externals(&self) -> &[ExternalRef] {
        &self.externals
    }

    /// Pretty-printed JSON, trailing newline included
    pub fn to_json(&self) -> serde_json::Result<String> {
        let mut out = serde_json::to_string_pretty(self)?;
        out.push('\n');
        Ok(out)
    }

    /// Single-line JSON
    pub fn to_json_compact(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
