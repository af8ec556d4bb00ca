//! Errors surfaced while building or validating a resource graph

use crate::node::LogicalId;
use thiserror::Error;

/// Errors detected at declaration-evaluation time
///
/// Everything here is a structural problem in the declaration itself.
/// Failures that can only happen against a live account (missing
/// permissions, quota limits) are the reconciliation engine's business
/// and never appear in this enum.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Two resources were declared under the same logical id
    #[error("duplicate logical id '{0}'")]
    DuplicateId(LogicalId),

    /// A child id contained a path separator or was empty
    #[error("invalid construct id '{0}': ids must be non-empty and must not contain '/'")]
    InvalidId(String),

    /// A lookup hit a logical id that no declared resource owns
    #[error("unknown resource '{0}'")]
    UnknownResource(LogicalId),

    /// An ordering edge points at a resource that was never declared
    #[error("'{from}' depends on unknown resource '{to}'")]
    UnknownDependency { from: LogicalId, to: LogicalId },

    /// A property references a resource that was never declared
    #[error("'{from}' references unknown resource '{to}'")]
    UnknownReference { from: LogicalId, to: LogicalId },

    /// An ordering edge points at an external reference
    ///
    /// Externals are presumed to pre-exist; the engine never provisions
    /// them, so ordering on their readiness is meaningless.
    #[error("'{from}' cannot depend on '{to}': external references are not provisioned")]
    DependencyOnExternal { from: LogicalId, to: LogicalId },

    /// A resource declared an ordering edge to itself
    #[error("'{0}' depends on itself")]
    SelfDependency(LogicalId),

    /// The ordering edges (plus implicit references) form a cycle
    #[error("dependency cycle: {}", cycle.join(" -> "))]
    DependencyCycle { cycle: Vec<String> },

    /// An external reference was declared with an empty target name
    #[error("external reference '{0}' has an empty target name")]
    EmptyExternalName(LogicalId),
}
