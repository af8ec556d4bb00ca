//! # Topograph
//!
//! A small framework for declaring resource graphs.
//!
//! A declaration is evaluated once, synchronously, into a static graph of
//! resource nodes plus explicit ordering edges, which an external
//! reconciliation engine consumes whole. This crate owns only the
//! declaration side: no diffing, no applying, no retries. Those belong to
//! the engine.
//!
//! ## Core Concepts
//!
//! - **App**: root of a declaration; owns the graph and synthesizes it
//! - **Scope**: the explicit parent handle every constructor receives;
//!   child ids nest into stable, slash-separated logical ids
//! - **ResourceNode**: one declared resource (type, properties, edges)
//! - **ExternalRef**: a name-resolved resource the engine must not manage
//! - **SecretRef**: a named secret reference; the value never appears
//! - **Template**: the deterministic JSON handed to the engine
//!
//! ## Example
//!
//! ```
//! use topograph::App;
//!
//! let mut app = App::new();
//! let mut root = app.root();
//! let net = root.add_node("Net", "network")?.logical_id().clone();
//! root.add_node("Box", "instance")?.set_ref("network", &net);
//!
//! let template = app.synth()?;
//! assert_eq!(template.resources().len(), 2);
//! # Ok::<(), topograph::GraphError>(())
//! ```

pub mod error;
pub mod external;
pub mod graph;
pub mod node;
pub mod scope;
pub mod synth;

// Re-export main types at crate root
pub use error::GraphError;
pub use external::{ExternalRef, SecretRef};
pub use graph::ResourceGraph;
pub use node::{LogicalId, ResourceNode, reference};
pub use scope::{App, Construct, Scope};
pub use synth::{FORMAT_VERSION, Template};
