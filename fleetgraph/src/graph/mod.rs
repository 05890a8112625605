//! Snapshot graph model and assembly.
//!
//! Parsed records from every device are folded into a [`GraphAssembler`],
//! which owns node identity and edge ids for one collection pass and
//! finally yields a [`Snapshot`].

mod assembler;
mod edge;
mod node;
mod snapshot;

pub use assembler::{GEO_REDUNDANCY_LABEL, GraphAssembler, INTERCONNECT_SUFFIX};
pub use edge::{Edge, EdgeState};
pub use node::{Node, NodeType};
pub use snapshot::{DeviceRoleSet, Snapshot};

/// Free-form attributes attached to nodes and edges.
pub type Metadata = serde_json::Map<String, serde_json::Value>;
