//! Graph node types.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::Metadata;

/// Role of an entity in the fleet graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    /// Control-plane device.
    Cp,
    /// User-plane forwarding device (UPF).
    Router,
    /// RADIUS server.
    Radius,
    /// External BGP neighbour.
    Site,
}

impl NodeType {
    /// Classify a peer from its protocol column.
    ///
    /// Matching is case-insensitive; anything that is not `upf` or `radius`
    /// is treated as a control-plane peer.
    pub fn from_protocol(protocol: &str) -> Self {
        if protocol.eq_ignore_ascii_case("upf") {
            NodeType::Router
        } else if protocol.eq_ignore_ascii_case("radius") {
            NodeType::Radius
        } else {
            NodeType::Cp
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Cp => "cp",
            NodeType::Router => "router",
            NodeType::Radius => "radius",
            NodeType::Site => "site",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node in the snapshot graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique id within a snapshot (hostname, peer name, `ip:port`, ...).
    pub id: String,

    /// Display name.
    pub label: String,

    /// Entity role.
    #[serde(rename = "type")]
    pub node_type: NodeType,

    /// Free-form attributes.
    #[serde(default)]
    pub metadata: Metadata,
}

impl Node {
    /// Create a node with empty metadata.
    pub fn new(id: impl Into<String>, label: impl Into<String>, node_type: NodeType) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            node_type,
            metadata: Metadata::new(),
        }
    }

    /// Create a node whose label is its id.
    pub fn labelled_by_id(id: impl Into<String>, node_type: NodeType) -> Self {
        let id = id.into();
        Self::new(id.clone(), id, node_type)
    }

    /// Replace the metadata.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_mapping_is_case_insensitive() {
        for protocol in ["UPF", "upf", "Upf"] {
            assert_eq!(NodeType::from_protocol(protocol), NodeType::Router);
        }
        assert_eq!(NodeType::from_protocol("RADIUS"), NodeType::Radius);
        assert_eq!(NodeType::from_protocol("n4"), NodeType::Cp);
        assert_eq!(NodeType::from_protocol(""), NodeType::Cp);
    }

    #[test]
    fn test_node_serializes_type_field() {
        let node = Node::labelled_by_id("cp-bgl-01", NodeType::Cp);
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["type"], "cp");
        assert_eq!(json["label"], "cp-bgl-01");
        assert!(json["metadata"].as_object().unwrap().is_empty());
    }
}
