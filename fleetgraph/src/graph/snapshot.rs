//! The snapshot produced by one collection pass.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::{Edge, Node};

/// Roles reported by one device, keyed by instance (`instance_1`, ...).
///
/// Roles live in this side table only; they are not copied onto the
/// device's node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceRoleSet(IndexMap<String, String>);

impl DeviceRoleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the role of a numbered instance.
    pub fn insert(&mut self, instance_id: u32, role: impl Into<String>) {
        self.0.insert(format!("instance_{instance_id}"), role.into());
    }

    /// Role of a numbered instance, if one was reported.
    pub fn get(&self, instance_id: u32) -> Option<&str> {
        self.0
            .get(&format!("instance_{instance_id}"))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }
}

/// Complete nodes/edges/roles output of one collection pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub device_roles: IndexMap<String, DeviceRoleSet>,
}

impl Snapshot {
    /// Look up a node by id.
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Look up the first edge with the given id.
    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EdgeState, Metadata, NodeType};

    #[test]
    fn test_snapshot_json_shape() {
        let mut roles = DeviceRoleSet::new();
        roles.insert(1, "primary");
        roles.insert(2, "standby");

        let mut device_roles = IndexMap::new();
        device_roles.insert("cp-bgl-01".to_string(), roles);

        let snapshot = Snapshot {
            nodes: vec![Node::labelled_by_id("cp-bgl-01", NodeType::Cp)],
            edges: vec![Edge {
                id: "cp-bgl-01-upf-01".into(),
                source: "cp-bgl-01".into(),
                target: "upf-01".into(),
                label: "upf".into(),
                state: EdgeState::Active,
                metadata: Metadata::new(),
            }],
            device_roles,
        };

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["nodes"][0]["id"], "cp-bgl-01");
        assert_eq!(json["edges"][0]["state"], "active");
        assert_eq!(json["device_roles"]["cp-bgl-01"]["instance_1"], "primary");
        assert_eq!(json["device_roles"]["cp-bgl-01"]["instance_2"], "standby");
    }

    #[test]
    fn test_role_set_lookup() {
        let mut roles = DeviceRoleSet::new();
        roles.insert(2, "standby");
        assert_eq!(roles.get(2), Some("standby"));
        assert_eq!(roles.get(1), None);
        assert_eq!(roles.len(), 1);
    }
}
