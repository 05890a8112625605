//! Graph assembly for a single collection pass.

use indexmap::IndexMap;
use log::{debug, info};
use serde_json::Value;

use super::{DeviceRoleSet, Edge, EdgeState, Metadata, Node, NodeType, Snapshot};

/// Label of the synthetic edges added between otherwise unlinked devices.
pub const GEO_REDUNDANCY_LABEL: &str = "Geo-Redundancy";

/// Id suffix of the synthetic device-to-device edges.
pub const INTERCONNECT_SUFFIX: &str = "interconnect";

/// Accumulates nodes and edges discovered during one pass.
///
/// Nodes are keyed by id and keep the order of their first insertion;
/// re-inserting an id replaces the whole record. Edges are append-only.
///
/// An assembler has a single writer: every mutation takes `&mut self`, and
/// each pass (or each device, when probing is split up) owns its own
/// instance. Combine per-device instances with [`merge`](Self::merge) before
/// calling [`connect_remaining_pairs`](Self::connect_remaining_pairs).
#[derive(Debug, Default)]
pub struct GraphAssembler {
    nodes: IndexMap<String, Node>,
    edges: Vec<Edge>,
}

impl GraphAssembler {
    /// Create an empty assembler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node, replacing any existing record with the same id.
    ///
    /// Replacement is whole-record; callers that want to keep earlier
    /// metadata must merge it themselves first.
    pub fn upsert_node(&mut self, node: Node) {
        if self.nodes.contains_key(&node.id) {
            debug!("replacing node {}", node.id);
        }
        self.nodes.insert(node.id.clone(), node);
    }

    /// Insert a node only if its id is not yet known.
    ///
    /// Returns `true` if the node was inserted.
    pub fn insert_node_if_absent(&mut self, node: Node) -> bool {
        if self.nodes.contains_key(&node.id) {
            return false;
        }
        self.nodes.insert(node.id.clone(), node);
        true
    }

    /// Check whether a node id is known.
    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Get a node by id.
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Append an edge with id `source-target[-id_suffix]`.
    ///
    /// Edges are never deduplicated. Endpoints that have no node yet get a
    /// minimal `site` node labelled with the id.
    pub fn append_edge(
        &mut self,
        source: &str,
        target: &str,
        label: impl Into<String>,
        state: EdgeState,
        metadata: Metadata,
        id_suffix: Option<&str>,
    ) -> &Edge {
        for endpoint in [source, target] {
            if !self.nodes.contains_key(endpoint) {
                debug!("auto-creating node {endpoint} for edge");
                self.nodes.insert(
                    endpoint.to_string(),
                    Node::labelled_by_id(endpoint, NodeType::Site),
                );
            }
        }

        let edge = Edge {
            id: Edge::make_id(source, target, id_suffix),
            source: source.to_string(),
            target: target.to_string(),
            label: label.into(),
            state,
            metadata,
        };
        self.edges.push(edge);
        &self.edges[self.edges.len() - 1]
    }

    /// Whether any edge joins `a` and `b`, in either direction.
    pub fn is_connected(&self, a: &str, b: &str) -> bool {
        self.edges.iter().any(|e| e.joins(a, b))
    }

    /// Link every pair of roster devices that has no edge yet.
    ///
    /// Pairs are visited as `i < j` over `hostnames`, so the added edges
    /// (and their ids) follow roster order. `address_of` supplies each
    /// device's management address for the edge metadata.
    ///
    /// Returns the number of edges added.
    pub fn connect_remaining_pairs<F>(&mut self, hostnames: &[String], address_of: F) -> usize
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut added = 0;

        for (i, first) in hostnames.iter().enumerate() {
            for second in &hostnames[i + 1..] {
                if first == second || self.is_connected(first, second) {
                    continue;
                }

                let mut metadata = Metadata::new();
                metadata.insert("connection_type".into(), Value::from("inter_device"));
                metadata.insert("device1_ip".into(), address_of(first).into());
                metadata.insert("device2_ip".into(), address_of(second).into());
                metadata.insert(
                    "description".into(),
                    Value::from(format!("Direct connection between {first} and {second}")),
                );

                self.append_edge(
                    first,
                    second,
                    GEO_REDUNDANCY_LABEL,
                    EdgeState::Active,
                    metadata,
                    Some(INTERCONNECT_SUFFIX),
                );
                info!("Added inter-device connection: {first} <-> {second}");
                added += 1;
            }
        }

        added
    }

    /// Fold another assembler into this one.
    ///
    /// Nodes follow the same last-write-wins rule as `upsert_node`; edges are
    /// appended in their original order.
    pub fn merge(&mut self, other: GraphAssembler) {
        for (_, node) in other.nodes {
            self.upsert_node(node);
        }
        self.edges.extend(other.edges);
    }

    /// Nodes in first-insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Edges in append order.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Finish the pass and produce the snapshot.
    pub fn into_snapshot(self, device_roles: IndexMap<String, DeviceRoleSet>) -> Snapshot {
        Snapshot {
            nodes: self.nodes.into_values().collect(),
            edges: self.edges,
            device_roles,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn addresses(host: &str) -> Option<String> {
        match host {
            "cp-a" => Some("10.0.0.1".into()),
            "cp-b" => Some("10.0.0.2".into()),
            _ => None,
        }
    }

    #[test]
    fn test_upsert_replaces_whole_record_keeps_position() {
        let mut graph = GraphAssembler::new();
        let mut meta = Metadata::new();
        meta.insert("CPU".into(), Value::from("60%"));
        graph.upsert_node(Node::labelled_by_id("upf-1", NodeType::Router).with_metadata(meta));
        graph.upsert_node(Node::labelled_by_id("cp-a", NodeType::Cp));
        graph.upsert_node(Node::new("upf-1", "UPF 1", NodeType::Cp));

        let ids: Vec<_> = graph.nodes().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["upf-1", "cp-a"]);

        let node = graph.node("upf-1").unwrap();
        assert_eq!(node.label, "UPF 1");
        assert_eq!(node.node_type, NodeType::Cp);
        assert!(node.metadata.is_empty());
    }

    #[test]
    fn test_insert_if_absent() {
        let mut graph = GraphAssembler::new();
        assert!(graph.insert_node_if_absent(Node::labelled_by_id("x", NodeType::Site)));
        assert!(!graph.insert_node_if_absent(Node::labelled_by_id("x", NodeType::Cp)));
        assert_eq!(graph.node("x").unwrap().node_type, NodeType::Site);
    }

    #[test]
    fn test_append_edge_ids_and_no_dedup() {
        let mut graph = GraphAssembler::new();
        graph.upsert_node(Node::labelled_by_id("cp-a", NodeType::Cp));

        let id = graph
            .append_edge("cp-a", "10.1.1.1", "BGP", EdgeState::Established, Metadata::new(), Some("bgp"))
            .id
            .clone();
        assert_eq!(id, "cp-a-10.1.1.1-bgp");

        graph.append_edge("cp-a", "rad:1812", "RADIUS", EdgeState::Up, Metadata::new(), None);
        graph.append_edge("cp-a", "rad:1812", "RADIUS", EdgeState::Up, Metadata::new(), None);
        assert_eq!(graph.edge_count(), 3);
        assert_eq!(graph.edges()[1].id, graph.edges()[2].id);
    }

    #[test]
    fn test_append_edge_creates_missing_endpoints() {
        let mut graph = GraphAssembler::new();
        graph.append_edge("a", "b", "link", EdgeState::Unknown, Metadata::new(), None);
        assert_eq!(graph.node_count(), 2);
        let b = graph.node("b").unwrap();
        assert_eq!(b.label, "b");
        assert_eq!(b.node_type, NodeType::Site);
    }

    #[test]
    fn test_connect_remaining_pairs_two_devices() {
        let mut graph = GraphAssembler::new();
        graph.upsert_node(Node::labelled_by_id("cp-a", NodeType::Cp));
        graph.upsert_node(Node::labelled_by_id("cp-b", NodeType::Cp));
        let hosts = roster(&["cp-a", "cp-b"]);

        assert_eq!(graph.connect_remaining_pairs(&hosts, addresses), 1);
        let edge = &graph.edges()[0];
        assert_eq!(edge.id, "cp-a-cp-b-interconnect");
        assert_eq!(edge.label, GEO_REDUNDANCY_LABEL);
        assert_eq!(edge.state, EdgeState::Active);
        assert_eq!(edge.metadata["device1_ip"], "10.0.0.1");
        assert_eq!(edge.metadata["device2_ip"], "10.0.0.2");
        assert_eq!(edge.metadata["connection_type"], "inter_device");

        assert_eq!(graph.connect_remaining_pairs(&hosts, addresses), 0);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_connect_remaining_pairs_skips_linked_either_direction() {
        let mut graph = GraphAssembler::new();
        graph.append_edge("cp-b", "cp-a", "n4", EdgeState::Active, Metadata::new(), None);
        let hosts = roster(&["cp-a", "cp-b", "cp-c"]);

        assert_eq!(graph.connect_remaining_pairs(&hosts, addresses), 2);
        let ids: Vec<_> = graph.edges()[1..].iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["cp-a-cp-c-interconnect", "cp-b-cp-c-interconnect"]);
        assert!(graph.edges()[2].metadata["device2_ip"].is_null());
    }

    #[test]
    fn test_connect_remaining_pairs_ignores_duplicate_hostnames() {
        let mut graph = GraphAssembler::new();
        let hosts = roster(&["cp-a", "cp-a"]);
        assert_eq!(graph.connect_remaining_pairs(&hosts, addresses), 0);
    }

    #[test]
    fn test_merge_last_write_wins() {
        let mut first = GraphAssembler::new();
        first.upsert_node(Node::labelled_by_id("cp-a", NodeType::Cp));
        first.upsert_node(Node::labelled_by_id("upf-1", NodeType::Router));
        first.append_edge("cp-a", "upf-1", "upf", EdgeState::Active, Metadata::new(), None);

        let mut second = GraphAssembler::new();
        second.upsert_node(Node::new("upf-1", "UPF-1", NodeType::Router));
        second.append_edge("cp-b", "upf-1", "upf", EdgeState::Inactive, Metadata::new(), None);

        first.merge(second);
        let ids: Vec<_> = first.nodes().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["cp-a", "upf-1", "cp-b"]);
        assert_eq!(first.node("upf-1").unwrap().label, "UPF-1");
        assert_eq!(first.edge_count(), 2);
    }

    #[test]
    fn test_into_snapshot_preserves_order() {
        let mut graph = GraphAssembler::new();
        graph.upsert_node(Node::labelled_by_id("b", NodeType::Cp));
        graph.upsert_node(Node::labelled_by_id("a", NodeType::Cp));
        let snapshot = graph.into_snapshot(IndexMap::new());
        assert_eq!(snapshot.nodes[0].id, "b");
        assert_eq!(snapshot.nodes[1].id, "a");
    }
}
