//! Graph edge types and state normalisation.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::Metadata;

/// Normalised link state.
///
/// Device-reported tokens are lowercased and mapped onto the known
/// vocabulary; anything unrecognised is kept, lowercased, in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EdgeState {
    Active,
    Inactive,
    Up,
    Down,
    Established,
    Unknown,
    Other(String),
}

impl EdgeState {
    /// Normalise a raw state token.
    pub fn from_token(token: &str) -> Self {
        let lowered = token.trim().to_lowercase();
        match lowered.as_str() {
            "active" | "node_active" => EdgeState::Active,
            "inactive" | "node_inactive" => EdgeState::Inactive,
            "up" => EdgeState::Up,
            "down" => EdgeState::Down,
            "established" => EdgeState::Established,
            "unknown" | "" => EdgeState::Unknown,
            _ => EdgeState::Other(lowered),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EdgeState::Active => "active",
            EdgeState::Inactive => "inactive",
            EdgeState::Up => "up",
            EdgeState::Down => "down",
            EdgeState::Established => "established",
            EdgeState::Unknown => "unknown",
            EdgeState::Other(s) => s,
        }
    }
}

impl From<String> for EdgeState {
    fn from(s: String) -> Self {
        EdgeState::from_token(&s)
    }
}

impl From<EdgeState> for String {
    fn from(state: EdgeState) -> Self {
        match state {
            EdgeState::Other(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for EdgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A directed edge in the snapshot graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// `source-target[-suffix]`.
    pub id: String,
    pub source: String,
    pub target: String,
    pub label: String,
    pub state: EdgeState,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Edge {
    /// Build the deterministic id for an edge.
    ///
    /// The relationship kind is only part of the id when a suffix is given,
    /// so two unsuffixed kinds between the same ordered pair share an id.
    pub fn make_id(source: &str, target: &str, suffix: Option<&str>) -> String {
        match suffix {
            Some(suffix) => format!("{source}-{target}-{suffix}"),
            None => format!("{source}-{target}"),
        }
    }

    /// Whether this edge joins `a` and `b` in either direction.
    pub fn joins(&self, a: &str, b: &str) -> bool {
        (self.source == a && self.target == b) || (self.source == b && self.target == a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_normalisation() {
        assert_eq!(EdgeState::from_token("node_active"), EdgeState::Active);
        assert_eq!(EdgeState::from_token("NODE_ACTIVE"), EdgeState::Active);
        assert_eq!(EdgeState::from_token("node_inactive"), EdgeState::Inactive);
        assert_eq!(EdgeState::from_token("Established"), EdgeState::Established);
        assert_eq!(
            EdgeState::from_token("Node_Degraded"),
            EdgeState::Other("node_degraded".to_string())
        );
    }

    #[test]
    fn test_state_serializes_as_plain_string() {
        let json = serde_json::to_string(&EdgeState::Active).unwrap();
        assert_eq!(json, "\"active\"");
        let json = serde_json::to_string(&EdgeState::Other("idle".into())).unwrap();
        assert_eq!(json, "\"idle\"");
        let state: EdgeState = serde_json::from_str("\"DOWN\"").unwrap();
        assert_eq!(state, EdgeState::Down);
    }

    #[test]
    fn test_edge_id() {
        assert_eq!(Edge::make_id("cp1", "upf1", None), "cp1-upf1");
        assert_eq!(Edge::make_id("cp1", "10.0.0.1", Some("bgp")), "cp1-10.0.0.1-bgp");
    }
}
