//! Parser for the `show peers all` table.
//!
//! The table is a header, a dashed separator, then one whitespace-aligned
//! row per peer. Columns are separated by two or more spaces; single
//! spaces occur inside cells.
//!
//! ```text
//! GR-Instance  Endpoint  Local Address  Peer Address  Direction  ...  Protocol  Details                                  Interface  VRF
//! -------------------------------------------------------------------------------------------------------------------------------
//! 1            n4-ep     10.1.1.1:8805  10.2.2.2:8805 inbound    ...  upf       Name: upf-bgl-01, Status: NODE_ACTIVE    bd1.n4     default
//! ```

use std::sync::LazyLock;

use log::warn;
use regex::Regex;
use serde_json::Value;

use super::Parsed;
use crate::error::ParseError;
use crate::graph::{EdgeState, Metadata, NodeType};

/// Rows with fewer columns than this are skipped.
pub const MIN_PEER_COLUMNS: usize = 10;

const COL_GR_INSTANCE: usize = 0;
const COL_LABEL: usize = 1;
const COL_PEER_ADDRESS: usize = 3;
const COL_DIRECTION: usize = 4;
const COL_CONNECTED_TIME: usize = 7;
const COL_PROTOCOL: usize = 8;
const COL_DETAILS: usize = 9;
const COL_INTERFACE: usize = 10;
const COL_VRF: usize = 11;

static SEPARATOR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^-{5,}").unwrap());
static COLUMN_GAP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s{2,}").unwrap());
static DETAIL_NAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Name:\s*([^,]+)").unwrap());
static DETAIL_STATUS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Status:\s*([^,]+)").unwrap());

/// Positional fields of a peer row that describe the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerMetadata {
    pub gr_instance: String,
    pub direction: String,
    pub connected_time: String,
    /// Absent on rows without an interface column.
    pub interface_name: Option<String>,
    /// Absent on rows without a VRF column.
    pub vrf: Option<String>,
}

impl PeerMetadata {
    /// Render as graph metadata; absent optional fields are omitted.
    pub fn to_metadata(&self) -> Metadata {
        let mut metadata = Metadata::new();
        metadata.insert("gr_instance".into(), Value::from(self.gr_instance.as_str()));
        metadata.insert("direction".into(), Value::from(self.direction.as_str()));
        metadata.insert(
            "connected_time".into(),
            Value::from(self.connected_time.as_str()),
        );
        if let Some(ref interface_name) = self.interface_name {
            metadata.insert("interface_name".into(), Value::from(interface_name.as_str()));
        }
        if let Some(ref vrf) = self.vrf {
            metadata.insert("vrf".into(), Value::from(vrf.as_str()));
        }
        metadata
    }
}

/// One peer discovered in the peer table.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerRecord {
    /// Peer name, used as the node id.
    pub target: String,
    pub node_type: NodeType,
    /// Endpoint column, used as a display label.
    pub label: String,
    pub state: EdgeState,
    /// Raw protocol column.
    pub protocol: String,
    pub metadata: PeerMetadata,
}

/// Parse the peer table.
pub fn parse_peers(output: &str) -> Parsed<PeerRecord> {
    let lines: Vec<&str> = output.trim().lines().collect();
    let rows = match lines.iter().position(|line| SEPARATOR.is_match(line)) {
        Some(idx) => &lines[idx + 1..],
        None => &lines[..],
    };

    let mut parsed = Parsed::new();
    for line in rows {
        if line.trim().is_empty() {
            continue;
        }
        match parse_row(line) {
            Ok(record) => parsed.records.push(record),
            Err(e) => {
                warn!("Failed to parse peer row: {e}");
                parsed.skipped.push(e);
            }
        }
    }
    parsed
}

fn parse_row(line: &str) -> Result<PeerRecord, ParseError> {
    let columns: Vec<&str> = COLUMN_GAP.split(line.trim()).collect();
    if columns.len() < MIN_PEER_COLUMNS {
        return Err(ParseError::TooFewColumns {
            line: line.trim().to_string(),
            found: columns.len(),
            required: MIN_PEER_COLUMNS,
        });
    }

    let details = columns[COL_DETAILS];
    let target = capture(&DETAIL_NAME, details).unwrap_or(columns[COL_PEER_ADDRESS]);
    let state = capture(&DETAIL_STATUS, details)
        .map(EdgeState::from_token)
        .unwrap_or(EdgeState::Unknown);

    let protocol = columns[COL_PROTOCOL];
    let optional = |idx: usize| columns.get(idx).map(|s| s.to_string());

    Ok(PeerRecord {
        target: target.to_string(),
        node_type: NodeType::from_protocol(protocol),
        label: columns[COL_LABEL].to_string(),
        state,
        protocol: protocol.to_string(),
        metadata: PeerMetadata {
            gr_instance: columns[COL_GR_INSTANCE].to_string(),
            direction: columns[COL_DIRECTION].to_string(),
            connected_time: columns[COL_CONNECTED_TIME].to_string(),
            interface_name: optional(COL_INTERFACE),
            vrf: optional(COL_VRF),
        },
    })
}

fn capture<'a>(pattern: &Regex, haystack: &'a str) -> Option<&'a str> {
    pattern
        .captures(haystack)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
}
