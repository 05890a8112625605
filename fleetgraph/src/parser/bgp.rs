//! Parser for `show bgp-neighbors`.

use log::warn;

use super::Parsed;
use crate::error::ParseError;
use crate::graph::EdgeState;

/// Substring that marks an established session row.
pub const ESTABLISHED_MARKER: &str = "Establ";

const MIN_FIELDS: usize = 4;

/// An established BGP session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BgpRecord {
    /// Neighbour address (first field).
    pub peer: String,
    /// Session state (fourth field), normalised.
    pub state: EdgeState,
}

/// Parse the BGP neighbour list.
///
/// Only rows containing [`ESTABLISHED_MARKER`] are read; everything else
/// is ignored.
pub fn parse_bgp(output: &str) -> Parsed<BgpRecord> {
    let mut parsed = Parsed::new();

    for line in output.lines().filter(|l| l.contains(ESTABLISHED_MARKER)) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < MIN_FIELDS {
            let e = ParseError::TooFewFields {
                line: line.trim().to_string(),
                found: fields.len(),
                required: MIN_FIELDS,
            };
            warn!("Failed to parse BGP row: {e}");
            parsed.skipped.push(e);
            continue;
        }

        parsed.records.push(BgpRecord {
            peer: fields[0].to_string(),
            state: EdgeState::from_token(fields[3]),
        });
    }

    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUTPUT: &str = "\
Neighbor        AS     Uptime     State        Prefixes
10.10.1.1       65001  3d02h      Established  12
10.10.1.2       65001  00:00:12   Active       0
10.10.1.3       65002  1w1d       ESTABLISHED  4
";

    #[test]
    fn test_parse_established_rows() {
        let parsed = parse_bgp(OUTPUT);
        assert!(parsed.is_clean());
        assert_eq!(
            parsed.records,
            vec![
                BgpRecord {
                    peer: "10.10.1.1".into(),
                    state: EdgeState::Established,
                },
            ]
        );
    }

    #[test]
    fn test_marker_is_case_sensitive_substring() {
        let output = "10.0.0.9  65000  1d  Establ-pending\n";
        let parsed = parse_bgp(output);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed.records[0].state, EdgeState::Other("establ-pending".into()));
    }

    #[test]
    fn test_short_marked_row_is_skipped() {
        let parsed = parse_bgp("Established sessions: 3\n");
        assert!(parsed.is_empty());
        assert_eq!(parsed.skipped.len(), 1);
    }

    #[test]
    fn test_no_sessions() {
        assert!(parse_bgp("% No BGP neighbors configured\n").is_empty());
    }
}
