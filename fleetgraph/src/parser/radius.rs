//! Parser for `test-radius authentication|accounting all`.
//!
//! The device prints a timestamp and some prose, then `result` followed by
//! a JSON document:
//!
//! ```text
//! Mon Oct 13 10:21:07.512 UTC+00:00
//! result {
//!   "testResponse": [
//!     { "serverIP": "10.50.1.10", "port": 1812, "status": { "errorCode": "Reject", "errorMsg": "..." } }
//!   ]
//! }
//! ```

use std::sync::LazyLock;

use log::{error, warn};
use regex::Regex;
use serde_json::Value;

use super::Parsed;
use crate::error::ParseError;
use crate::graph::{EdgeState, Metadata};

const PROBE: &str = "radius test";

/// Error codes that mean the server is unusable.
const DOWN_CODES: [&str; 3] = ["timeout", "reject", "markeddead"];

static PAYLOAD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)result\s+(\{.*\})").unwrap());

/// Outcome of probing one RADIUS server.
#[derive(Debug, Clone, PartialEq)]
pub struct RadiusRecord {
    /// `ip:port`, used as the node id.
    pub target: String,
    pub ip: String,
    /// Port as reported (usually a number, `"unknown"` if absent).
    pub port: Value,
    /// `down` for timeout/reject/markeddead, `up` otherwise.
    pub state: EdgeState,
    /// Lowercased error code, `"unknown"` if absent.
    pub error_code: String,
    pub error_msg: String,
}

impl RadiusRecord {
    pub fn to_metadata(&self) -> Metadata {
        let mut metadata = Metadata::new();
        metadata.insert("ip".into(), Value::from(self.ip.as_str()));
        metadata.insert("port".into(), self.port.clone());
        metadata.insert("error_code".into(), Value::from(self.error_code.as_str()));
        metadata.insert("error_msg".into(), Value::from(self.error_msg.as_str()));
        metadata
    }
}

/// Parse a RADIUS test result.
///
/// A missing or malformed payload yields no records and a single error;
/// malformed entries are skipped one by one.
pub fn parse_radius(output: &str) -> Parsed<RadiusRecord> {
    let Some(payload) = PAYLOAD.captures(output).and_then(|c| c.get(1)) else {
        let e = ParseError::MissingPayload { probe: PROBE };
        warn!("Could not extract JSON from radius output");
        return Parsed::failed(e);
    };

    let document: Value = match serde_json::from_str(payload.as_str()) {
        Ok(v) => v,
        Err(source) => {
            let e = ParseError::InvalidJson { probe: PROBE, source };
            error!("Failed to parse radius output: {e}");
            return Parsed::failed(e);
        }
    };

    let mut parsed = Parsed::new();
    let entries = document
        .get("testResponse")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    for (index, entry) in entries.iter().enumerate() {
        match parse_entry(entry) {
            Ok(record) => parsed.records.push(record),
            Err(reason) => {
                let e = ParseError::InvalidEntry {
                    probe: PROBE,
                    index,
                    reason,
                };
                warn!("Failed to parse radius entry: {e}");
                parsed.skipped.push(e);
            }
        }
    }

    parsed
}

fn parse_entry(entry: &Value) -> Result<RadiusRecord, String> {
    let entry = entry
        .as_object()
        .ok_or_else(|| format!("expected an object, got {entry}"))?;

    let ip = match entry.get("serverIP") {
        None => "unknown".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };
    let port = entry
        .get("port")
        .cloned()
        .unwrap_or_else(|| Value::from("unknown"));

    let status = match entry.get("status") {
        None => None,
        Some(Value::Object(status)) => Some(status),
        Some(other) => return Err(format!("status is not an object: {other}")),
    };

    let error_code = match status.and_then(|s| s.get("errorCode")) {
        None => "unknown".to_string(),
        Some(Value::String(code)) => code.to_lowercase(),
        Some(other) => return Err(format!("errorCode is not a string: {other}")),
    };
    let error_msg = match status.and_then(|s| s.get("errorMsg")) {
        None => "No error message".to_string(),
        Some(Value::String(msg)) => msg.clone(),
        Some(other) => other.to_string(),
    };

    let state = if DOWN_CODES.contains(&error_code.as_str()) {
        EdgeState::Down
    } else {
        EdgeState::Up
    };

    let port_text = match &port {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };

    Ok(RadiusRecord {
        target: format!("{ip}:{port_text}"),
        ip,
        port,
        state,
        error_code,
        error_msg,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_SERVERS: &str = r#"Mon Oct 13 10:21:07.512 UTC+00:00
result {
  "testResponse": [
    {
      "serverIP": "10.50.1.10",
      "port": 1812,
      "status": { "errorCode": "Reject", "errorMsg": "Access-Reject received" }
    },
    {
      "serverIP": "10.50.1.11",
      "port": 1812
    }
  ]
}
"#;

    #[test]
    fn test_parse_two_entries() {
        let parsed = parse_radius(TWO_SERVERS);
        assert!(parsed.is_clean());
        assert_eq!(parsed.len(), 2);

        let rejected = &parsed.records[0];
        assert_eq!(rejected.target, "10.50.1.10:1812");
        assert_eq!(rejected.state, EdgeState::Down);
        assert_eq!(rejected.error_code, "reject");
        assert_eq!(rejected.error_msg, "Access-Reject received");

        let healthy = &parsed.records[1];
        assert_eq!(healthy.target, "10.50.1.11:1812");
        assert_eq!(healthy.state, EdgeState::Up);
        assert_eq!(healthy.error_code, "unknown");
        assert_eq!(healthy.error_msg, "No error message");
        assert_eq!(healthy.to_metadata()["port"], 1812);
    }

    #[test]
    fn test_down_codes_any_case() {
        for code in ["TIMEOUT", "Reject", "markedDead"] {
            let output = format!(
                r#"result {{"testResponse": [{{"serverIP": "1.1.1.1", "port": 1813, "status": {{"errorCode": "{code}"}}}}]}}"#
            );
            assert_eq!(parse_radius(&output).records[0].state, EdgeState::Down);
        }

        let output = r#"result {"testResponse": [{"serverIP": "1.1.1.1", "port": 1813, "status": {"errorCode": "none"}}]}"#;
        assert_eq!(parse_radius(output).records[0].state, EdgeState::Up);
    }

    #[test]
    fn test_missing_payload() {
        let parsed = parse_radius("Mon Oct 13 10:21:07 UTC\nNo RADIUS servers configured\n");
        assert!(parsed.is_empty());
        assert!(matches!(parsed.skipped[0], ParseError::MissingPayload { .. }));
    }

    #[test]
    fn test_invalid_json() {
        let parsed = parse_radius("result { \"testResponse\": [ }");
        assert!(parsed.is_empty());
        assert!(matches!(parsed.skipped[0], ParseError::InvalidJson { .. }));
    }

    #[test]
    fn test_bad_entries_skipped_individually() {
        let output = r#"result {"testResponse": [
            "oops",
            {"serverIP": "2.2.2.2", "port": 1812, "status": {"errorCode": 7}},
            {"port": 1812}
        ]}"#;
        let parsed = parse_radius(output);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed.skipped.len(), 2);
        assert_eq!(parsed.records[0].target, "unknown:1812");
    }

    #[test]
    fn test_missing_response_list() {
        let parsed = parse_radius("result {}");
        assert!(parsed.is_empty());
        assert!(parsed.is_clean());
    }
}
