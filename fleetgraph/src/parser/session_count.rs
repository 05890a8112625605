//! Subscriber session count extraction.

use std::sync::LazyLock;

use regex::Regex;

static SESSION_COUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""sessionCount":\s*(\d+)"#).unwrap());

/// Read `"sessionCount": N` out of a count probe; 0 when absent.
pub fn parse_session_count(output: &str) -> u64 {
    SESSION_COUNT
        .captures(output)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}
