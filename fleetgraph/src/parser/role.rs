//! Parser for `show role instance-id N`.

use std::sync::LazyLock;

use log::debug;
use regex::Regex;

static ROLE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"(?i)result\s+"([^"]+)""#).unwrap());

/// Extract the role reported for one instance (e.g. `primary`, `standby`).
///
/// Only the first line that starts with `result` and carries a quoted value
/// counts. Returns `None` when no such line exists.
pub fn parse_role(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("result"))
        .find_map(|line| ROLE.captures(line))
        .and_then(|caps| caps.get(1))
        .map(|m| {
            let role = m.as_str().to_lowercase();
            debug!("parsed role result: {role}");
            role
        })
}
