//! Hostname extraction from a CLI prompt.

/// Derive the device hostname from its prompt.
///
/// Bracketed prompts such as `[cp-bgl-01/local]cp#` yield the text before
/// the first `]` without the leading `[`; plain prompts such as `cp-bgl-01#`
/// lose their trailing `#`/`>` characters.
pub fn parse_prompt(prompt: &str) -> String {
    let prompt = prompt.trim();
    match prompt.split_once(']') {
        Some((head, _)) => head.trim_start_matches('[').to_string(),
        None => prompt.trim_end_matches(['#', '>']).to_string(),
    }
}
