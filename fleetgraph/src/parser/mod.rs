//! Parsers for raw device CLI output.
//!
//! Each parser is a stateless function over the text a probe returned.
//! Parsers never fail as a whole: rows or entries that cannot be read are
//! logged, reported back in [`Parsed::skipped`], and the rest is kept.

mod bgp;
mod peers;
mod prompt;
mod radius;
mod role;
mod session_count;

pub use bgp::{BgpRecord, ESTABLISHED_MARKER, parse_bgp};
pub use peers::{MIN_PEER_COLUMNS, PeerMetadata, PeerRecord, parse_peers};
pub use prompt::parse_prompt;
pub use radius::{RadiusRecord, parse_radius};
pub use role::parse_role;
pub use session_count::parse_session_count;

use crate::error::ParseError;

/// Output of a list parser: the records read plus what was skipped.
#[derive(Debug)]
pub struct Parsed<T> {
    /// Records that parsed cleanly, in input order.
    pub records: Vec<T>,

    /// One error per rejected row, entry or payload.
    pub skipped: Vec<ParseError>,
}

impl<T> Parsed<T> {
    pub(crate) fn new() -> Self {
        Self {
            records: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// A result with no records and a single payload-level error.
    pub(crate) fn failed(error: ParseError) -> Self {
        Self {
            records: Vec::new(),
            skipped: vec![error],
        }
    }

    /// Check if nothing was skipped.
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<T> Default for Parsed<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> IntoIterator for Parsed<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}
