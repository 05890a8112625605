//! Error types for fleetgraph.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Main error type for fleetgraph operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Device session errors (connection, authentication, command I/O)
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Snapshot persistence errors
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),
}

/// Device session errors.
///
/// Authentication failures are kept apart from connectivity failures so the
/// collector can report them distinctly.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Failed to connect to host
    #[error("Connection failed to {host}:{port}: {source}")]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// Authentication was rejected
    #[error("Authentication failed for user '{user}' on {host}")]
    AuthenticationFailed { user: String, host: String },

    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// SSH key could not be loaded
    #[error("SSH key error: {0}")]
    Key(String),

    /// Host key is not in known_hosts (strict mode)
    #[error("Host key for {host}:{port} is not known")]
    HostKeyUnknown { host: String, port: u16 },

    /// Host key differs from the one recorded in known_hosts
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// known_hosts could not be read or written
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Channel closed before the terminator was seen
    #[error("Channel closed")]
    Closed,
}

impl SessionError {
    /// Whether this error means the credentials were rejected.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, SessionError::AuthenticationFailed { .. })
    }
}

/// Line-, entry- and payload-level parse errors.
///
/// These never abort a collection pass and are not wrapped in [`Error`];
/// parsers return them alongside the records they could read.
#[derive(Error, Debug)]
pub enum ParseError {
    /// A table row had fewer columns than required
    #[error("Row has {found} columns, need at least {required}: '{line}'")]
    TooFewColumns {
        line: String,
        found: usize,
        required: usize,
    },

    /// A line carried the expected marker but too few fields
    #[error("Row has {found} fields, need at least {required}: '{line}'")]
    TooFewFields {
        line: String,
        found: usize,
        required: usize,
    },

    /// No embedded JSON payload was found after the result marker
    #[error("No JSON payload found in {probe} output")]
    MissingPayload { probe: &'static str },

    /// The embedded JSON payload did not parse
    #[error("Invalid JSON payload in {probe} output: {source}")]
    InvalidJson {
        probe: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// A single entry inside a payload was malformed
    #[error("Skipping {probe} entry {index}: {reason}")]
    InvalidEntry {
        probe: &'static str,
        index: usize,
        reason: String,
    },
}

/// Configuration loading errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Config file is not valid TOML for the expected shape
    #[error("Failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),

    /// Config values are inconsistent
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    /// Terminator pattern does not compile
    #[error("Invalid terminator pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// Snapshot persistence errors.
#[derive(Error, Debug)]
pub enum SinkError {
    /// Writing or renaming the output file failed
    #[error("Failed to write snapshot to '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Snapshot could not be serialised
    #[error("Failed to serialise snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result type alias using fleetgraph's Error.
pub type Result<T> = std::result::Result<T, Error>;
