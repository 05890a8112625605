//! # Fleetgraph
//!
//! Topology snapshots for small network-equipment fleets.
//!
//! Fleetgraph logs into each device of a configured roster over an SSH CLI
//! session, runs a fixed set of diagnostic commands, parses their output and
//! assembles everything into one node/edge graph.
//!
//! ## Layers
//!
//! - [`parser`]: stateless parsers for peer tables, BGP neighbour lists,
//!   RADIUS test results, role markers and prompts
//! - [`graph`]: the snapshot model and the [`GraphAssembler`] that owns node
//!   identity and edge ids for one pass
//! - [`collector`]: the per-pass driver that probes devices and isolates
//!   their failures
//! - [`session`]: the device session traits and their russh implementation
//! - [`sink`]: snapshot persistence
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fleetgraph::{Collector, FleetConfig, JsonFileSink, SnapshotSink, SshSessionFactory};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), fleetgraph::Error> {
//!     let config = FleetConfig::load("fleetgraph.toml")?.with_env_overrides()?;
//!     let sink = JsonFileSink::new(&config.output_path);
//!     let factory = SshSessionFactory::new(config.terminator_pattern()?);
//!
//!     let collector = Collector::new(config, factory)?;
//!     let report = collector.collect().await;
//!     sink.persist(&report.snapshot)?;
//!     Ok(())
//! }
//! ```

pub mod collector;
pub mod config;
pub mod error;
pub mod graph;
pub mod parser;
pub mod session;
pub mod sink;

// Re-export main types for convenience
pub use collector::{CollectionReport, Collector, DeviceFailure, FailureStage, ParseIssue};
pub use config::{DeviceDescriptor, FleetConfig, HostKeyVerification};
pub use error::{Error, Result};
pub use graph::{DeviceRoleSet, Edge, EdgeState, GraphAssembler, Node, NodeType, Snapshot};
pub use session::{DeviceSession, SessionFactory, SshSessionFactory};
pub use sink::{JsonFileSink, SnapshotSink};
