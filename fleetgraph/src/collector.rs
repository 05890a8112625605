//! One collection pass over the device roster.
//!
//! The [`Collector`] probes each configured device in turn, parses what
//! comes back and folds it into a single [`GraphAssembler`]. A device that
//! cannot be reached or fails mid-probe is abandoned for this pass; its
//! failure is recorded and the remaining devices are still collected.

use indexmap::IndexMap;
use log::{debug, error, info, warn};
use regex::bytes::Regex;
use serde_json::Value;

use crate::config::{DeviceDescriptor, FleetConfig};
use crate::error::{ConfigError, Error, ParseError};
use crate::graph::{DeviceRoleSet, GraphAssembler, Metadata, Node, NodeType, Snapshot};
use crate::parser::{
    Parsed, parse_bgp, parse_peers, parse_prompt, parse_radius, parse_role, parse_session_count,
};
use crate::session::{DeviceSession, SessionFactory};

pub const SHOW_PEERS: &str = "show peers all";
pub const SHOW_BGP_NEIGHBORS: &str = "show bgp-neighbors";
pub const TEST_RADIUS_AUTH: &str = "test-radius authentication all";
pub const TEST_RADIUS_ACCT: &str = "test-radius accounting all";
pub const SHOW_ROLE_1: &str = "show role instance-id 1";
pub const SHOW_ROLE_2: &str = "show role instance-id 2";
pub const SHOW_SUBSCRIBER_COUNT: &str = "show subscriber session count";

const BGP_LABEL: &str = "BGP";
const BGP_SUFFIX: &str = "bgp";
const RADIUS_LABEL: &str = "RADIUS";

// Fixed enrichment attached to newly discovered peers. These values do not
// come from the device.
const PEER_PLACEHOLDERS: [(&str, &str); 3] = [
    ("CPU", "60%"),
    ("Memory", "49%"),
    ("Location", "BGL LAB 01"),
];

/// Subscriber count probe scoped to one UPF peer.
pub fn subscriber_count_command(upf: &str) -> String {
    format!("show subscriber session filter {{ upf {upf} }} count")
}

/// Where in the device sequence a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    /// The session could not be opened.
    Connect,
    /// The session opened but probing failed.
    Probe,
}

/// A device abandoned during a pass.
#[derive(Debug)]
pub struct DeviceFailure {
    pub address: String,
    pub stage: FailureStage,
    pub error: Error,
}

/// A row, entry or payload a parser skipped.
#[derive(Debug)]
pub struct ParseIssue {
    /// Hostname of the device whose output it came from.
    pub device: String,
    /// Probe command that produced the output.
    pub command: &'static str,
    pub error: ParseError,
}

/// Result of one pass: the snapshot plus everything that went wrong.
#[derive(Debug)]
pub struct CollectionReport {
    pub snapshot: Snapshot,
    pub failures: Vec<DeviceFailure>,
    pub parse_issues: Vec<ParseIssue>,
}

impl CollectionReport {
    /// Check if every device was collected without parse issues.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.parse_issues.is_empty()
    }
}

/// Raw output kept for processing after the session is released.
struct DeferredOutput {
    hostname: String,
    bgp: String,
    radius_auth: String,
    radius_acct: String,
}

/// Mutable state of one pass.
#[derive(Default)]
struct Pass {
    graph: GraphAssembler,
    device_roles: IndexMap<String, DeviceRoleSet>,
    /// Device address -> resolved hostname, in roster order.
    hostnames: IndexMap<String, String>,
    parse_issues: Vec<ParseIssue>,
}

impl Pass {
    fn take_issues<T>(&mut self, device: &str, command: &'static str, parsed: Parsed<T>) -> Vec<T> {
        self.parse_issues
            .extend(parsed.skipped.into_iter().map(|error| ParseIssue {
                device: device.to_string(),
                command,
                error,
            }));
        parsed.records
    }
}

/// Drives collection passes over a fixed roster.
pub struct Collector<F> {
    config: FleetConfig,
    factory: F,
    terminator: Regex,
}

impl<F: SessionFactory> Collector<F> {
    /// Create a collector for the configured roster.
    pub fn new(config: FleetConfig, factory: F) -> Result<Self, ConfigError> {
        let terminator = config.terminator_pattern()?;
        Ok(Self {
            config,
            factory,
            terminator,
        })
    }

    pub fn config(&self) -> &FleetConfig {
        &self.config
    }

    /// Run one full pass and build a fresh snapshot.
    ///
    /// Never fails: unreachable or misbehaving devices are reported in
    /// [`CollectionReport::failures`].
    pub async fn collect(&self) -> CollectionReport {
        let mut pass = Pass::default();
        let mut failures = Vec::new();

        for device in &self.config.devices {
            if let Err(failure) = self.collect_device(device, &mut pass).await {
                match failure.stage {
                    FailureStage::Connect => match failure.error {
                        Error::Session(ref e) if e.is_auth_failure() => {
                            error!("Authentication failed for {}: {}", device.address, e)
                        }
                        ref e => error!("Failed to connect: {} - {}", device.address, e),
                    },
                    FailureStage::Probe => {
                        error!("Failed for device {}: {}", device.address, failure.error)
                    }
                }
                failures.push(failure);
            }
        }

        let Pass {
            mut graph,
            device_roles,
            hostnames,
            parse_issues,
        } = pass;

        let roster: Vec<String> = hostnames.values().cloned().collect();
        graph.connect_remaining_pairs(&roster, |host| {
            hostnames
                .iter()
                .find(|(_, h)| h.as_str() == host)
                .map(|(address, _)| address.clone())
        });

        info!(
            "collection pass finished: {} nodes, {} edges, {} failed devices",
            graph.node_count(),
            graph.edge_count(),
            failures.len()
        );

        CollectionReport {
            snapshot: graph.into_snapshot(device_roles),
            failures,
            parse_issues,
        }
    }

    async fn collect_device(
        &self,
        device: &DeviceDescriptor,
        pass: &mut Pass,
    ) -> Result<(), DeviceFailure> {
        let failure = |stage, error: Error| DeviceFailure {
            address: device.address.clone(),
            stage,
            error,
        };

        let mut session = self
            .factory
            .open(device)
            .await
            .map_err(|e| failure(FailureStage::Connect, e.into()))?;
        info!("Connected to {}", device.address);

        let deferred = match self.probe(&mut session, device, pass).await {
            Ok(deferred) => deferred,
            Err(e) => {
                if let Err(close_err) = session.close().await {
                    debug!("closing {} after failure: {}", device.address, close_err);
                }
                return Err(failure(FailureStage::Probe, e));
            }
        };

        if let Err(e) = session.close().await {
            warn!("Failed to close session to {}: {}", device.address, e);
        }

        self.apply_deferred(deferred, pass);
        Ok(())
    }

    /// Everything that needs the live session: hostname, roles, self node
    /// and peers. BGP and RADIUS output is returned for later processing.
    async fn probe(
        &self,
        session: &mut F::Session,
        device: &DeviceDescriptor,
        pass: &mut Pass,
    ) -> Result<DeferredOutput, Error> {
        let hostname = parse_prompt(&session.resolve_prompt().await?);
        debug!("{} resolved to hostname {}", device.address, hostname);
        pass.hostnames
            .insert(device.address.clone(), hostname.clone());
        // Typed as a control-plane node even if a later probe abandons the device
        pass.graph
            .upsert_node(Node::labelled_by_id(hostname.clone(), NodeType::Cp));

        let peers_output = self.run(session, SHOW_PEERS).await?;
        let bgp = self.run(session, SHOW_BGP_NEIGHBORS).await?;
        let radius_auth = self.run(session, TEST_RADIUS_AUTH).await?;
        let radius_acct = self.run(session, TEST_RADIUS_ACCT).await?;
        let role_1 = self.run(session, SHOW_ROLE_1).await?;
        let role_2 = self.run(session, SHOW_ROLE_2).await?;

        let mut roles = DeviceRoleSet::new();
        if let Some(role) = parse_role(&role_1) {
            roles.insert(1, role);
        }
        if let Some(role) = parse_role(&role_2) {
            roles.insert(2, role);
        }
        pass.device_roles.insert(hostname.clone(), roles);

        let own_count = parse_session_count(&self.run(session, SHOW_SUBSCRIBER_COUNT).await?);
        let mut own_metadata = Metadata::new();
        own_metadata.insert("upf_sub_count".into(), Value::from(own_count));
        pass.graph.upsert_node(
            Node::labelled_by_id(hostname.clone(), NodeType::Cp).with_metadata(own_metadata),
        );

        let peers = parse_peers(&peers_output);
        for peer in pass.take_issues(&hostname, SHOW_PEERS, peers) {
            let upf_sub_count = if peer.node_type == NodeType::Router {
                let command = subscriber_count_command(&peer.target);
                let count = parse_session_count(&self.run(session, &command).await?);
                debug!("{}: upf {} has {} sessions", hostname, peer.target, count);
                Some(count)
            } else {
                None
            };

            let edge_metadata = peer.metadata.to_metadata();
            if !pass.graph.contains_node(&peer.target) {
                let mut metadata = edge_metadata.clone();
                metadata.insert("upf_sub_count".into(), Value::from(upf_sub_count));
                for (key, value) in PEER_PLACEHOLDERS {
                    metadata.insert(key.into(), Value::from(value));
                }
                pass.graph.upsert_node(
                    Node::labelled_by_id(peer.target.clone(), peer.node_type).with_metadata(metadata),
                );
            }

            pass.graph.append_edge(
                &hostname,
                &peer.target,
                peer.protocol,
                peer.state,
                edge_metadata,
                None,
            );
        }

        Ok(DeferredOutput {
            hostname,
            bgp,
            radius_auth,
            radius_acct,
        })
    }

    /// BGP and RADIUS post-processing; needs no session.
    fn apply_deferred(&self, deferred: DeferredOutput, pass: &mut Pass) {
        let hostname = deferred.hostname.as_str();

        let sessions = pass.take_issues(hostname, SHOW_BGP_NEIGHBORS, parse_bgp(&deferred.bgp));
        for bgp in sessions {
            pass.graph
                .insert_node_if_absent(Node::labelled_by_id(bgp.peer.clone(), NodeType::Site));
            pass.graph.append_edge(
                hostname,
                &bgp.peer,
                BGP_LABEL,
                bgp.state,
                Metadata::new(),
                Some(BGP_SUFFIX),
            );
        }

        for (command, output) in [
            (TEST_RADIUS_AUTH, &deferred.radius_auth),
            (TEST_RADIUS_ACCT, &deferred.radius_acct),
        ] {
            for server in pass.take_issues(hostname, command, parse_radius(output)) {
                let metadata = server.to_metadata();
                pass.graph.insert_node_if_absent(
                    Node::new(&server.target, server.target.to_uppercase(), NodeType::Radius)
                        .with_metadata(metadata.clone()),
                );
                pass.graph.append_edge(
                    hostname,
                    &server.target,
                    RADIUS_LABEL,
                    server.state,
                    metadata,
                    None,
                );
            }
        }
    }

    async fn run(&self, session: &mut F::Session, command: &str) -> Result<String, Error> {
        debug!("sending '{command}'");
        Ok(session.send_command(command, &self.terminator).await?)
    }
}
