//! Snapshot persistence.

use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use crate::error::SinkError;
use crate::graph::Snapshot;

/// Destination for finished snapshots.
pub trait SnapshotSink {
    /// Persist one snapshot.
    fn persist(&self, snapshot: &Snapshot) -> Result<(), SinkError>;
}

/// Writes snapshots as pretty-printed JSON.
///
/// The document is written to a sibling `.tmp` file and renamed over the
/// target, so readers never see a half-written file.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "snapshot.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, source: std::io::Error) -> SinkError {
        SinkError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl SnapshotSink for JsonFileSink {
    fn persist(&self, snapshot: &Snapshot) -> Result<(), SinkError> {
        let json = serde_json::to_vec_pretty(snapshot)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let temp = self.temp_path();
        fs::write(&temp, &json).map_err(|e| self.io_error(e))?;
        fs::rename(&temp, &self.path).map_err(|e| self.io_error(e))?;

        info!("Topology written to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Node, NodeType};

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("fleetgraph-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_persist_creates_parent_and_replaces() {
        let dir = scratch_dir("sink");
        let path = dir.join("static").join("topology.json");
        let sink = JsonFileSink::new(&path);

        let mut snapshot = Snapshot::default();
        sink.persist(&snapshot).unwrap();

        snapshot.nodes.push(Node::labelled_by_id("cp-bgl-01", NodeType::Cp));
        sink.persist(&snapshot).unwrap();

        let written: Snapshot = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(written, snapshot);
        assert!(!sink.temp_path().exists());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_persist_reports_io_error() {
        let dir = scratch_dir("sink-blocked");
        fs::create_dir_all(&dir).unwrap();
        let blocker = dir.join("not-a-dir");
        fs::write(&blocker, b"x").unwrap();

        let sink = JsonFileSink::new(blocker.join("topology.json"));
        let err = sink.persist(&Snapshot::default()).unwrap_err();
        assert!(matches!(err, SinkError::Io { .. }));

        fs::remove_dir_all(&dir).unwrap();
    }
}
