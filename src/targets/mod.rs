//! Read-only view over the target inventory.
//!
//! Targets are pre-registered SSH endpoints kept in `DATA_DIR/servers.json`
//! by an external CRUD surface, which publishes updates atomically
//! (temp file + rename). The relay only ever reads: one snapshot per
//! handshake, no caching across sessions.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const STORE_FILE: &str = "servers.json";

const DEFAULT_SSH_PORT: u16 = 22;

fn default_port() -> u16 {
    DEFAULT_SSH_PORT
}

/// A pre-registered SSH endpoint. Immutable within a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    pub id: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    /// Cosmetic display name, never interpreted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Snapshot reader for the target store.
pub struct TargetStore {
    path: PathBuf,
}

impl TargetStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(STORE_FILE),
        }
    }

    /// Read a consistent snapshot of all targets.
    ///
    /// A missing, unreadable, or non-JSON file degrades to an empty list;
    /// new sessions will then see every target as unknown.
    pub fn snapshot(&self) -> Vec<Target> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Target store not found, treating as empty");
                return Vec::new();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read target store, treating as empty");
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<Target>>(&data) {
            Ok(targets) => targets,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Corrupt target store, treating as empty");
                Vec::new()
            }
        }
    }

    /// Resolve a target id against a fresh snapshot.
    pub fn lookup(&self, id: &str) -> Option<Target> {
        self.snapshot().into_iter().find(|t| t.id == id)
    }
}
