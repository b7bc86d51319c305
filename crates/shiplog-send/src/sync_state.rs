use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

const SYNC_STATE_FILE: &str = "sync_state.json";

/// Canonical per-project key: the path string without trailing separators,
/// so `--claude-project-dir=/repo/app/` and a transcript `cwd` of
/// `/repo/app` read and write the same entry.
pub fn project_key(path: &str) -> String {
    let trimmed = path.trim_end_matches(['/', '\\']);
    if trimmed.is_empty() {
        path.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Persisted "last synced" watermark: global timestamp plus a per-project
/// map. Read at LOAD, written at PERSIST. Last writer wins — uploads are
/// idempotent per session identity at the remote service, so no merge
/// logic is needed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncState {
    pub last_sync_unix: i64,
    #[serde(default)]
    pub projects: BTreeMap<String, i64>,
}

impl SyncState {
    /// Load from the state directory. Missing or corrupt state means
    /// "never synced" — an onboarding run, not an error.
    pub fn load(state_dir: &Path) -> Self {
        let path = state_dir.join(SYNC_STATE_FILE);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(_) => return Self::default(),
        };
        match serde_json::from_str(&content) {
            Ok(state) => state,
            Err(err) => {
                warn!(path = %path.display(), %err, "corrupt sync state, resetting watermark");
                Self::default()
            }
        }
    }

    pub fn save(&self, state_dir: &Path) -> anyhow::Result<()> {
        let data = serde_json::to_string_pretty(self)?;
        shiplog_core::write_atomic(&state_dir.join(SYNC_STATE_FILE), data.as_bytes())
    }

    /// Advance the global watermark and the given project's entry.
    pub fn record(&mut self, project: &str, now_unix: i64) {
        self.last_sync_unix = self.last_sync_unix.max(now_unix);
        let entry = self.projects.entry(project.to_string()).or_insert(0);
        *entry = (*entry).max(now_unix);
    }

    /// Watermark to scope a LOAD: per-project when known, global otherwise.
    /// `None` means no prior sync (onboarding).
    pub fn watermark_for(&self, project: Option<&str>) -> Option<i64> {
        let ts = match project {
            Some(p) => self.projects.get(p).copied().unwrap_or(self.last_sync_unix),
            None => self.last_sync_unix,
        };
        (ts > 0).then_some(ts)
    }

    pub fn is_onboarding(&self) -> bool {
        self.last_sync_unix == 0
    }
}
