use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Return the per-user state root: `~/.local/share/shiplog/` (platform
/// equivalent via `dirs::data_dir()`), overridable with `SHIPLOG_STATE_DIR`.
///
/// Lock files, the sync watermark, and the version cache all live here; no
/// other process should write these paths.
pub fn state_root() -> PathBuf {
    if let Ok(dir) = std::env::var("SHIPLOG_STATE_DIR") {
        return PathBuf::from(dir);
    }
    if let Some(data_dir) = dirs::data_dir() {
        data_dir.join("shiplog")
    } else if let Some(home) = dirs::home_dir() {
        home.join(".shiplog")
    } else {
        PathBuf::from(".shiplog-state")
    }
}

/// Atomic write: write to temp file in same dir, then rename.
pub fn write_atomic(path: &Path, data: &[u8]) -> anyhow::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("no parent dir for {}", path.display()))?;
    std::fs::create_dir_all(parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(data)?;
    tmp.flush()?;
    tmp.persist(path)?;
    Ok(())
}

/// Current wall-clock time as unix seconds.
pub fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_root_is_not_empty() {
        let root = state_root();
        assert!(!root.as_os_str().is_empty());
    }

    #[test]
    fn write_atomic_creates_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("sub").join("state.json");
        write_atomic(&path, b"{\"ok\":true}").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{\"ok\":true}");
    }

    #[test]
    fn write_atomic_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("state.json");
        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
    }

    #[test]
    fn now_unix_is_plausible() {
        // 2023-01-01 as a sanity floor
        assert!(now_unix() > 1_672_531_200);
    }
}
