use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Registry lookups are cached this long so rapid hook firings don't
/// hammer the registry.
pub const VERSION_CACHE_TTL_SECS: i64 = 300;

const CACHE_FILE: &str = "version_cache.json";
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(3);
const DEFAULT_REGISTRY_URL: &str = "https://crates.io/api/v1/crates/shiplog";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionCache {
    pub latest: String,
    pub checked_at_unix: i64,
}

impl VersionCache {
    fn is_fresh(&self, now_unix: i64) -> bool {
        now_unix - self.checked_at_unix <= VERSION_CACHE_TTL_SECS
    }
}

/// Latest released version, from the 5-minute cache or a bounded registry
/// lookup. Any failure degrades to `None` ("no update available") — a
/// version check must never break a hook invocation.
pub fn latest_release(state_dir: &Path) -> Option<String> {
    let now = shiplog_core::now_unix();
    if let Some(cache) = read_cache(state_dir) {
        if cache.is_fresh(now) {
            return Some(cache.latest);
        }
    }

    match fetch_registry() {
        Ok(latest) => {
            let cache = VersionCache {
                latest: latest.clone(),
                checked_at_unix: now,
            };
            if let Ok(data) = serde_json::to_string(&cache) {
                let _ = shiplog_core::write_atomic(&state_dir.join(CACHE_FILE), data.as_bytes());
            }
            Some(latest)
        }
        Err(err) => {
            debug!(%err, "version lookup failed, assuming no update");
            None
        }
    }
}

fn read_cache(state_dir: &Path) -> Option<VersionCache> {
    let content = std::fs::read_to_string(state_dir.join(CACHE_FILE)).ok()?;
    serde_json::from_str(&content).ok()
}

fn fetch_registry() -> anyhow::Result<String> {
    let url = std::env::var("SHIPLOG_REGISTRY_URL")
        .unwrap_or_else(|_| DEFAULT_REGISTRY_URL.to_string());
    let agent = ureq::Agent::config_builder()
        .timeout_global(Some(LOOKUP_TIMEOUT))
        .build()
        .new_agent();
    let mut response = agent.get(&url).call()?;
    let body: serde_json::Value = response.body_mut().read_json()?;
    body.get("crate")
        .and_then(|c| c.get("max_stable_version"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("registry response missing max_stable_version"))
}

/// Numeric dotted-version comparison: `is_newer("1.2.10", "1.2.9")` is true.
/// Unparsable segments compare as zero.
pub fn is_newer(candidate: &str, current: &str) -> bool {
    let parse = |v: &str| -> Vec<u64> {
        v.trim_start_matches('v')
            .split('.')
            .map(|seg| {
                seg.chars()
                    .take_while(|c| c.is_ascii_digit())
                    .collect::<String>()
                    .parse()
                    .unwrap_or(0)
            })
            .collect()
    };
    let a = parse(candidate);
    let b = parse(current);
    for i in 0..a.len().max(b.len()) {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        if x != y {
            return x > y;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newer_version_comparisons() {
        assert!(is_newer("0.3.0", "0.2.9"));
        assert!(is_newer("1.2.10", "1.2.9"));
        assert!(is_newer("v1.0.0", "0.9.9"));
        assert!(!is_newer("0.2.0", "0.2.0"));
        assert!(!is_newer("0.1.9", "0.2.0"));
        assert!(is_newer("1.0", "0.9.9"));
    }

    #[test]
    fn fresh_cache_short_circuits_network() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = VersionCache {
            latest: "9.9.9".into(),
            checked_at_unix: shiplog_core::now_unix(),
        };
        std::fs::write(
            tmp.path().join(CACHE_FILE),
            serde_json::to_string(&cache).unwrap(),
        )
        .unwrap();

        assert_eq!(latest_release(tmp.path()).as_deref(), Some("9.9.9"));
    }

    #[test]
    fn lookup_failure_degrades_to_none() {
        let _env = crate::env_lock();
        let tmp = tempfile::tempdir().unwrap();
        // Unroutable registry: connection refused immediately
        std::env::set_var("SHIPLOG_REGISTRY_URL", "http://127.0.0.1:9/crates/shiplog");
        let result = latest_release(tmp.path());
        std::env::remove_var("SHIPLOG_REGISTRY_URL");
        assert!(result.is_none());
    }

    #[test]
    fn stale_cache_is_ignored() {
        let _env = crate::env_lock();
        let tmp = tempfile::tempdir().unwrap();
        let cache = VersionCache {
            latest: "9.9.9".into(),
            checked_at_unix: shiplog_core::now_unix() - VERSION_CACHE_TTL_SECS - 60,
        };
        std::fs::write(
            tmp.path().join(CACHE_FILE),
            serde_json::to_string(&cache).unwrap(),
        )
        .unwrap();
        std::env::set_var("SHIPLOG_REGISTRY_URL", "http://127.0.0.1:9/crates/shiplog");
        let result = latest_release(tmp.path());
        std::env::remove_var("SHIPLOG_REGISTRY_URL");
        // Stale cache + failed refresh → no update claim
        assert!(result.is_none());
    }
}
