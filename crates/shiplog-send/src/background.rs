use std::path::Path;
use std::process::{Command, Stdio};

use shiplog_core::SendOptions;
use tracing::{debug, warn};

use crate::version;

/// Set on a re-dispatched "latest" process so it never re-enters the
/// version check (bounded recursion).
pub const DISPATCHED_LATEST_ENV: &str = "SHIPLOG_DISPATCHED_LATEST";

/// Set on every detached child so it runs the upload inline instead of
/// dispatching another child.
pub const DETACHED_ENV: &str = "SHIPLOG_DETACHED";

/// Override for the spawned program (tests, custom installs). Defaults to
/// the current executable.
pub const BIN_ENV: &str = "SHIPLOG_BIN";

/// What the background orchestrator decided. Every branch returns in
/// milliseconds; nothing here waits on a child or on the network beyond
/// the bounded, cached version lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Not a background+hook invocation, or we *are* the detached child —
    /// the caller should run the upload inline.
    RunInline,
    /// Another process already has an upload in flight.
    SkippedUploadRunning,
    /// Spawned a detached process running the newest released version.
    SpawnedLatest { version: String },
    /// Spawned a detached process running the current version.
    SpawnedCurrent,
    /// Spawn failed; error was logged.
    SpawnFailed,
}

/// Decide whether to hand the upload to a detached process.
///
/// Invoked only when both `background` and `hook_trigger` are set; the
/// hook call must return immediately regardless of network conditions, so
/// all real work happens in a child the parent never waits on.
pub fn dispatch_background(
    state_dir: &Path,
    opts: &SendOptions,
    current_version: &str,
) -> Dispatch {
    if !(opts.background && opts.hook_trigger.is_some()) {
        return Dispatch::RunInline;
    }
    if std::env::var_os(DETACHED_ENV).is_some() {
        // We are the detached worker — do the upload, don't re-dispatch
        return Dispatch::RunInline;
    }

    // 1. Duplicate-upload guard: probe only. The child acquires the guard
    //    for the duration of its run.
    let guard_path = shiplog_lock::upload_guard_path(state_dir);
    if let Some(info) = shiplog_lock::read_info(&guard_path) {
        if shiplog_core::now_unix() - info.timestamp <= shiplog_lock::STALE_AFTER_SECS {
            debug!(holder = info.pid, "upload already running, skipping dispatch");
            return Dispatch::SkippedUploadRunning;
        }
    }

    // 2-3. Self-update path, unless we are already a re-dispatched process
    if std::env::var_os(DISPATCHED_LATEST_ENV).is_none() {
        if let Some(latest) = version::latest_release(state_dir) {
            if version::is_newer(&latest, current_version) {
                let lock_path = shiplog_lock::update_lock_path(state_dir);
                if let Some(lock) = shiplog_lock::try_acquire(&lock_path, current_version) {
                    let spawned = spawn_detached(opts, Some(&latest));
                    lock.release();
                    if spawned {
                        return Dispatch::SpawnedLatest { version: latest };
                    }
                    return Dispatch::SpawnFailed;
                }
                // Another process is already updating — fall through to a
                // current-version dispatch
            }
        }
    }

    // 4. Current-version detached upload
    if spawn_detached(opts, None) {
        Dispatch::SpawnedCurrent
    } else {
        Dispatch::SpawnFailed
    }
}

/// Fire-and-forget spawn of the send child. Returns as soon as the OS has
/// the process; the child's lifetime is independent of ours.
fn spawn_detached(opts: &SendOptions, latest: Option<&str>) -> bool {
    let program = match std::env::var(BIN_ENV) {
        Ok(bin) => std::path::PathBuf::from(bin),
        Err(_) => match std::env::current_exe() {
            Ok(exe) => exe,
            Err(err) => {
                warn!(%err, "cannot resolve executable for background dispatch");
                return false;
            }
        },
    };

    let mut cmd = Command::new(program);
    cmd.arg("send").arg("--silent").arg("--background");
    if let Some(trigger) = &opts.hook_trigger {
        cmd.arg(format!("--hook-trigger={trigger}"));
    }
    if let Some(v) = latest {
        cmd.arg(format!("--hook-version={v}"));
        cmd.env(DISPATCHED_LATEST_ENV, "1");
    }
    if let Some(dir) = &opts.claude_project_dir {
        cmd.arg(format!("--claude-project-dir={}", dir.display()));
    }
    if opts.all {
        cmd.arg("--all");
    }
    cmd.env(DETACHED_ENV, "1")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    match cmd.spawn() {
        Ok(_child) => true,
        Err(err) => {
            warn!(%err, "background spawn failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::{VersionCache, VERSION_CACHE_TTL_SECS};
    use std::time::{Duration, Instant};

    fn bg_opts() -> SendOptions {
        SendOptions {
            silent: true,
            background: true,
            hook_trigger: Some("sessionend".into()),
            ..Default::default()
        }
    }

    fn write_fresh_version_cache(state_dir: &Path, latest: &str) {
        let cache = VersionCache {
            latest: latest.into(),
            checked_at_unix: shiplog_core::now_unix(),
        };
        std::fs::write(
            state_dir.join("version_cache.json"),
            serde_json::to_string(&cache).unwrap(),
        )
        .unwrap();
    }

    #[test]
    fn non_background_runs_inline() {
        let tmp = tempfile::tempdir().unwrap();
        let opts = SendOptions::default();
        assert_eq!(
            dispatch_background(tmp.path(), &opts, "0.2.0"),
            Dispatch::RunInline
        );
    }

    #[test]
    fn fresh_upload_guard_skips_dispatch() {
        let tmp = tempfile::tempdir().unwrap();
        let guard = shiplog_lock::try_acquire(
            &shiplog_lock::upload_guard_path(tmp.path()),
            "0.2.0",
        )
        .unwrap();

        let decision = dispatch_background(tmp.path(), &bg_opts(), "0.2.0");
        assert_eq!(decision, Dispatch::SkippedUploadRunning);
        guard.release();
    }

    #[test]
    fn dispatch_returns_promptly_and_spawns() {
        let _env = crate::env_lock();
        let tmp = tempfile::tempdir().unwrap();
        // Cache says no newer release, so no registry call and no update path
        write_fresh_version_cache(tmp.path(), "0.2.0");
        std::env::set_var(BIN_ENV, "true");

        let started = Instant::now();
        let decision = dispatch_background(tmp.path(), &bg_opts(), "0.2.0");
        let elapsed = started.elapsed();
        std::env::remove_var(BIN_ENV);

        assert_eq!(decision, Dispatch::SpawnedCurrent);
        assert!(
            elapsed < Duration::from_millis(500),
            "dispatch must not block, took {elapsed:?}"
        );
    }

    #[test]
    fn newer_release_dispatches_latest_under_update_lock() {
        let _env = crate::env_lock();
        let tmp = tempfile::tempdir().unwrap();
        write_fresh_version_cache(tmp.path(), "0.9.0");
        std::env::set_var(BIN_ENV, "true");

        let decision = dispatch_background(tmp.path(), &bg_opts(), "0.2.0");
        std::env::remove_var(BIN_ENV);

        assert_eq!(
            decision,
            Dispatch::SpawnedLatest {
                version: "0.9.0".into()
            }
        );
        // Update lock released after the fire-and-forget spawn
        assert!(!shiplog_lock::update_lock_path(tmp.path()).exists());
    }

    #[test]
    fn held_update_lock_falls_back_to_current_version() {
        let _env = crate::env_lock();
        let tmp = tempfile::tempdir().unwrap();
        write_fresh_version_cache(tmp.path(), "0.9.0");
        let _lock = shiplog_lock::try_acquire(
            &shiplog_lock::update_lock_path(tmp.path()),
            "0.2.0",
        )
        .unwrap();
        std::env::set_var(BIN_ENV, "true");

        let decision = dispatch_background(tmp.path(), &bg_opts(), "0.2.0");
        std::env::remove_var(BIN_ENV);

        assert_eq!(decision, Dispatch::SpawnedCurrent);
    }

    #[test]
    fn stale_version_cache_with_dead_registry_still_dispatches() {
        let _env = crate::env_lock();
        let tmp = tempfile::tempdir().unwrap();
        let cache = VersionCache {
            latest: "0.9.0".into(),
            checked_at_unix: shiplog_core::now_unix() - VERSION_CACHE_TTL_SECS - 60,
        };
        std::fs::write(
            tmp.path().join("version_cache.json"),
            serde_json::to_string(&cache).unwrap(),
        )
        .unwrap();
        std::env::set_var("SHIPLOG_REGISTRY_URL", "http://127.0.0.1:9/crates/shiplog");
        std::env::set_var(BIN_ENV, "true");

        let decision = dispatch_background(tmp.path(), &bg_opts(), "0.2.0");
        std::env::remove_var("SHIPLOG_REGISTRY_URL");
        std::env::remove_var(BIN_ENV);

        // Lookup failure degrades to "no update": still uploads on current
        assert_eq!(decision, Dispatch::SpawnedCurrent);
    }
}
