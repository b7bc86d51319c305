use std::path::Path;
use std::sync::mpsc;
use std::time::Duration;

use tracing::warn;

use crate::error::SendError;
use crate::orchestrator::SendReport;

/// Hard ceiling for a blocking editor-lifecycle hook. The host tool waits
/// on us synchronously; past this bound we abandon the attempt and return
/// control.
pub const HOOK_TIMEOUT: Duration = Duration::from_secs(60);

/// Fixed signal printed in `--test` mode, consumed by host-tool hook
/// validators. No work is performed.
pub const HOOK_TEST_SIGNAL: &str = "shiplog hook ok";

/// What a hook-triggered send amounted to. Never an error: hooks must
/// return control to the host tool promptly and must never surface a
/// hook-breaking failure.
#[derive(Debug)]
pub enum HookOutcome {
    Completed(SendReport),
    /// Includes the informational "nothing new to send" case.
    NothingToSend,
    /// Another process holds the upload guard; no work was attempted.
    Busy,
    TimedOut,
    /// Error was logged and swallowed.
    Failed,
}

/// Run a send attempt under a hard timeout, swallowing every failure.
///
/// The work runs on a worker thread; if it outlives `timeout` the hook
/// returns without it (the abandoned worker dies with the process).
pub fn run_hook_send<F>(work: F, timeout: Duration) -> HookOutcome
where
    F: FnOnce() -> Result<SendReport, SendError> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let _ = tx.send(work());
    });

    match rx.recv_timeout(timeout) {
        Ok(Ok(report)) => HookOutcome::Completed(report),
        Ok(Err(SendError::NoSessions { .. })) => HookOutcome::NothingToSend,
        Ok(Err(err)) => {
            warn!(%err, "hook send failed (swallowed)");
            HookOutcome::Failed
        }
        Err(_) => {
            warn!(timeout_secs = timeout.as_secs(), "hook send timed out (swallowed)");
            HookOutcome::TimedOut
        }
    }
}

/// Hook-mode send under the upload guard.
///
/// The guard is acquired and held on the calling thread, not inside the
/// worker: when the worker overruns the timeout and is abandoned, the
/// guard still drops here and the lock file does not linger until the
/// staleness cutoff.
pub fn run_hook_send_guarded<F>(
    state_dir: &Path,
    version: &str,
    work: F,
    timeout: Duration,
) -> HookOutcome
where
    F: FnOnce() -> Result<SendReport, SendError> + Send + 'static,
{
    let guard_path = shiplog_lock::upload_guard_path(state_dir);
    let _guard = match shiplog_lock::try_acquire(&guard_path, version) {
        Some(guard) => guard,
        None => return HookOutcome::Busy,
    };
    run_hook_send(work, timeout)
}
