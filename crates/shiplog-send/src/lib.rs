pub mod background;
mod error;
pub mod hook;
mod orchestrator;
pub mod source;
pub mod sync_state;
pub mod transport;
pub mod version;

pub use background::{dispatch_background, Dispatch, DETACHED_ENV, DISPATCHED_LATEST_ENV};
pub use error::SendError;
pub use hook::{run_hook_send, run_hook_send_guarded, HookOutcome, HOOK_TIMEOUT};
pub use orchestrator::{
    send_sessions, Confirmation, SendContext, SendPreview, SendReport, MIN_SESSION_SECS,
};
pub use source::{ClaudeSessionReader, SessionSelector, SessionSource};
pub use sync_state::SyncState;
pub use transport::{HttpTransport, Transport};

// Tests that set process-wide env vars must not interleave.
#[cfg(test)]
pub(crate) fn env_lock() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
    LOCK.lock().unwrap_or_else(|e| e.into_inner())
}
