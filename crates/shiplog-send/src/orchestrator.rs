use std::path::Path;

use shiplog_core::{SendOptions, SessionPayload, SessionSummary, UploadOutcome};
use tracing::{debug, warn};

use crate::error::SendError;
use crate::source::{SessionSelector, SessionSource};
use crate::sync_state::{project_key, SyncState};
use crate::transport::Transport;

/// Sessions shorter than this carry low signal and inflate upload volume.
pub const MIN_SESSION_SECS: u64 = 240;

/// Interactive caller's answer at the confirm step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Proceed,
    /// Caller wants to render redaction detail first; the orchestrator asks
    /// again afterwards.
    ShowDetail,
    Cancel,
}

/// What the caller may display before anything leaves the machine.
#[derive(Debug)]
pub struct SendPreview {
    pub session_count: usize,
    pub skipped_short: usize,
    pub total_redactions: u32,
    pub summaries: Vec<SessionSummary>,
}

/// Result of one completed (or dry) send attempt.
#[derive(Debug, Default)]
pub struct SendReport {
    pub uploaded: usize,
    pub skipped_short: usize,
    pub failed: usize,
    pub total_redactions: u32,
    pub outcome: UploadOutcome,
    pub dry_run: bool,
}

/// External collaborators of the send pipeline.
pub struct SendContext<'a> {
    pub source: &'a dyn SessionSource,
    pub transport: &'a dyn Transport,
    pub state_dir: &'a Path,
}

pub type ConfirmFn<'a> = dyn FnMut(&SendPreview) -> Confirmation + 'a;
pub type ProgressFn<'a> = dyn FnMut(usize, usize, Option<f64>) + 'a;

/// One send attempt: LOAD → FILTER → SANITIZE → PREVIEW → CONFIRM? →
/// UPLOAD → PERSIST.
///
/// Confirmation is skipped (auto-proceed) in silent/background/hook modes.
/// Cancellation at the confirm step commits no side effects. Per-session
/// failures are counted, never aborting; the whole attempt fails only when
/// every payload failed to upload.
pub fn send_sessions(
    ctx: &SendContext,
    mut opts: SendOptions,
    mut confirm: Option<&mut ConfirmFn>,
    mut progress: Option<&mut ProgressFn>,
) -> Result<SendReport, SendError> {
    opts.ensure_origin();
    let origin = opts.origin.clone().unwrap_or_else(|| "cli".to_string());

    // LOAD
    let mut state = SyncState::load(ctx.state_dir);
    let selector = if !opts.selected_sessions.is_empty() {
        SessionSelector::Explicit(opts.selected_sessions.clone())
    } else if opts.all {
        SessionSelector::All
    } else if let Some(dir) = &opts.claude_project_dir {
        SessionSelector::CurrentProject(dir.clone())
    } else {
        SessionSelector::All
    };
    let scoped_key = opts
        .claude_project_dir
        .as_ref()
        .map(|d| project_key(&d.to_string_lossy()));
    let since = state.watermark_for(scoped_key.as_deref());
    let sessions = ctx.source.load(&selector, since)?;

    // FILTER
    let total_loaded = sessions.len();
    let kept: Vec<_> = sessions
        .into_iter()
        .filter(|s| s.duration_secs >= MIN_SESSION_SECS)
        .collect();
    let skipped_short = total_loaded - kept.len();
    debug!(loaded = total_loaded, kept = kept.len(), skipped_short, "session filter");
    if kept.is_empty() {
        return Err(SendError::NoSessions {
            onboarding: state.is_onboarding(),
        });
    }

    // SANITIZE + PREVIEW
    let mut payloads: Vec<SessionPayload> = Vec::with_capacity(kept.len());
    let mut summaries: Vec<SessionSummary> = Vec::with_capacity(kept.len());
    let mut failed = 0usize;
    for session in &kept {
        let sanitized = shiplog_redact::sanitize(&session.messages);
        let summary = shiplog_redact::summarize(&sanitized);
        let message_summary = match serde_json::to_string(&sanitized) {
            Ok(s) => s,
            Err(err) => {
                warn!(session = %session.id, %err, "failed to serialize sanitized session");
                failed += 1;
                continue;
            }
        };
        payloads.push(SessionPayload {
            session_id: session.id.clone(),
            project_path: session.project_path.to_string_lossy().to_string(),
            message_summary,
            message_count: sanitized.len(),
            duration_secs: session.duration_secs,
            timestamp_unix: session.timestamp_unix,
            redaction_summary: summary.redaction_summary.clone(),
            origin: origin.clone(),
        });
        summaries.push(summary);
    }
    let total_redactions: u32 = summaries
        .iter()
        .map(|s| s.redaction_summary.total_redactions)
        .sum();
    let preview = SendPreview {
        session_count: payloads.len(),
        skipped_short,
        total_redactions,
        summaries,
    };

    // CONFIRM — auto-proceed in silent/background/hook modes
    let auto_proceed = opts.silent || opts.background || opts.hook_trigger.is_some();
    if !auto_proceed {
        if let Some(confirm) = confirm.as_mut() {
            loop {
                match confirm(&preview) {
                    Confirmation::Proceed => break,
                    Confirmation::ShowDetail => continue,
                    Confirmation::Cancel => return Err(SendError::Cancelled),
                }
            }
        }
    }

    if opts.dry {
        return Ok(SendReport {
            uploaded: 0,
            skipped_short,
            failed,
            total_redactions,
            outcome: UploadOutcome::default(),
            dry_run: true,
        });
    }

    // UPLOAD
    let total = payloads.len();
    let mut outcome = UploadOutcome::default();
    let mut uploaded = 0usize;
    let mut last_err: Option<SendError> = None;
    for (i, payload) in payloads.iter().enumerate() {
        let size_kb = payload.message_summary.len() as f64 / 1024.0;
        match ctx.transport.upload_session(payload) {
            Ok(one) => {
                uploaded += 1;
                // PERSIST covers successes only: a failed session keeps a
                // timestamp past the watermark and is re-offered next run
                let key = scoped_key
                    .clone()
                    .unwrap_or_else(|| project_key(&payload.project_path));
                state.record(&key, payload.timestamp_unix);
                outcome.created += one.created;
                outcome.duplicates += one.duplicates;
                if one.points_earned.is_some() {
                    outcome.points_earned = one.points_earned;
                }
                if one.streak.is_some() {
                    outcome.streak = one.streak;
                }
            }
            Err(err) => {
                warn!(session = %payload.session_id, %err, "session upload failed");
                failed += 1;
                last_err = Some(err);
            }
        }
        if let Some(progress) = progress.as_mut() {
            progress(i + 1, total, Some(size_kb));
        }
    }
    if uploaded == 0 {
        if let Some(err) = last_err {
            return Err(err);
        }
    }

    if uploaded > 0 {
        if let Err(err) = state.save(ctx.state_dir) {
            warn!(%err, "failed to persist sync watermark");
        }
    }

    Ok(SendReport {
        uploaded,
        skipped_short,
        failed,
        total_redactions,
        outcome,
        dry_run: false,
    })
}
