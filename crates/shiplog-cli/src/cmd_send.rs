use std::io::{self, BufRead, Write};

use shiplog_core::SendOptions;
use shiplog_send::{
    dispatch_background, run_hook_send_guarded, send_sessions, ClaudeSessionReader, Confirmation,
    Dispatch, HttpTransport, SendContext, SendError, SendPreview, HOOK_TIMEOUT,
};
use tracing::{debug, warn};

pub fn execute(mut opts: SendOptions, test: bool) -> anyhow::Result<()> {
    if test {
        println!("{}", shiplog_send::hook::HOOK_TEST_SIGNAL);
        return Ok(());
    }

    let state_dir = shiplog_core::state_root();
    std::fs::create_dir_all(&state_dir)?;
    opts.ensure_origin();

    match dispatch_background(&state_dir, &opts, env!("CARGO_PKG_VERSION")) {
        Dispatch::RunInline => {}
        Dispatch::SkippedUploadRunning => {
            debug!("another upload in flight, nothing to do");
            return Ok(());
        }
        Dispatch::SpawnedLatest { version } => {
            debug!(%version, "dispatched upload to latest release");
            return Ok(());
        }
        Dispatch::SpawnedCurrent => {
            debug!("dispatched upload to detached process");
            return Ok(());
        }
        // Spawn failure falls back to an inline upload
        Dispatch::SpawnFailed => {}
    }

    if opts.hook_trigger.is_some() {
        // The guarded runner holds the upload guard on this thread, so a
        // timed-out worker never leaves the guard file behind.
        let dir = state_dir.clone();
        let hook_opts = opts.clone();
        let outcome = run_hook_send_guarded(
            &state_dir,
            env!("CARGO_PKG_VERSION"),
            move || {
                let source = ClaudeSessionReader::new();
                let transport = HttpTransport::from_env();
                let ctx = SendContext {
                    source: &source,
                    transport: &transport,
                    state_dir: &dir,
                };
                send_sessions(&ctx, hook_opts, None, None)
            },
            HOOK_TIMEOUT,
        );
        debug!(?outcome, "hook send finished");
        return Ok(());
    }

    // Duplicate-upload guard for the inline path. Dry runs touch nothing
    // remote and skip it.
    let guard = if opts.dry {
        None
    } else {
        match shiplog_lock::try_acquire(
            &shiplog_lock::upload_guard_path(&state_dir),
            env!("CARGO_PKG_VERSION"),
        ) {
            Some(g) => Some(g),
            None => {
                if !opts.silent {
                    println!("Another upload is already running; try again in a moment.");
                }
                return Ok(());
            }
        }
    };

    let source = ClaudeSessionReader::new();
    let transport = HttpTransport::from_env();
    let ctx = SendContext {
        source: &source,
        transport: &transport,
        state_dir: &state_dir,
    };

    if opts.silent {
        let _guard = guard;
        if let Err(err) = send_sessions(&ctx, opts, None, None) {
            warn!(%err, "silent send failed");
        }
        return Ok(());
    }

    let _guard = guard;
    let mut confirm = |preview: &SendPreview| prompt_confirmation(preview);
    let mut progress = |done: usize, total: usize, size_kb: Option<f64>| {
        match size_kb {
            Some(kb) => println!("Uploading {done}/{total} ({kb:.1} KB)"),
            None => println!("Uploading {done}/{total}"),
        }
    };

    match send_sessions(&ctx, opts, Some(&mut confirm), Some(&mut progress)) {
        Ok(report) => {
            if report.dry_run {
                println!(
                    "Dry run: {} redaction(s) would be applied; nothing was uploaded.",
                    report.total_redactions
                );
            } else {
                println!(
                    "Sent {} session(s), {} redaction(s) applied.",
                    report.uploaded, report.total_redactions
                );
                if report.failed > 0 {
                    println!("{} session(s) failed to upload; they will be retried next run.", report.failed);
                }
                if let Some(points) = report.outcome.points_earned {
                    println!("Points earned: {points}");
                }
                if let Some(streak) = report.outcome.streak {
                    println!("Streak: {streak} day(s)");
                }
            }
            Ok(())
        }
        Err(SendError::NoSessions { onboarding }) => {
            if onboarding {
                println!("No sessions to send yet. Finish a coding session (4+ minutes) and run `shiplog send` again.");
            } else {
                println!("Nothing new to send.");
            }
            Ok(())
        }
        Err(SendError::Cancelled) => {
            println!("Cancelled; nothing was uploaded.");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

/// Interactive confirm step: summary first, full redaction detail on demand.
fn prompt_confirmation(preview: &SendPreview) -> Confirmation {
    println!(
        "{} session(s) ready to send ({} skipped as too short), {} redaction(s) applied.",
        preview.session_count, preview.skipped_short, preview.total_redactions
    );
    print!("Send now? [y]es / [d]etails / [N]o: ");
    let _ = io::stdout().flush();

    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return Confirmation::Cancel;
    }
    match answer.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Confirmation::Proceed,
        "d" | "details" => {
            print_detail(preview);
            Confirmation::ShowDetail
        }
        _ => Confirmation::Cancel,
    }
}

fn print_detail(preview: &SendPreview) {
    for (i, summary) in preview.summaries.iter().enumerate() {
        println!("Session {}:", i + 1);
        let by_type = &summary.redaction_summary.by_type;
        if summary.redaction_summary.total_redactions == 0 {
            println!("  no redactions");
        } else {
            for (kind, count) in by_type {
                if *count > 0 {
                    println!("  {kind}: {count}");
                }
            }
        }
    }
}
