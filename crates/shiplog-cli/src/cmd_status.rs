use std::path::Path;

use shiplog_send::{
    ClaudeSessionReader, SessionSelector, SessionSource, SyncState, MIN_SESSION_SECS,
};

pub fn execute() -> anyhow::Result<()> {
    let state_dir = shiplog_core::state_root();
    let state = SyncState::load(&state_dir);
    let now = shiplog_core::now_unix();

    println!("shiplog {}", env!("CARGO_PKG_VERSION"));

    match state.watermark_for(None) {
        Some(ts) => println!("Last sync: {} ago", format_age(now - ts)),
        None => println!("Last sync: never"),
    }

    let reader = ClaudeSessionReader::new();
    let sessions = reader.load(&SessionSelector::All, state.watermark_for(None))?;
    let pending = sessions
        .iter()
        .filter(|s| s.duration_secs >= MIN_SESSION_SECS)
        .count();
    let short = sessions.len() - pending;
    println!("Pending sessions: {pending} ({short} too short to send)");

    print_lock("Update lock", &shiplog_lock::update_lock_path(&state_dir), now);
    print_lock("Upload guard", &shiplog_lock::upload_guard_path(&state_dir), now);
    Ok(())
}

fn print_lock(label: &str, path: &Path, now: i64) {
    match shiplog_lock::read_info(path) {
        Some(info) => {
            let age = now - info.timestamp;
            let state = if age > shiplog_lock::STALE_AFTER_SECS {
                "stale"
            } else {
                "held"
            };
            println!(
                "{label}: {state} (pid {}, v{}, {} ago)",
                info.pid,
                info.version,
                format_age(age)
            );
        }
        None => println!("{label}: free"),
    }
}

fn format_age(secs: i64) -> String {
    let secs = secs.max(0);
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else if secs < 86_400 {
        format!("{}h", secs / 3600)
    } else {
        format!("{}d", secs / 86_400)
    }
}
