mod cmd_send;
mod cmd_status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "shiplog", version, about = "Share redacted Claude Code session summaries")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sanitize and upload recent sessions
    Send {
        /// No prompts, no output; never fails the caller
        #[arg(long)]
        silent: bool,
        /// Dispatch the upload to a detached process and return immediately
        #[arg(long)]
        background: bool,
        /// Preview only: sanitize and summarize, upload nothing
        #[arg(long)]
        dry: bool,
        /// Consider sessions from every project, not just the current one
        #[arg(long)]
        all: bool,
        /// Editor lifecycle event that triggered this run (hook mode)
        #[arg(long)]
        hook_trigger: Option<String>,
        /// Version string forwarded by a re-dispatched hook run
        #[arg(long)]
        hook_version: Option<String>,
        /// Project root the triggering session belongs to
        #[arg(long)]
        claude_project_dir: Option<PathBuf>,
        /// Send only these session IDs (repeatable)
        #[arg(long = "session")]
        sessions: Vec<String>,
        /// Verify hook wiring: print a fixed signal and exit
        #[arg(long)]
        test: bool,
    },
    /// Show sync watermark, pending sessions, and lock state
    Status,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("shiplog=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.cmd {
        Command::Send {
            silent,
            background,
            dry,
            all,
            hook_trigger,
            hook_version,
            claude_project_dir,
            sessions,
            test,
        } => {
            let opts = shiplog_core::SendOptions {
                silent,
                dry,
                background,
                hook_trigger,
                hook_version,
                all,
                selected_sessions: sessions,
                claude_project_dir,
                origin: None,
            };
            cmd_send::execute(opts, test)
        }
        Command::Status => cmd_status::execute(),
    }
}
