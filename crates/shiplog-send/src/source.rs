use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use shiplog_core::{Message, Role, Session};
use tracing::warn;

/// Which sessions a send run should consider.
#[derive(Debug, Clone)]
pub enum SessionSelector {
    /// Sessions recorded for one project root.
    CurrentProject(PathBuf),
    /// Every project under the transcript store.
    All,
    /// Explicitly named session IDs.
    Explicit(Vec<String>),
}

/// Supplier of candidate session records. The orchestrator only needs this
/// shape; discovery and parsing are collaborator concerns.
pub trait SessionSource {
    fn load(
        &self,
        selector: &SessionSelector,
        since_unix: Option<i64>,
    ) -> anyhow::Result<Vec<Session>>;
}

/// Reads Claude Code transcript JSONL files from the per-user projects
/// directory (`~/.claude/projects/<encoded-path>/<session>.jsonl`).
///
/// Unparsable lines are skipped; unparsable files are skipped and logged.
/// A malformed transcript never aborts the batch.
pub struct ClaudeSessionReader {
    projects_dir: PathBuf,
}

impl ClaudeSessionReader {
    pub fn new() -> Self {
        Self {
            projects_dir: default_projects_dir(),
        }
    }

    pub fn with_dir(projects_dir: PathBuf) -> Self {
        Self { projects_dir }
    }
}

impl Default for ClaudeSessionReader {
    fn default() -> Self {
        Self::new()
    }
}

fn default_projects_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".claude")
        .join("projects")
}

/// Claude Code encodes a project path as a directory name by replacing
/// path separators with dashes.
pub fn encode_project_dir(project_path: &Path) -> String {
    project_path
        .to_string_lossy()
        .replace(['/', '\\'], "-")
}

impl SessionSource for ClaudeSessionReader {
    fn load(
        &self,
        selector: &SessionSelector,
        since_unix: Option<i64>,
    ) -> anyhow::Result<Vec<Session>> {
        let mut sessions = Vec::new();
        if !self.projects_dir.is_dir() {
            return Ok(sessions);
        }

        for entry in std::fs::read_dir(&self.projects_dir)?.flatten() {
            let project_dir = entry.path();
            if !project_dir.is_dir() {
                continue;
            }
            if let SessionSelector::CurrentProject(root) = selector {
                let encoded = encode_project_dir(root);
                if entry.file_name().to_string_lossy() != encoded {
                    continue;
                }
            }

            for file in std::fs::read_dir(&project_dir)?.flatten() {
                let path = file.path();
                if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
                    continue;
                }
                match parse_session_file(&path) {
                    Some(session) => {
                        if let SessionSelector::Explicit(ids) = selector {
                            if !ids.contains(&session.id) {
                                continue;
                            }
                        }
                        if let Some(since) = since_unix {
                            if session.timestamp_unix <= since {
                                continue;
                            }
                        }
                        sessions.push(session);
                    }
                    None => {
                        warn!(file = %path.display(), "skipping unparsable transcript");
                    }
                }
            }
        }

        sessions.sort_by_key(|s| s.timestamp_unix);
        Ok(sessions)
    }
}

/// Parse one transcript JSONL file into a session record.
/// Returns `None` when the file is unreadable or yields no messages.
fn parse_session_file(path: &Path) -> Option<Session> {
    let file = std::fs::File::open(path).ok()?;
    let reader = BufReader::new(file);

    let mut messages: Vec<Message> = Vec::new();
    let mut project_path: Option<PathBuf> = None;

    for line in reader.lines() {
        let line = line.ok()?;
        if line.is_empty() {
            continue;
        }
        let parsed: serde_json::Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(_) => continue,
        };
        if project_path.is_none() {
            if let Some(cwd) = parsed.get("cwd").and_then(|v| v.as_str()) {
                project_path = Some(PathBuf::from(cwd));
            }
        }
        if let Some(message) = message_from_record(&parsed) {
            messages.push(message);
        }
    }

    if messages.is_empty() {
        return None;
    }

    let first_ts = messages.first().map(|m| m.timestamp_unix).unwrap_or(0);
    let last_ts = messages.last().map(|m| m.timestamp_unix).unwrap_or(first_ts);
    let id = path.file_stem()?.to_string_lossy().to_string();

    Some(Session {
        id,
        project_path: project_path.unwrap_or_else(|| PathBuf::from(".")),
        timestamp_unix: first_ts,
        duration_secs: last_ts.saturating_sub(first_ts).max(0) as u64,
        messages,
        source_file: path.to_path_buf(),
    })
}

/// Extract one message from a transcript record.
///
/// Expected shapes per line:
/// `{"type":"user","message":{"content":"..."},"timestamp":"..."}` or
/// `{"type":"assistant","message":{"content":[{"type":"text","text":"..."},...]}}`.
/// Only `text` content blocks are kept; `tool_use`/`tool_result` blocks are
/// not conversation text.
fn message_from_record(parsed: &serde_json::Value) -> Option<Message> {
    let role = match parsed.get("type").and_then(|v| v.as_str())? {
        "user" => Role::User,
        "assistant" => Role::Assistant,
        "system" => Role::System,
        _ => return None,
    };

    let content_val = parsed.get("message").and_then(|m| m.get("content"))?;
    let content = match content_val {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(blocks) => {
            let texts: Vec<&str> = blocks
                .iter()
                .filter(|b| b.get("type").and_then(|t| t.as_str()) == Some("text"))
                .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
                .collect();
            if texts.is_empty() {
                return None;
            }
            texts.join("\n")
        }
        _ => return None,
    };
    if content.is_empty() {
        return None;
    }

    let timestamp_unix = parsed
        .get("timestamp")
        .and_then(|t| t.as_str())
        .and_then(parse_rfc3339)
        .unwrap_or(0);

    Some(Message {
        role,
        content,
        timestamp_unix,
    })
}

fn parse_rfc3339(raw: &str) -> Option<i64> {
    time::OffsetDateTime::parse(raw, &time::format_description::well_known::Rfc3339)
        .ok()
        .map(|dt| dt.unix_timestamp())
}
