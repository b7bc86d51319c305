use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

// ── Messages ──

/// Speaker role in a transcript message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// Immutable input unit: one transcript message before sanitization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp_unix: i64,
}

/// Per-type redaction counts for one sanitized message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedactedItems {
    pub code_blocks: u32,
    pub credentials: u32,
    pub paths: u32,
    pub urls: u32,
    pub emails: u32,
    pub env_vars: u32,
}

impl RedactedItems {
    pub fn total(&self) -> u32 {
        self.code_blocks + self.credentials + self.paths + self.urls + self.emails + self.env_vars
    }

    /// Stable (category-name, count) pairs, keyed the way the wire format spells them.
    pub fn as_pairs(&self) -> [(&'static str, u32); 6] {
        [
            ("codeBlocks", self.code_blocks),
            ("credentials", self.credentials),
            ("paths", self.paths),
            ("urls", self.urls),
            ("emails", self.emails),
            ("envVars", self.env_vars),
        ]
    }

    pub fn add(&mut self, other: &RedactedItems) {
        self.code_blocks += other.code_blocks;
        self.credentials += other.credentials;
        self.paths += other.paths;
        self.urls += other.urls;
        self.emails += other.emails;
        self.env_vars += other.env_vars;
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SanitizedMetadata {
    pub has_code: bool,
    pub redacted_items: RedactedItems,
}

/// One message after the redaction pass: content holds placeholders only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SanitizedMessage {
    pub role: Role,
    pub content: String,
    pub metadata: SanitizedMetadata,
}

// ── Session summary ──

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedactionSummary {
    pub total_redactions: u32,
    pub by_type: BTreeMap<String, u32>,
}

/// Audit-friendly aggregate over one session's sanitized messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub redaction_summary: RedactionSummary,
    pub context_preserved: bool,
    pub conversation_flow: String,
}

// ── Sessions ──

/// One recorded coding session, as produced by the session source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub project_path: PathBuf,
    pub timestamp_unix: i64,
    pub messages: Vec<Message>,
    pub duration_secs: u64,
    pub source_file: PathBuf,
}

/// Wire payload for one sanitized session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPayload {
    pub session_id: String,
    pub project_path: String,
    /// Serialized sanitized messages (JSON array).
    pub message_summary: String,
    pub message_count: usize,
    pub duration_secs: u64,
    pub timestamp_unix: i64,
    pub redaction_summary: RedactionSummary,
    /// What initiated the run: "hook" or "cli".
    pub origin: String,
}

/// Remote service response for a batch upload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadOutcome {
    pub created: u64,
    pub duplicates: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points_earned: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streak: Option<u64>,
}

// ── Send options ──

/// Configuration for one send invocation, passed by value through the
/// orchestration chain. Callees never mutate it except to set the derived
/// `origin` default once.
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    pub silent: bool,
    pub dry: bool,
    pub background: bool,
    pub hook_trigger: Option<String>,
    pub hook_version: Option<String>,
    pub all: bool,
    pub selected_sessions: Vec<String>,
    pub claude_project_dir: Option<PathBuf>,
    pub origin: Option<String>,
}

impl SendOptions {
    /// Set the derived `origin` once: "hook" for hook-triggered runs,
    /// "cli" otherwise. No-op when already set.
    pub fn ensure_origin(&mut self) {
        if self.origin.is_none() {
            self.origin = Some(if self.hook_trigger.is_some() {
                "hook".to_string()
            } else {
                "cli".to_string()
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacted_items_total_matches_pairs() {
        let items = RedactedItems {
            code_blocks: 1,
            credentials: 2,
            paths: 3,
            urls: 4,
            emails: 5,
            env_vars: 6,
        };
        let pair_sum: u32 = items.as_pairs().iter().map(|(_, n)| n).sum();
        assert_eq!(items.total(), pair_sum);
        assert_eq!(items.total(), 21);
    }

    #[test]
    fn redacted_items_add_accumulates() {
        let mut acc = RedactedItems::default();
        let one = RedactedItems {
            credentials: 2,
            urls: 1,
            ..Default::default()
        };
        acc.add(&one);
        acc.add(&one);
        assert_eq!(acc.credentials, 4);
        assert_eq!(acc.urls, 2);
        assert_eq!(acc.code_blocks, 0);
    }

    #[test]
    fn ensure_origin_sets_once() {
        let mut opts = SendOptions {
            hook_trigger: Some("sessionend".into()),
            ..Default::default()
        };
        opts.ensure_origin();
        assert_eq!(opts.origin.as_deref(), Some("hook"));

        opts.hook_trigger = None;
        opts.ensure_origin();
        // Already set — must not change
        assert_eq!(opts.origin.as_deref(), Some("hook"));

        let mut cli_opts = SendOptions::default();
        cli_opts.ensure_origin();
        assert_eq!(cli_opts.origin.as_deref(), Some("cli"));
    }

    #[test]
    fn roles_serialize_lowercase() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::to_string(&Role::Assistant).unwrap(),
            "\"assistant\""
        );
    }
}
