use std::collections::BTreeMap;

use shiplog_core::{RedactedItems, RedactionSummary, SanitizedMessage, SessionSummary};

/// Aggregate sanitized messages into one audit-friendly summary.
///
/// Purely additive over per-message `redacted_items`; `conversation_flow` is
/// one line per input message in original order (inner newlines flattened so
/// line count stays equal to message count). `context_preserved` is an
/// explicit audit flag, always true for output of the non-failing engine.
pub fn summarize(sanitized: &[SanitizedMessage]) -> SessionSummary {
    let mut totals = RedactedItems::default();
    for message in sanitized {
        totals.add(&message.metadata.redacted_items);
    }

    let by_type: BTreeMap<String, u32> = totals
        .as_pairs()
        .iter()
        .map(|(k, v)| (k.to_string(), *v))
        .collect();

    let conversation_flow = sanitized
        .iter()
        .map(|m| m.content.replace('\n', " "))
        .collect::<Vec<_>>()
        .join("\n");

    SessionSummary {
        redaction_summary: RedactionSummary {
            total_redactions: totals.total(),
            by_type,
        },
        context_preserved: true,
        conversation_flow,
    }
}
