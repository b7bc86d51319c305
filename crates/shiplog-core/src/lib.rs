mod store;
mod types;

pub use store::{now_unix, state_root, write_atomic};
pub use types::{
    Message, RedactedItems, RedactionSummary, Role, SanitizedMessage, SanitizedMetadata,
    SendOptions, Session, SessionPayload, SessionSummary, UploadOutcome,
};
