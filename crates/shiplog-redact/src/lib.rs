mod engine;
mod stages;
mod summary;

pub use engine::{sanitize, RedactionPass};
pub use summary::summarize;
