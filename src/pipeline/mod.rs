//! Triage pipeline.
//!
//! Every eligible email flows through:
//! 1. Summarizer: no checkpoint
//! 2. Needs-response gate: reviewer confirms; archive or continue
//! 3. Category gate: reviewer confirms; decline or check for a meeting
//! 4. Meeting gate: reviewer confirms; schedule or general reply
//! 5. Edit-diff: when a human edit of the reply exists
//!
//! **No side effect fires on a raw model label.** Each label is paired with
//! a reviewer verdict first.

pub mod batch;
pub mod decision;
pub mod editor;
pub mod triage;
pub mod types;

pub use batch::BatchDriver;
pub use editor::EditDiff;
pub use triage::DecisionPipeline;
pub use types::{BatchOutcome, BatchReport, EmailContent, EmailOutcome, EmailRecord};
