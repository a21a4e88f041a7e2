//! Mail collaborators: retrieval, parsing and archiving.
//!
//! The pipeline only sees the three ports defined here. The mailbox
//! implementations work on a directory of `.eml` files; the memory archiver
//! records calls for tests and dry runs.

pub mod mailbox;
pub mod memory;
pub mod parser;

pub use mailbox::{MailboxArchiver, MailboxRetriever};
pub use memory::MemoryArchiver;
pub use parser::MimeThreadParser;

use async_trait::async_trait;

use crate::error::{ArchiveError, TriageError};
use crate::pipeline::types::EmailRecord;

/// One raw message as stored in the mailbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    /// Mailbox identifier (file stem), used for archiving.
    pub source_id: String,
    /// RFC 5322 bytes.
    pub bytes: Vec<u8>,
    /// Human-edited reply stored next to the message, if any.
    pub edited: Option<String>,
}

/// Messages belonging to one conversation, in no particular order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawThread {
    pub thread_id: String,
    pub messages: Vec<RawMessage>,
}

/// Fetches up to `n` raw threads, newest first.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, n: usize) -> Result<Vec<RawThread>, TriageError>;
}

/// Turns raw threads into email records.
pub trait ThreadParser: Send + Sync {
    fn parse(&self, threads: Vec<RawThread>) -> Result<Vec<EmailRecord>, TriageError>;
}

/// Moves a processed message out of the active inbox.
#[async_trait]
pub trait Archiver: Send + Sync {
    /// Archive one message. Archiving an already archived id succeeds.
    async fn archive(&self, message_id: &str) -> Result<(), ArchiveError>;
}
