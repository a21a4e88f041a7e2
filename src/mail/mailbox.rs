//! Mailbox directory: `.eml` files in, `archived/` out.
//!
//! Layout:
//! ```text
//! mailbox/
//!   <id>.eml             one message per file
//!   <id>.edited.txt      optional human-edited reply to <id>
//!   archived/            archived messages (and their sidecars)
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use mail_parser::{HeaderValue, MessageParser};
use tracing::{debug, info, warn};

use crate::error::{ArchiveError, TriageError};
use crate::mail::{Archiver, RawMessage, RawThread, Retriever};

const EML_EXT: &str = "eml";
const EDITED_SUFFIX: &str = ".edited.txt";
const ARCHIVE_DIR: &str = "archived";

fn edited_path(dir: &Path, id: &str) -> PathBuf {
    dir.join(format!("{id}{EDITED_SUFFIX}"))
}

fn eml_path(dir: &Path, id: &str) -> PathBuf {
    dir.join(format!("{id}.{EML_EXT}"))
}

// ── Retrieval ───────────────────────────────────────────────────────

/// Reads threads from the top level of a mailbox directory.
pub struct MailboxRetriever {
    dir: PathBuf,
}

/// A message plus the headers used to group it.
struct Candidate {
    message: RawMessage,
    root: String,
    timestamp: Option<i64>,
}

impl MailboxRetriever {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    async fn load(&self, path: &Path, id: String) -> Result<Candidate, TriageError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| TriageError::Retrieval(format!("failed to read {}: {e}", path.display())))?;

        let edited = match tokio::fs::read_to_string(edited_path(&self.dir, &id)).await {
            Ok(text) => Some(text.trim().to_string()).filter(|t| !t.is_empty()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                return Err(TriageError::Retrieval(format!(
                    "failed to read edited reply for {id}: {e}"
                )));
            }
        };

        // Unparseable messages become their own thread; the parser reports them.
        let (root, timestamp) = match MessageParser::default().parse(bytes.as_slice()) {
            Some(message) => {
                let root = header_ids(message.references())
                    .into_iter()
                    .next()
                    .or_else(|| header_ids(message.in_reply_to()).into_iter().next())
                    .or_else(|| message.message_id().map(str::to_string))
                    .unwrap_or_else(|| id.clone());
                (root, message.date().map(|d| d.to_timestamp()))
            }
            None => (id.clone(), None),
        };

        Ok(Candidate {
            message: RawMessage {
                source_id: id,
                bytes,
                edited,
            },
            root,
            timestamp,
        })
    }
}

fn header_ids(value: &HeaderValue<'_>) -> Vec<String> {
    match value {
        HeaderValue::Text(id) => vec![id.to_string()],
        HeaderValue::TextList(ids) => ids.iter().map(|id| id.to_string()).collect(),
        _ => Vec::new(),
    }
}

#[async_trait]
impl Retriever for MailboxRetriever {
    async fn retrieve(&self, n: usize) -> Result<Vec<RawThread>, TriageError> {
        let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(|e| {
            TriageError::Retrieval(format!("mailbox {} unreadable: {e}", self.dir.display()))
        })?;

        let mut candidates = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| TriageError::Retrieval(format!("mailbox listing failed: {e}")))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EML_EXT) || !path.is_file() {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                warn!(path = %path.display(), "Skipping file with non-UTF-8 name");
                continue;
            };
            candidates.push(self.load(&path, id).await?);
        }

        let mut threads: HashMap<String, (Option<i64>, Vec<RawMessage>)> = HashMap::new();
        for candidate in candidates {
            let (latest, messages) = threads.entry(candidate.root).or_default();
            *latest = (*latest).max(candidate.timestamp);
            messages.push(candidate.message);
        }

        let mut threads: Vec<_> = threads
            .into_iter()
            .map(|(thread_id, (latest, mut messages))| {
                messages.sort_by(|a, b| a.source_id.cmp(&b.source_id));
                (latest, RawThread { thread_id, messages })
            })
            .collect();
        threads.sort_by(|(a_latest, a), (b_latest, b)| {
            b_latest.cmp(a_latest).then_with(|| a.thread_id.cmp(&b.thread_id))
        });

        let threads: Vec<RawThread> = threads.into_iter().take(n).map(|(_, t)| t).collect();
        debug!(threads = threads.len(), dir = %self.dir.display(), "Mailbox scanned");
        Ok(threads)
    }
}

// ── Archiving ───────────────────────────────────────────────────────

/// Moves archived messages into `archived/` inside the mailbox.
pub struct MailboxArchiver {
    dir: PathBuf,
}

impl MailboxArchiver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn archive_dir(&self) -> PathBuf {
        self.dir.join(ARCHIVE_DIR)
    }
}

fn io_failure(message_id: &str, e: std::io::Error) -> ArchiveError {
    ArchiveError::Failed {
        message_id: message_id.to_string(),
        reason: e.to_string(),
    }
}

#[async_trait]
impl Archiver for MailboxArchiver {
    async fn archive(&self, message_id: &str) -> Result<(), ArchiveError> {
        if message_id.is_empty()
            || message_id.contains(['/', '\\'])
            || message_id.starts_with('.')
        {
            return Err(ArchiveError::Failed {
                message_id: message_id.to_string(),
                reason: "not a mailbox identifier".to_string(),
            });
        }

        let source = eml_path(&self.dir, message_id);
        let archive_dir = self.archive_dir();
        let target = eml_path(&archive_dir, message_id);

        let source_exists = tokio::fs::try_exists(&source)
            .await
            .map_err(|e| io_failure(message_id, e))?;
        if !source_exists {
            let already = tokio::fs::try_exists(&target)
                .await
                .map_err(|e| io_failure(message_id, e))?;
            if already {
                debug!(message_id, "Already archived");
                return Ok(());
            }
            return Err(ArchiveError::NotFound {
                message_id: message_id.to_string(),
            });
        }

        tokio::fs::create_dir_all(&archive_dir)
            .await
            .map_err(|e| io_failure(message_id, e))?;
        tokio::fs::rename(&source, &target)
            .await
            .map_err(|e| io_failure(message_id, e))?;

        let sidecar = edited_path(&self.dir, message_id);
        if tokio::fs::try_exists(&sidecar).await.unwrap_or(false) {
            tokio::fs::rename(&sidecar, edited_path(&archive_dir, message_id))
                .await
                .map_err(|e| io_failure(message_id, e))?;
        }

        info!(message_id, "Moved to archive");
        Ok(())
    }
}
