//! In-memory archiver.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::ArchiveError;
use crate::mail::Archiver;

/// Archiver that only records which ids it was asked to archive.
///
/// Ids registered with [`MemoryArchiver::fail_on`] return an error instead.
#[derive(Default)]
pub struct MemoryArchiver {
    calls: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
}

impl MemoryArchiver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make archiving `message_id` fail.
    pub fn fail_on(self, message_id: &str) -> Self {
        self.failing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(message_id.to_string());
        self
    }

    /// Ids archived so far, in call order (failed calls included).
    pub fn archived(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl Archiver for MemoryArchiver {
    async fn archive(&self, message_id: &str) -> Result<(), ArchiveError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(message_id.to_string());

        let failing = self.failing.lock().unwrap_or_else(|e| e.into_inner());
        if failing.contains(message_id) {
            return Err(ArchiveError::Failed {
                message_id: message_id.to_string(),
                reason: "archive refused".to_string(),
            });
        }
        Ok(())
    }
}
