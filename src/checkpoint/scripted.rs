//! Scripted reviewer: replays prepared answers without any I/O.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::checkpoint::{CheckpointRequest, Reviewer, Verdict};
use crate::error::CheckpointError;

#[derive(Default)]
struct Script {
    verdicts: VecDeque<Verdict>,
    revisions: VecDeque<Option<String>>,
    asked: Vec<String>,
}

/// Reviewer that answers from a prepared script.
///
/// Verdicts and revisions are consumed in order from separate queues.
/// Running out of answers yields `CheckpointError::Closed`.
#[derive(Default)]
pub struct ScriptedReviewer {
    script: Mutex<Script>,
}

impl ScriptedReviewer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn verdict(self, verdict: Verdict) -> Self {
        self.with_script(|s| s.verdicts.push_back(verdict))
    }

    pub fn agree(self) -> Self {
        self.verdict(Verdict::agree())
    }

    pub fn disagree(self) -> Self {
        self.verdict(Verdict::disagree())
    }

    /// Queue a revision answer; `None` keeps the draft.
    pub fn revision(self, text: Option<&str>) -> Self {
        let text = text.map(str::to_string);
        self.with_script(|s| s.revisions.push_back(text))
    }

    /// Prompts presented so far, in order.
    pub fn asked(&self) -> Vec<String> {
        self.lock().asked.clone()
    }

    /// Answers never consumed.
    pub fn remaining(&self) -> usize {
        let script = self.lock();
        script.verdicts.len() + script.revisions.len()
    }

    fn with_script(self, f: impl FnOnce(&mut Script)) -> Self {
        f(&mut self.lock());
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        // A poisoned script only means another test thread panicked.
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Reviewer for ScriptedReviewer {
    async fn confirm(&self, request: &CheckpointRequest<'_>) -> Result<Verdict, CheckpointError> {
        let mut script = self.lock();
        script.asked.push(request.prompt.to_string());
        script.verdicts.pop_front().ok_or(CheckpointError::Closed)
    }

    async fn revise(&self, _draft: &str) -> Result<Option<String>, CheckpointError> {
        let mut script = self.lock();
        script.asked.push("revise".to_string());
        script.revisions.pop_front().ok_or(CheckpointError::Closed)
    }
}
