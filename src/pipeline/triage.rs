//! Decision pipeline: the per-email state machine.
//!
//! Summarize → needs-response gate → category gate → meeting gate → writer
//! → optional edit-diff. Every gate pairs a classifier label with a
//! reviewer verdict before anything acts on it.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::checkpoint::{CheckpointRequest, Reviewer};
use crate::classify::{
    CategoryOutput, Classifier, EditAnalysis, EmailSummary, MeetingRequestOutput,
    NeedsResponseOutput,
};
use crate::config::ArchivePolicy;
use crate::error::TriageError;
use crate::mail::Archiver;
use crate::pipeline::decision::{
    Category, CategoryRoute, Gate, NeedsResponse, WriterKind, category_gate, meeting_gate,
    needs_response_gate,
};
use crate::pipeline::editor::EditDiff;
use crate::pipeline::types::{
    ArchiveReason, CheckpointKind, DecisionTrail, EmailOutcome, EmailRecord, ResponseOutcome,
};
use crate::prompts::{TemplateInputs, TemplateKey};

const NEEDS_RESPONSE_PROMPT: &str = "Is this decision correct?";
const CATEGORY_PROMPT: &str = "Is this category correct?";
const MEETING_PROMPT: &str = "Is this meeting request decision correct?";
const EDIT_PROMPT: &str = "Would you like to edit this response before sending?";

/// Runs one email through every gate.
pub struct DecisionPipeline {
    classifier: Arc<Classifier>,
    reviewer: Arc<dyn Reviewer>,
    archiver: Arc<dyn Archiver>,
    editor: EditDiff,
    archive_policy: ArchivePolicy,
}

impl DecisionPipeline {
    pub fn new(
        classifier: Arc<Classifier>,
        reviewer: Arc<dyn Reviewer>,
        archiver: Arc<dyn Archiver>,
        archive_policy: ArchivePolicy,
    ) -> Self {
        Self {
            editor: EditDiff::new(Arc::clone(&classifier)),
            classifier,
            reviewer,
            archiver,
            archive_policy,
        }
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Process one email to a terminal outcome.
    ///
    /// Any classifier, reviewer or (strict) archiver failure aborts this
    /// email; nothing is retried.
    pub async fn process(&self, record: &EmailRecord) -> Result<EmailOutcome, TriageError> {
        let mut trail = DecisionTrail::default();
        let email_content = serde_json::to_string(&record.content)
            .map_err(|e| TriageError::Parse(format!("email content is not serializable: {e}")))?;

        // 1. Summarize
        info!(thread_id = %record.thread_id, "Summarizing email");
        let summary: EmailSummary = self
            .classifier
            .classify(
                TemplateKey::Summarizer,
                &TemplateInputs::new().with("email_content", email_content.as_str()),
            )
            .await?;
        let summary_text = serde_json::to_string(&summary)
            .map_err(|e| TriageError::Parse(format!("summary is not serializable: {e}")))?;
        info!(summary = %summary.summary, "Summary complete");

        // 2. Needs-response gate
        let output: NeedsResponseOutput = self
            .classifier
            .classify(
                TemplateKey::NeedsResponse,
                &TemplateInputs::new().with("summary", summary_text.as_str()),
            )
            .await?;
        let decision = NeedsResponse::from_label(&output.needs_response).ok_or_else(|| {
            TriageError::SchemaViolation {
                template: TemplateKey::NeedsResponse.name(),
                reason: format!("unknown label '{}'", output.needs_response),
            }
        })?;
        info!(decision = decision.label(), reason = %output.reason, "Needs-response decision");

        let verdict = self
            .reviewer
            .confirm(
                &CheckpointRequest::new(NEEDS_RESPONSE_PROMPT)
                    .with_decision(decision.label())
                    .with_context(&summary_text),
            )
            .await?;
        let gate = needs_response_gate(decision, verdict.agrees);
        let resolved = match gate {
            Gate::Proceed { .. } => NeedsResponse::Respond,
            Gate::Archive { .. } => NeedsResponse::NoResponseNeeded,
        };
        trail.record(
            CheckpointKind::NeedsResponse,
            decision.label(),
            verdict,
            resolved.label(),
        );

        match gate {
            Gate::Archive { overridden } => {
                let reason = if overridden {
                    info!("Reviewer overrode 'respond', archiving");
                    ArchiveReason::ReviewerOverride
                } else {
                    ArchiveReason::NoResponseNeeded
                };
                return self.archive(record, reason, trail).await;
            }
            Gate::Proceed { overridden: true } => {
                info!("Reviewer overrode 'no_response_needed', proceeding");
            }
            Gate::Proceed { overridden: false } => {}
        }

        // 3. Category gate
        let email_inputs = TemplateInputs::new().with("email_content", email_content.as_str());
        let output: CategoryOutput = self
            .classifier
            .classify(TemplateKey::Categorizer, &email_inputs)
            .await?;
        let category = Category::from_label(&output.decision);
        info!(category = category.label(), reason = %output.reason, "Email categorized");

        let verdict = self
            .reviewer
            .confirm(&CheckpointRequest::new(CATEGORY_PROMPT).with_decision(category.label()))
            .await?;
        let route = category_gate(category, verdict.agrees);
        if route.overridden() {
            info!(
                from = category.label(),
                to = route.category().label(),
                "Reviewer overrode category"
            );
        }
        trail.record(
            CheckpointKind::Category,
            category.label(),
            verdict,
            route.category().label(),
        );

        // 4. Meeting gate (move-forward only)
        let writer = match route {
            CategoryRoute::WriteDecline { .. } => WriterKind::Decline,
            CategoryRoute::CheckMeeting { .. } => {
                let output: MeetingRequestOutput = self
                    .classifier
                    .classify(TemplateKey::MeetingRequestDecider, &email_inputs)
                    .await?;
                info!(is_meeting = %output.decision, "Meeting request decision");

                let decision_text = format!("Is meeting request? {}", output.decision);
                let context_text = format!("Email category: {}", route.category().label());
                let verdict = self
                    .reviewer
                    .confirm(
                        &CheckpointRequest::new(MEETING_PROMPT)
                            .with_decision(&decision_text)
                            .with_context(&context_text),
                    )
                    .await?;
                let meeting = meeting_gate(&output.decision, verdict.agrees);
                if meeting.overridden {
                    info!(
                        from = %output.decision,
                        to = %meeting.label,
                        "Reviewer overrode meeting request decision"
                    );
                }
                trail.record(
                    CheckpointKind::MeetingRequest,
                    output.decision.as_str(),
                    verdict,
                    meeting.label.as_str(),
                );
                meeting.writer()
            }
        };

        // Writer
        info!(writer = writer.label(), "Generating response");
        let draft = self
            .classifier
            .generate(writer.template(), &email_inputs)
            .await?;

        // 5. Edit-diff
        let (final_response, editor_analysis) = self.finalize(record, &draft, &mut trail).await?;

        info!(
            writer = writer.label(),
            edited = editor_analysis.is_some(),
            "Response finalized"
        );
        Ok(EmailOutcome::Responded(ResponseOutcome {
            message_id: record.message_id.clone(),
            writer,
            draft,
            final_response,
            editor_analysis,
            trail,
        }))
    }

    /// Pick the text to send and, when it differs from the draft, analyze the edit.
    async fn finalize(
        &self,
        record: &EmailRecord,
        draft: &str,
        trail: &mut DecisionTrail,
    ) -> Result<(String, Option<EditAnalysis>), TriageError> {
        if let Some(edited) = record.edited_text() {
            debug!("Record carries an edited version, analyzing without checkpoint");
            let analysis = self.editor.diff(draft, edited).await?;
            return Ok((edited.to_string(), Some(analysis)));
        }

        let context = format!("Generated response:\n{draft}");
        let verdict = self
            .reviewer
            .confirm(&CheckpointRequest::new(EDIT_PROMPT).with_context(&context))
            .await?;
        let wants_edit = verdict.agrees;
        let resolved = if wants_edit { "edit" } else { "send" };
        trail.record(CheckpointKind::EditBeforeSending, "", verdict, resolved);
        if !wants_edit {
            return Ok((draft.to_string(), None));
        }

        match self.reviewer.revise(draft).await? {
            Some(edited) if !edited.trim().is_empty() => {
                let analysis = self.editor.diff(draft, &edited).await?;
                Ok((edited, Some(analysis)))
            }
            _ => {
                debug!("Empty revision, keeping draft");
                Ok((draft.to_string(), None))
            }
        }
    }

    async fn archive(
        &self,
        record: &EmailRecord,
        reason: ArchiveReason,
        trail: DecisionTrail,
    ) -> Result<EmailOutcome, TriageError> {
        let archived = match record.message_id.as_deref() {
            Some(id) => match self.archiver.archive(id).await {
                Ok(()) => {
                    info!(message_id = %id, "Email archived");
                    true
                }
                Err(e) => match self.archive_policy {
                    ArchivePolicy::Strict => return Err(e.into()),
                    ArchivePolicy::BestEffort => {
                        warn!(message_id = %id, error = %e, "Archiving failed, continuing");
                        false
                    }
                },
            },
            None => {
                warn!(thread_id = %record.thread_id, "Email has no message id, nothing to archive");
                false
            }
        };

        Ok(EmailOutcome::Archived {
            message_id: record.message_id.clone(),
            reason,
            archived,
            trail,
        })
    }
}
