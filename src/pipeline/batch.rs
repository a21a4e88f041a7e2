//! Batch driver: runs the decision pipeline over every eligible email.

use std::sync::Arc;

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::FailurePolicy;
use crate::error::TriageError;
use crate::mail::{Retriever, ThreadParser};
use crate::pipeline::triage::DecisionPipeline;
use crate::pipeline::types::{BatchOutcome, BatchReport, EmailOutcome, EmailRecord, FailedEmail};
use crate::store::RunLedger;

/// Sequential driver: one email is fully processed before the next starts.
///
/// The failure policy covers pipeline errors only. A ledger write that fails
/// always aborts the run, under either policy, since a run that kept going
/// would leave emails acted on but unrecorded.
pub struct BatchDriver {
    pipeline: DecisionPipeline,
    failure_policy: FailurePolicy,
    ledger: Option<Arc<RunLedger>>,
}

impl BatchDriver {
    pub fn new(pipeline: DecisionPipeline, failure_policy: FailurePolicy) -> Self {
        Self {
            pipeline,
            failure_policy,
            ledger: None,
        }
    }

    /// Commit every email outcome to `ledger` as soon as it completes.
    ///
    /// Ledger write failures abort the run regardless of the failure policy.
    pub fn with_ledger(mut self, ledger: Arc<RunLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Keep only the most recent message of each thread, in input order.
    pub fn select_recent(records: Vec<EmailRecord>) -> Vec<EmailRecord> {
        records.into_iter().filter(EmailRecord::is_most_recent).collect()
    }

    /// Retrieve, parse and process one batch.
    pub async fn run_once(
        &self,
        retriever: &dyn Retriever,
        parser: &dyn ThreadParser,
        n: usize,
    ) -> Result<BatchOutcome, TriageError> {
        let threads = retriever.retrieve(n).await?;
        info!(threads = threads.len(), "Retrieved threads");
        let records = parser.parse(threads)?;
        self.run(records).await
    }

    /// Process `records` in order. Archived emails are counted but not returned.
    pub async fn run(&self, records: Vec<EmailRecord>) -> Result<BatchOutcome, TriageError> {
        let emails = Self::select_recent(records);
        if emails.is_empty() {
            info!("No emails to process");
            return Ok(BatchOutcome::NoEmails);
        }

        let classifier = self.pipeline.classifier();
        let usage_before = classifier.usage();
        let mut report = BatchReport::new(Uuid::new_v4());
        let total = emails.len();
        info!(run_id = %report.run_id, total, "Starting triage run");

        for (index, email) in emails.iter().enumerate() {
            info!("Processing email {} of {}", index + 1, total);

            match self.pipeline.process(email).await {
                Ok(outcome) => {
                    self.commit(report.run_id, &outcome).await?;
                    match outcome {
                        EmailOutcome::Archived { .. } => report.archived += 1,
                        EmailOutcome::Responded(response) => report.responses.push(response),
                    }
                }
                Err(e) => match self.failure_policy {
                    FailurePolicy::FailFast => {
                        error!(
                            message_id = email.message_id.as_deref().unwrap_or("-"),
                            error = %e,
                            "Email failed, aborting batch"
                        );
                        return Err(e);
                    }
                    FailurePolicy::Continue => {
                        warn!(
                            message_id = email.message_id.as_deref().unwrap_or("-"),
                            error = %e,
                            "Email failed, continuing with next"
                        );
                        let failed = FailedEmail {
                            message_id: email.message_id.clone(),
                            error: e.to_string(),
                        };
                        if let Some(ledger) = &self.ledger {
                            ledger.record_failure(report.run_id, &failed).await?;
                        }
                        report.failed.push(failed);
                    }
                },
            }
        }

        report.usage = classifier.usage().since(usage_before);
        report.estimated_cost = classifier.estimated_cost(report.usage);
        info!(
            run_id = %report.run_id,
            responses = report.responses.len(),
            archived = report.archived,
            failed = report.failed.len(),
            calls = report.usage.calls,
            tokens = report.usage.total(),
            cost = %report.estimated_cost,
            model = classifier.model_name(),
            "Triage run complete"
        );
        Ok(BatchOutcome::Completed(report))
    }

    async fn commit(&self, run_id: Uuid, outcome: &EmailOutcome) -> Result<(), TriageError> {
        if let Some(ledger) = &self.ledger {
            ledger.record_outcome(run_id, outcome).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::ScriptedReviewer;
    use crate::classify::{Classifier, ClassifierConfig};
    use crate::config::ArchivePolicy;
    use crate::mail::MemoryArchiver;
    use crate::pipeline::types::EmailContent;
    use crate::prompts::PromptLibrary;
    use crate::testing::ScriptedLlm;

    const SUMMARY: &str = r#"{"summary": "s", "key_points": [], "action_items": []}"#;

    fn record(id: &str, order: u32) -> EmailRecord {
        EmailRecord {
            message_id: Some(id.into()),
            thread_id: format!("thread-{id}"),
            order,
            content: EmailContent {
                from: "a@example.com".into(),
                subject: id.into(),
                body: "body".into(),
                ..Default::default()
            },
            edited_email: None,
        }
    }

    fn driver(llm: ScriptedLlm, reviewer: ScriptedReviewer, policy: FailurePolicy) -> BatchDriver {
        let classifier = Arc::new(Classifier::new(
            Arc::new(llm),
            Arc::new(PromptLibrary::builtin()),
            ClassifierConfig::default(),
        ));
        let pipeline = DecisionPipeline::new(
            classifier,
            Arc::new(reviewer),
            Arc::new(MemoryArchiver::new()),
            ArchivePolicy::BestEffort,
        );
        BatchDriver::new(pipeline, policy)
    }

    fn archive_script(llm: ScriptedLlm) -> ScriptedLlm {
        llm.reply("summarizer", SUMMARY).reply(
            "needs_response",
            r#"{"needs_response": "no_response_needed", "reason": "fyi"}"#,
        )
    }

    fn decline_script(llm: ScriptedLlm) -> ScriptedLlm {
        llm.reply("summarizer", SUMMARY)
            .reply("needs_response", r#"{"needs_response": "respond", "reason": "asks"}"#)
            .reply("categorizer", r#"{"decision": "decline", "reason": "no"}"#)
            .reply("decline_writer", "No thanks.")
    }

    #[test]
    fn filters_to_most_recent_in_thread() {
        let records = vec![record("a", 1), record("b", 2), record("c", 1), record("d", 3)];
        let selected = BatchDriver::select_recent(records);
        let ids: Vec<_> = selected.iter().filter_map(|r| r.message_id.as_deref()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn no_eligible_emails_is_sentinel() {
        let driver = driver(ScriptedLlm::new(), ScriptedReviewer::new(), FailurePolicy::FailFast);
        assert!(matches!(driver.run(vec![]).await.unwrap(), BatchOutcome::NoEmails));
        assert!(matches!(
            driver.run(vec![record("a", 2)]).await.unwrap(),
            BatchOutcome::NoEmails
        ));
    }

    #[tokio::test]
    async fn archived_emails_are_not_returned() {
        let llm = decline_script(archive_script(ScriptedLlm::new()));
        // archive: agree; decline: agree, agree, then no edit
        let reviewer = ScriptedReviewer::new().agree().agree().agree().disagree();
        let driver = driver(llm, reviewer, FailurePolicy::FailFast);

        let BatchOutcome::Completed(report) = driver
            .run(vec![record("a", 1), record("skip", 2), record("b", 1)])
            .await
            .unwrap()
        else {
            panic!("expected a completed batch");
        };
        assert_eq!(report.archived, 1);
        assert_eq!(report.responses.len(), 1);
        assert_eq!(report.responses[0].message_id.as_deref(), Some("b"));
        assert_eq!(report.usage.calls, 6);
        assert!(report.failed.is_empty());
    }

    #[tokio::test]
    async fn fail_fast_stops_at_first_failure() {
        // Nothing scripted for the second email's summarizer.
        let llm = archive_script(ScriptedLlm::new());
        let reviewer = ScriptedReviewer::new().agree();
        let driver = driver(llm, reviewer, FailurePolicy::FailFast);

        let err = driver
            .run(vec![record("a", 1), record("b", 1), record("c", 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, TriageError::Generation { template: "summarizer", .. }));
    }

    #[tokio::test]
    async fn continue_policy_records_failure_and_moves_on() {
        // First email fails at the summarizer; the second is declined.
        let llm = ScriptedLlm::new()
            .reply("summarizer", "not json")
            .reply("summarizer", "still not json");
        let llm = decline_script(llm);
        let reviewer = ScriptedReviewer::new().agree().agree().disagree();
        let driver = driver(llm, reviewer, FailurePolicy::Continue);

        let BatchOutcome::Completed(report) = driver
            .run(vec![record("bad", 1), record("good", 1)])
            .await
            .unwrap()
        else {
            panic!("expected a completed batch");
        };
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].message_id.as_deref(), Some("bad"));
        assert_eq!(report.responses.len(), 1);
        assert_eq!(report.responses[0].message_id.as_deref(), Some("good"));
    }

    #[tokio::test]
    async fn outcomes_are_committed_to_ledger() {
        let ledger = Arc::new(RunLedger::new_memory().await.unwrap());
        let llm = decline_script(archive_script(ScriptedLlm::new()));
        let reviewer = ScriptedReviewer::new().agree().agree().agree().disagree();
        let driver =
            driver(llm, reviewer, FailurePolicy::FailFast).with_ledger(Arc::clone(&ledger));

        let BatchOutcome::Completed(report) = driver
            .run(vec![record("a", 1), record("b", 1)])
            .await
            .unwrap()
        else {
            panic!("expected a completed batch");
        };

        let stored = ledger.outcomes_for_run(report.run_id).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].label(), "archived");
        assert_eq!(stored[1].label(), "responded");
        assert!(ledger.was_archived("a").await.unwrap());
        assert!(!ledger.was_archived("b").await.unwrap());
    }

    #[tokio::test]
    async fn ledger_failure_aborts_even_under_continue() {
        let ledger = Arc::new(RunLedger::new_memory().await.unwrap());
        ledger.drop_tables().await;
        let llm = decline_script(archive_script(ScriptedLlm::new()));
        let reviewer = ScriptedReviewer::new().agree().agree().agree().disagree();
        let driver =
            driver(llm, reviewer, FailurePolicy::Continue).with_ledger(Arc::clone(&ledger));

        let err = driver
            .run(vec![record("a", 1), record("b", 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, TriageError::Store(_)));
    }
}
