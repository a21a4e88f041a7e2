//! libSQL run ledger: one row per processed email.

use std::path::Path;
use std::sync::Arc;

use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::pipeline::types::{EmailOutcome, FailedEmail};
use crate::store::migrations;

/// Durable record of what each run did to each email.
///
/// Rows are written as soon as an email reaches a terminal outcome, so a
/// run that aborts later still leaves the finished emails on record.
pub struct RunLedger {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl RunLedger {
    /// Open (or create) a local ledger file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create ledger directory: {e}"))
            })?;
        }

        let ledger = Self::open(path.to_string_lossy().as_ref()).await?;
        info!(path = %path.display(), "Run ledger opened");
        Ok(ledger)
    }

    /// In-memory ledger (tests and dry runs).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        Self::open(":memory:").await
    }

    async fn open(location: &str) -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(location)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    /// Commit one email's terminal outcome.
    pub async fn record_outcome(
        &self,
        run_id: Uuid,
        outcome: &EmailOutcome,
    ) -> Result<(), DatabaseError> {
        let payload = serde_json::to_string(outcome)
            .map_err(|e| DatabaseError::Serialization(format!("outcome: {e}")))?;
        let (writer, archived) = match outcome {
            EmailOutcome::Archived { archived, .. } => (None, *archived),
            EmailOutcome::Responded(response) => (Some(response.writer.label()), false),
        };

        self.conn
            .execute(
                "INSERT INTO email_outcomes (run_id, message_id, outcome, writer, archived, payload)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    run_id.to_string(),
                    outcome.message_id().map(str::to_string),
                    outcome.label(),
                    writer,
                    i64::from(archived),
                    payload
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("record_outcome: {e}")))?;

        debug!(%run_id, outcome = outcome.label(), "Outcome committed");
        Ok(())
    }

    /// Commit a failure that the batch skipped past.
    pub async fn record_failure(
        &self,
        run_id: Uuid,
        failure: &FailedEmail,
    ) -> Result<(), DatabaseError> {
        self.conn
            .execute(
                "INSERT INTO email_failures (run_id, message_id, error) VALUES (?1, ?2, ?3)",
                params![
                    run_id.to_string(),
                    failure.message_id.clone(),
                    failure.error.as_str()
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("record_failure: {e}")))?;
        Ok(())
    }

    /// Outcomes of one run, in commit order.
    pub async fn outcomes_for_run(&self, run_id: Uuid) -> Result<Vec<EmailOutcome>, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                "SELECT payload FROM email_outcomes WHERE run_id = ?1 ORDER BY id ASC",
                params![run_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("outcomes_for_run: {e}")))?;

        let mut outcomes = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("outcomes_for_run row: {e}")))?
        {
            let payload: String = row
                .get(0)
                .map_err(|e| DatabaseError::Query(format!("outcomes_for_run payload: {e}")))?;
            let outcome = serde_json::from_str(&payload)
                .map_err(|e| DatabaseError::Serialization(format!("stored outcome: {e}")))?;
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    /// Failures recorded for one run, in commit order.
    pub async fn failures_for_run(&self, run_id: Uuid) -> Result<Vec<FailedEmail>, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                "SELECT message_id, error FROM email_failures WHERE run_id = ?1 ORDER BY id ASC",
                params![run_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("failures_for_run: {e}")))?;

        let mut failures = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("failures_for_run row: {e}")))?
        {
            failures.push(FailedEmail {
                message_id: row.get::<Option<String>>(0).ok().flatten(),
                error: row
                    .get(1)
                    .map_err(|e| DatabaseError::Query(format!("failures_for_run error: {e}")))?,
            });
        }
        Ok(failures)
    }

    /// Whether any run has archived `message_id`.
    pub async fn was_archived(&self, message_id: &str) -> Result<bool, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM email_outcomes
                 WHERE message_id = ?1 AND outcome = 'archived' AND archived = 1",
                params![message_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("was_archived: {e}")))?;

        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("was_archived row: {e}")))?
        {
            Some(row) => {
                let count: i64 = row
                    .get(0)
                    .map_err(|e| DatabaseError::Query(format!("was_archived count: {e}")))?;
                Ok(count > 0)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
impl RunLedger {
    /// Remove the ledger tables so later writes fail.
    pub(crate) async fn drop_tables(&self) {
        self.conn
            .execute_batch("DROP TABLE email_outcomes; DROP TABLE email_failures;")
            .await
            .unwrap();
    }
}
