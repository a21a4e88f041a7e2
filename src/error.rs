//! Error types for inbox triage.

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Run ledger errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },
}

/// Failures of the triage pipeline and its collaborators.
///
/// Any of these aborts the current batch under the fail-fast policy.
#[derive(Debug, thiserror::Error)]
pub enum TriageError {
    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    #[error("Parse failed: {0}")]
    Parse(String),

    #[error("Generation failed for template {template}: {reason}")]
    Generation {
        template: &'static str,
        reason: String,
    },

    #[error("Output of template {template} violates its schema: {reason}")]
    SchemaViolation {
        template: &'static str,
        reason: String,
    },

    #[error("Template {template} is missing input variable '{variable}'")]
    Template {
        template: &'static str,
        variable: &'static str,
    },

    #[error("Checkpoint failed: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("Archiving failed: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Run ledger failed: {0}")]
    Store(#[from] DatabaseError),
}

/// Human checkpoint errors.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    /// Malformed answer. Reviewers re-prompt on this; it never reaches the batch.
    #[error("Invalid answer: {0}")]
    InvalidInput(String),

    #[error("Reviewer input closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Archiver collaborator errors.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("Message {message_id} not found in mailbox")]
    NotFound { message_id: String },

    #[error("Failed to archive {message_id}: {reason}")]
    Failed { message_id: String, reason: String },
}
