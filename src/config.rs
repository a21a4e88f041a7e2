//! Configuration types.
//!
//! Everything is read once at startup from the environment and passed down
//! explicitly.

use std::path::PathBuf;
use std::str::FromStr;

use secrecy::SecretString;

use crate::classify::ClassifierConfig;
use crate::error::ConfigError;
use crate::llm::{LlmBackend, LlmConfig};

/// What to do when the archiver fails on an Archived-Skip email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArchivePolicy {
    /// Log a warning and carry on.
    #[default]
    BestEffort,
    /// Treat the failure as a pipeline failure.
    Strict,
}

impl ArchivePolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "best_effort" | "best-effort" => Some(Self::BestEffort),
            "strict" => Some(Self::Strict),
            _ => None,
        }
    }
}

/// What the batch does when one email fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Abort the batch on the first failure.
    #[default]
    FailFast,
    /// Log the failure, record it, and move to the next email.
    Continue,
}

impl FailurePolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "fail_fast" | "fail-fast" => Some(Self::FailFast),
            "continue" => Some(Self::Continue),
            _ => None,
        }
    }
}

/// Process-wide configuration for one triage run.
#[derive(Debug, Clone)]
pub struct TriageConfig {
    pub llm: LlmConfig,
    pub classifier: ClassifierConfig,
    /// Prompt text directory; built-in prompts when unset.
    pub prompts_dir: Option<PathBuf>,
    pub mailbox_dir: PathBuf,
    /// Number of threads to retrieve per run.
    pub batch_size: usize,
    /// Run ledger database; no ledger when unset.
    pub db_path: Option<PathBuf>,
    pub archive_policy: ArchivePolicy,
    pub failure_policy: FailurePolicy,
    /// Rolling log file directory.
    pub log_dir: Option<PathBuf>,
}

impl TriageConfig {
    pub const DEFAULT_MAILBOX_DIR: &'static str = "./mailbox";
    pub const DEFAULT_BATCH_SIZE: usize = 50;

    /// Build from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let backend = match get("TRIAGE_LLM_BACKEND") {
            Some(name) => LlmBackend::parse(&name).ok_or_else(|| ConfigError::InvalidValue {
                key: "TRIAGE_LLM_BACKEND".into(),
                message: format!("unknown backend '{name}', expected openai or anthropic"),
            })?,
            None => LlmBackend::OpenAi,
        };

        let key_var = backend.api_key_var();
        let api_key = get(key_var).ok_or_else(|| ConfigError::MissingEnvVar(key_var.into()))?;
        let model = get("TRIAGE_MODEL").unwrap_or_else(|| backend.default_model().to_string());

        let defaults = ClassifierConfig::default();
        let temperature = parse_var(&get, "TRIAGE_TEMPERATURE", defaults.temperature)?;
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ConfigError::InvalidValue {
                key: "TRIAGE_TEMPERATURE".into(),
                message: format!("{temperature} is outside 0.0..=2.0"),
            });
        }
        let max_tokens = parse_var(&get, "TRIAGE_MAX_TOKENS", defaults.max_tokens)?;

        let batch_size = parse_var(&get, "TRIAGE_BATCH_SIZE", Self::DEFAULT_BATCH_SIZE)?;
        if batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "TRIAGE_BATCH_SIZE".into(),
                message: "must be at least 1".into(),
            });
        }

        let archive_policy = match get("TRIAGE_ARCHIVE_POLICY") {
            Some(value) => ArchivePolicy::parse(&value).ok_or_else(|| ConfigError::InvalidValue {
                key: "TRIAGE_ARCHIVE_POLICY".into(),
                message: format!("'{value}', expected best_effort or strict"),
            })?,
            None => ArchivePolicy::default(),
        };

        let failure_policy = match get("TRIAGE_FAILURE_POLICY") {
            Some(value) => FailurePolicy::parse(&value).ok_or_else(|| ConfigError::InvalidValue {
                key: "TRIAGE_FAILURE_POLICY".into(),
                message: format!("'{value}', expected fail_fast or continue"),
            })?,
            None => FailurePolicy::default(),
        };

        Ok(Self {
            llm: LlmConfig {
                backend,
                api_key: SecretString::from(api_key),
                model,
            },
            classifier: ClassifierConfig {
                temperature,
                max_tokens,
            },
            prompts_dir: get("TRIAGE_PROMPTS_DIR").map(PathBuf::from),
            mailbox_dir: get("TRIAGE_MAILBOX_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(Self::DEFAULT_MAILBOX_DIR)),
            batch_size,
            db_path: get("TRIAGE_DB_PATH").map(PathBuf::from),
            archive_policy,
            failure_policy,
            log_dir: get("TRIAGE_LOG_DIR").map(PathBuf::from),
        })
    }
}

fn parse_var<T>(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("'{raw}': {e}"),
        }),
        None => Ok(default),
    }
}
