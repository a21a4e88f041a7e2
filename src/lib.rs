//! Inbox Triage: reviewer-gated email triage.

pub mod checkpoint;
pub mod classify;
pub mod config;
pub mod error;
pub mod llm;
pub mod mail;
pub mod pipeline;
pub mod prompts;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;
