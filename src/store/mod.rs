//! Persistence layer: libSQL-backed run ledger.

pub mod ledger;
pub mod migrations;

pub use ledger::RunLedger;
