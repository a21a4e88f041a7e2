use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use inbox_triage::checkpoint::{ConsoleReviewer, Reviewer};
use inbox_triage::classify::Classifier;
use inbox_triage::config::TriageConfig;
use inbox_triage::llm::create_provider;
use inbox_triage::mail::{MailboxArchiver, MailboxRetriever, MimeThreadParser};
use inbox_triage::pipeline::{BatchDriver, BatchOutcome, BatchReport, DecisionPipeline};
use inbox_triage::prompts::PromptLibrary;
use inbox_triage::store::RunLedger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = TriageConfig::from_env().context("Failed to load configuration")?;
    let _log_guard = init_tracing(config.log_dir.as_deref());

    eprintln!("📬 Inbox Triage v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.llm.model);
    eprintln!("   Mailbox: {}", config.mailbox_dir.display());
    eprintln!("   Batch size: {}\n", config.batch_size);

    let llm = create_provider(&config.llm).context("Failed to create LLM provider")?;
    let prompts = match &config.prompts_dir {
        Some(dir) => PromptLibrary::load(dir)
            .with_context(|| format!("Failed to load prompts from {}", dir.display()))?,
        None => PromptLibrary::builtin(),
    };
    let classifier = Arc::new(Classifier::new(
        llm,
        Arc::new(prompts),
        config.classifier.clone(),
    ));

    // Reviewer prompts own stdout; logs go to stderr.
    let reviewer: Arc<dyn Reviewer> = Arc::new(ConsoleReviewer::stdio());
    let archiver = Arc::new(MailboxArchiver::new(config.mailbox_dir.clone()));
    let pipeline = DecisionPipeline::new(classifier, reviewer, archiver, config.archive_policy);

    let mut driver = BatchDriver::new(pipeline, config.failure_policy);
    if let Some(path) = &config.db_path {
        let ledger = RunLedger::new_local(path)
            .await
            .with_context(|| format!("Failed to open run ledger at {}", path.display()))?;
        driver = driver.with_ledger(Arc::new(ledger));
    }

    let retriever = MailboxRetriever::new(config.mailbox_dir.clone());
    let parser = MimeThreadParser::new();
    let outcome = driver
        .run_once(&retriever, &parser, config.batch_size)
        .await
        .context("Triage run failed")?;

    match outcome {
        BatchOutcome::NoEmails => println!("No emails to process."),
        BatchOutcome::Completed(report) => print_report(&report),
    }
    Ok(())
}

/// Console logging on stderr, plus daily rolling files when `log_dir` is set.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let (file, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "inbox-triage.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .init();
    guard
}

fn print_report(report: &BatchReport) {
    for response in &report.responses {
        println!(
            "\n=== {} ({} reply) ===",
            response.message_id.as_deref().unwrap_or("(no id)"),
            response.writer.label()
        );
        println!("{}", response.final_response);
        if let Some(analysis) = &response.editor_analysis {
            println!("\nEdit analysis: {}", analysis.summary);
            for learning in &analysis.learnings {
                println!("  - {learning}");
            }
        }
    }

    println!(
        "\nRun {}: {} responded, {} archived, {} failed",
        report.run_id,
        report.responses.len(),
        report.archived,
        report.failed.len()
    );
    for failed in &report.failed {
        println!(
            "  failed {}: {}",
            failed.message_id.as_deref().unwrap_or("(no id)"),
            failed.error
        );
    }
    println!(
        "Tokens: {} in / {} out over {} calls (est. ${})",
        report.usage.input_tokens,
        report.usage.output_tokens,
        report.usage.calls,
        report.estimated_cost.round_dp(4)
    );
}
