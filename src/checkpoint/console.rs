//! Console reviewer: prompts on a writer, reads answers line by line.

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::sync::Mutex;
use tracing::debug;

use crate::checkpoint::{CheckpointRequest, Reviewer, Verdict, parse_answer};
use crate::error::CheckpointError;

const RULE: &str = "--------------------------------------------------";

struct ConsoleIo<R, W> {
    lines: Lines<R>,
    out: W,
}

impl<R, W> ConsoleIo<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn say(&mut self, text: &str) -> Result<(), CheckpointError> {
        self.out.write_all(text.as_bytes()).await?;
        self.out.flush().await?;
        Ok(())
    }

    async fn read_line(&mut self) -> Result<String, CheckpointError> {
        self.lines.next_line().await?.ok_or(CheckpointError::Closed)
    }
}

/// Interactive reviewer over any line reader and writer.
///
/// The internal lock holds for a whole checkpoint, so concurrent callers
/// are served one at a time.
pub struct ConsoleReviewer<R, W> {
    io: Mutex<ConsoleIo<R, W>>,
}

impl ConsoleReviewer<BufReader<tokio::io::Stdin>, tokio::io::Stdout> {
    /// Reviewer on the process's stdin/stdout.
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> ConsoleReviewer<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            io: Mutex::new(ConsoleIo {
                lines: reader.lines(),
                out: writer,
            }),
        }
    }

    /// Consume the reviewer, returning its writer.
    pub fn into_writer(self) -> W {
        self.io.into_inner().out
    }
}

#[async_trait]
impl<R, W> Reviewer for ConsoleReviewer<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn confirm(&self, request: &CheckpointRequest<'_>) -> Result<Verdict, CheckpointError> {
        let mut io = self.io.lock().await;

        let mut header = format!("\n{}\n", request.prompt);
        if let Some(decision) = request.decision {
            header.push_str(&format!("Decision: {decision}\n"));
        }
        if let Some(context) = request.context {
            header.push_str(&format!("Context:\n{context}\n"));
        }
        io.say(&header).await?;

        loop {
            io.say("Answer yes or no (optionally followed by a comment): ")
                .await?;
            let line = io.read_line().await?;
            match parse_answer(&line) {
                Ok(verdict) => return Ok(verdict),
                Err(CheckpointError::InvalidInput(reason)) => {
                    debug!(%reason, "Invalid checkpoint answer, re-prompting");
                    io.say("Please answer 'yes' or 'no'.\n").await?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn revise(&self, draft: &str) -> Result<Option<String>, CheckpointError> {
        let mut io = self.io.lock().await;
        io.say(&format!(
            "\nPlease edit the response below:\n{RULE}\n{draft}\n{RULE}\n\
             Enter your edited response, ending with a line containing only '.' \
             (or press Enter to keep as is):\n"
        ))
        .await?;

        let first = io.read_line().await?;
        if first.trim().is_empty() {
            return Ok(None);
        }

        let mut edited = vec![first];
        loop {
            match io.lines.next_line().await? {
                Some(line) if line.trim() == "." => break,
                Some(line) => edited.push(line),
                None => break,
            }
        }

        let text = edited.join("\n");
        let text = text.trim();
        Ok((!text.is_empty()).then(|| text.to_string()))
    }
}
