//! MIME thread parser: raw RFC 5322 messages to email records.

use chrono::{DateTime, Utc};
use mail_parser::{Address, Message, MessageParser};
use tracing::debug;

use crate::error::TriageError;
use crate::mail::{RawMessage, RawThread, ThreadParser};
use crate::pipeline::types::{EmailContent, EmailRecord};

/// Parses every message of every thread with `mail-parser`.
///
/// Within a thread, messages are sorted newest first and numbered from 1;
/// messages without a date sort last, in their original order.
#[derive(Debug, Default, Clone, Copy)]
pub struct MimeThreadParser;

impl MimeThreadParser {
    pub fn new() -> Self {
        Self
    }
}

impl ThreadParser for MimeThreadParser {
    fn parse(&self, threads: Vec<RawThread>) -> Result<Vec<EmailRecord>, TriageError> {
        let mut records = Vec::new();
        for thread in threads {
            let mut parsed = thread
                .messages
                .into_iter()
                .map(parse_message)
                .collect::<Result<Vec<_>, _>>()?;

            // Stable sort: newest first, undated last.
            parsed.sort_by(|a, b| b.content.date.cmp(&a.content.date));

            for (index, message) in parsed.into_iter().enumerate() {
                records.push(EmailRecord {
                    message_id: Some(message.source_id),
                    thread_id: thread.thread_id.clone(),
                    order: u32::try_from(index + 1).unwrap_or(u32::MAX),
                    content: message.content,
                    edited_email: message.edited,
                });
            }
        }
        debug!(records = records.len(), "Parsed threads");
        Ok(records)
    }
}

struct ParsedMessage {
    source_id: String,
    content: EmailContent,
    edited: Option<String>,
}

fn parse_message(raw: RawMessage) -> Result<ParsedMessage, TriageError> {
    let message = MessageParser::default()
        .parse(raw.bytes.as_slice())
        .filter(|m| m.from().is_some() || m.subject().is_some())
        .ok_or_else(|| TriageError::Parse(format!("message {} is not valid RFC 5322", raw.source_id)))?;

    Ok(ParsedMessage {
        content: email_content(&message),
        source_id: raw.source_id,
        edited: raw.edited,
    })
}

fn email_content(message: &Message<'_>) -> EmailContent {
    EmailContent {
        from: extract_addresses(message.from())
            .into_iter()
            .next()
            .unwrap_or_else(|| "unknown".to_string()),
        to: extract_addresses(message.to()),
        cc: extract_addresses(message.cc()),
        subject: message.subject().unwrap_or("(no subject)").to_string(),
        date: message
            .date()
            .and_then(|d| DateTime::<Utc>::from_timestamp(d.to_timestamp(), 0)),
        message_id: message.message_id().unwrap_or_default().to_string(),
        body: strip_quoted_text(&extract_text(message)),
    }
}

fn extract_text(message: &Message<'_>) -> String {
    if let Some(text) = message.body_text(0) {
        return text.to_string();
    }
    if let Some(html) = message.body_html(0) {
        return strip_html(&html);
    }
    String::new()
}

/// Crude tag stripper for HTML-only bodies.
fn strip_html(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Addresses from an optional address header; empty when absent.
pub fn extract_addresses(addr: Option<&Address<'_>>) -> Vec<String> {
    let Some(addr) = addr else {
        return Vec::new();
    };
    match addr {
        Address::List(addrs) => addrs
            .iter()
            .filter_map(|a| a.address.as_ref().map(|s| s.to_string()))
            .collect(),
        Address::Group(groups) => groups
            .iter()
            .flat_map(|g| {
                g.addresses
                    .iter()
                    .filter_map(|a| a.address.as_ref().map(|s| s.to_string()))
            })
            .collect(),
    }
}

/// Drop quoted reply text from a body.
///
/// Removes `>`-prefixed lines and everything after an "On ... wrote:" or
/// "--- Original Message ---" marker, then trailing blank lines.
pub fn strip_quoted_text(body: &str) -> String {
    let mut kept = Vec::new();
    for line in body.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('>') {
            continue;
        }
        if (trimmed.starts_with("On ") && trimmed.ends_with("wrote:"))
            || (trimmed.starts_with("---") && trimmed.contains("Original Message"))
        {
            break;
        }
        kept.push(line);
    }
    while kept.last().is_some_and(|l| l.trim().is_empty()) {
        kept.pop();
    }
    kept.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(id: &str, date: &str, body: &str) -> RawMessage {
        RawMessage {
            source_id: id.to_string(),
            bytes: format!(
                "From: Sam <sam@example.com>\r\n\
                 To: me@example.com\r\n\
                 Cc: Lee <lee@example.com>\r\n\
                 Subject: Catch up\r\n\
                 Date: {date}\r\n\
                 Message-ID: <{id}@example.com>\r\n\
                 \r\n\
                 {body}\r\n"
            )
            .into_bytes(),
            edited: None,
        }
    }

    #[test]
    fn orders_thread_newest_first() {
        let thread = RawThread {
            thread_id: "t".into(),
            messages: vec![
                raw("old", "Mon, 5 Jan 2026 09:00:00 +0000", "First"),
                raw("new", "Wed, 7 Jan 2026 09:00:00 +0000", "Third"),
                raw("mid", "Tue, 6 Jan 2026 09:00:00 +0000", "Second"),
            ],
        };
        let records = MimeThreadParser::new().parse(vec![thread]).unwrap();

        let order: Vec<_> = records
            .iter()
            .map(|r| (r.message_id.as_deref().unwrap(), r.order))
            .collect();
        assert_eq!(order, vec![("new", 1), ("mid", 2), ("old", 3)]);
        assert!(records.iter().all(|r| r.thread_id == "t"));
    }

    #[test]
    fn extracts_headers_and_strips_quotes() {
        let mut message = raw(
            "m1",
            "Mon, 5 Jan 2026 09:00:00 +0000",
            "Can we meet Tuesday?\r\n\r\nOn Sun, Jan 4, 2026 Me <me@example.com> wrote:\r\n> Hi Sam",
        );
        message.edited = Some("Tuesday works.".into());
        let records = MimeThreadParser::new()
            .parse(vec![RawThread {
                thread_id: "t".into(),
                messages: vec![message],
            }])
            .unwrap();

        let record = &records[0];
        assert_eq!(record.content.from, "sam@example.com");
        assert_eq!(record.content.to, vec!["me@example.com"]);
        assert_eq!(record.content.cc, vec!["lee@example.com"]);
        assert_eq!(record.content.subject, "Catch up");
        assert_eq!(record.content.message_id, "m1@example.com");
        assert_eq!(record.content.body, "Can we meet Tuesday?");
        assert!(record.content.date.is_some());
        assert_eq!(record.edited_email.as_deref(), Some("Tuesday works."));
    }

    #[test]
    fn garbage_is_parse_failure() {
        let thread = RawThread {
            thread_id: "t".into(),
            messages: vec![RawMessage {
                source_id: "junk".into(),
                bytes: Vec::new(),
                edited: None,
            }],
        };
        let err = MimeThreadParser::new().parse(vec![thread]).unwrap_err();
        assert!(matches!(err, TriageError::Parse(ref m) if m.contains("junk")));
    }

    // ── strip_quoted_text ───────────────────────────────────────

    #[test]
    fn strip_quoted_lines() {
        let body = "Hello!\n\n> This is quoted\n>> nested\nThanks";
        assert_eq!(strip_quoted_text(body), "Hello!\n\nThanks");
    }

    #[test]
    fn strip_original_message_separator() {
        let body = "See below.\n\n--- Original Message ---\nFrom: x";
        assert_eq!(strip_quoted_text(body), "See below.");
    }

    #[test]
    fn strip_leaves_plain_text_alone() {
        let body = "Just a normal message\nWith multiple lines";
        assert_eq!(strip_quoted_text(body), body);
        assert_eq!(strip_quoted_text(""), "");
    }

    #[test]
    fn html_bodies_are_flattened() {
        assert_eq!(strip_html("<p>Hi <b>there</b></p>\n<p>Bye</p>"), "Hi there\nBye");
    }
}
