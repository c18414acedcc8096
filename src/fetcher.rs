//! Fetch orchestration: one mailbox session per call, concurrent parsing
//! of the fetched window, filtering, code extraction, and assembly of the
//! public result shape.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::config::MailboxConfig;
use crate::error::SessionError;
use crate::extract::extract_code;
use crate::mailbox::{MailboxSession, RawEmail, SeqRange};
use crate::message::{ParsedEmail, parse_email};
use crate::store::{ReceivedEmail, Store};

/// Newest-N window fetched per call.
pub const FETCH_WINDOW: u32 = 50;

/// Hard-cutoff length of the body preview, in characters.
pub const PREVIEW_CHARS: usize = 200;

/// Public result shape for one matched message.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailSummary {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub date: Option<DateTime<Utc>>,
    pub verification_code: Option<String>,
    pub body_preview: String,
}

/// Fetch the newest window of messages, parse them concurrently, filter by
/// recipient prefix (when given), and extract verification codes.
///
/// Session-level failures abort the whole call; per-message parse failures
/// are logged and drop only that message. The result order carries no
/// meaning.
pub async fn fetch_verification_emails(
    config: &MailboxConfig,
    prefix: Option<&str>,
) -> Result<Vec<EmailSummary>, SessionError> {
    let raws = fetch_window(config.clone()).await?;
    info!(
        count = raws.len(),
        filtered = prefix.is_some(),
        "fetched mailbox window"
    );
    Ok(assemble(raws, prefix).await)
}

/// Run one complete session on the blocking pool: open, select, compute the
/// range, fetch, log out.
///
/// Teardown does not depend on this future: `spawn_blocking` runs the
/// closure to completion even if the caller is cancelled, and the session's
/// `Drop` releases the connection on the error paths.
async fn fetch_window(config: MailboxConfig) -> Result<Vec<RawEmail>, SessionError> {
    tokio::task::spawn_blocking(move || {
        let mut session = MailboxSession::open(&config)?;
        let info = session.select(&config.mailbox)?;
        let range = SeqRange::last_n(info.total_messages, FETCH_WINDOW);
        let raws = session.fetch(range)?;
        session.logout();
        Ok(raws)
    })
    .await
    .map_err(|e| SessionError::Connection(format!("fetch task failed: {e}")))?
}

/// Parse all raw messages concurrently and assemble summaries.
///
/// One task per message in a `JoinSet`, drained with `join_next`: the
/// result is produced only after every parse has settled (parsed,
/// filtered out, or failed) — there is no wall-clock completion proxy.
pub async fn assemble(raws: Vec<RawEmail>, prefix: Option<&str>) -> Vec<EmailSummary> {
    let mut parses = JoinSet::new();
    for raw in raws {
        parses.spawn_blocking(move || (raw.seq, parse_email(&raw.bytes)));
    }

    let mut results = Vec::new();
    while let Some(joined) = parses.join_next().await {
        let (seq, parsed) = match joined {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "parse task failed");
                continue;
            }
        };
        let parsed = match parsed {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(seq, error = %e, "skipping unparseable message");
                continue;
            }
        };
        if let Some(prefix) = prefix
            && !parsed.recipient_matches(prefix)
        {
            continue;
        }
        results.push(summarize(&parsed));
    }
    results
}

fn summarize(parsed: &ParsedEmail) -> EmailSummary {
    let body = parsed.body_text();
    EmailSummary {
        from: parsed.from.clone(),
        to: parsed.to_display(),
        subject: parsed.subject.clone(),
        date: parsed.date,
        verification_code: extract_code(&body),
        body_preview: body.chars().take(PREVIEW_CHARS).collect(),
    }
}

/// Forward results to the upsert sink, one record per summary.
///
/// A failed upsert is logged and does not fail the operation or affect
/// sibling records.
pub async fn record_results(
    store: &dyn Store,
    prefix: &str,
    domain: &str,
    results: &[EmailSummary],
) {
    for summary in results {
        let record = ReceivedEmail {
            email_prefix: prefix.to_string(),
            target_email: crate::alias::full_address(prefix, domain),
            from_address: summary.from.clone(),
            subject: summary.subject.clone(),
            body: summary.body_preview.clone(),
            verification_code: summary.verification_code.clone(),
            received_at: summary.date,
        };
        if let Err(e) = store.upsert_received_email(&record).await {
            warn!(subject = %summary.subject, error = %e, "failed to cache received email");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(seq: u32, to: &str, subject: &str, body: &str) -> RawEmail {
        RawEmail {
            seq,
            bytes: format!(
                "From: Sender <noreply@service.io>\r\nTo: {to}\r\nSubject: {subject}\r\n\
                 Date: Mon, 12 Jan 2026 08:30:00 +0800\r\n\
                 Content-Type: text/plain; charset=utf-8\r\n\r\n{body}"
            )
            .into_bytes(),
        }
    }

    #[tokio::test]
    async fn one_bad_message_does_not_sink_the_batch() {
        let mut raws: Vec<RawEmail> = (1..=50)
            .map(|seq| raw(seq, "user@example.com", &format!("msg {seq}"), "验证码：8839"))
            .collect();
        // Message 17 has an empty stream and must fail to parse.
        raws[16].bytes.clear();

        let results = assemble(raws, None).await;
        assert_eq!(results.len(), 49);
        assert!(results.iter().all(|r| r.verification_code.as_deref() == Some("8839")));
    }

    #[tokio::test]
    async fn prefix_filter_excludes_other_recipients() {
        let raws = vec![
            raw(1, "Xk9TqAbc@qq.com", "a", "code: 1111"),
            raw(2, "someoneelse@qq.com", "b", "code: 2222"),
            raw(3, "Another <xk9tqabc@qq.com>", "c", "code: 3333"),
        ];
        let mut results = assemble(raws, Some("Xk9TqAbc")).await;
        results.sort_by(|a, b| a.subject.cmp(&b.subject));
        let codes: Vec<_> = results
            .iter()
            .map(|r| r.verification_code.clone().unwrap())
            .collect();
        assert_eq!(codes, vec!["1111", "3333"]);
    }

    #[tokio::test]
    async fn no_prefix_passes_everything_parsed() {
        let raws = vec![
            raw(1, "a@qq.com", "a", "hello"),
            raw(2, "b@qq.com", "b", "world"),
        ];
        let results = assemble(raws, None).await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.verification_code.is_none()));
    }

    #[tokio::test]
    async fn preview_is_hard_cutoff_at_200_chars() {
        let long_body = "x".repeat(500);
        let raws = vec![raw(1, "u@qq.com", "long", &long_body)];
        let results = assemble(raws, None).await;
        assert_eq!(results[0].body_preview.chars().count(), PREVIEW_CHARS);
    }

    #[tokio::test]
    async fn short_body_preview_is_whole_body() {
        let raws = vec![raw(1, "u@qq.com", "short", "tiny")];
        let results = assemble(raws, None).await;
        assert_eq!(results[0].body_preview, "tiny");
    }

    #[tokio::test]
    async fn html_only_message_round_trip() {
        let raws = vec![RawEmail {
            seq: 1,
            bytes: b"From: s@x.io\r\nTo: u@qq.com\r\nSubject: c\r\n\
                     Content-Type: text/html; charset=utf-8\r\n\r\n<p>Code: 7788</p>"
                .to_vec(),
        }];
        let results = assemble(raws, None).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].body_preview.trim(), "Code: 7788");
        assert_eq!(results[0].verification_code.as_deref(), Some("7788"));
    }

    #[test]
    fn summary_serializes_with_camel_case_keys() {
        let summary = EmailSummary {
            from: "a".into(),
            to: "b".into(),
            subject: "s".into(),
            date: None,
            verification_code: Some("1234".into()),
            body_preview: "p".into(),
        };
        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"verificationCode\""));
        assert!(json.contains("\"bodyPreview\""));
    }
}
