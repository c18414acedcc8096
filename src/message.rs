//! Message parsing — raw RFC 822 bytes to a structured email.

use chrono::{DateTime, Utc};
use mail_parser::MessageParser;

use crate::error::ParseError;

/// One entry from a message's To list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub name: Option<String>,
    pub address: String,
}

impl Recipient {
    /// Display form: `Name <addr>` when a display name is present,
    /// otherwise the bare address.
    pub fn display(&self) -> String {
        match &self.name {
            Some(name) => format!("{name} <{}>", self.address),
            None => self.address.clone(),
        }
    }
}

/// A parsed email. Created once per raw message; immutable after creation.
#[derive(Debug, Clone)]
pub struct ParsedEmail {
    /// Sender display string (`Name <addr>` or bare address).
    pub from: String,
    pub to: Vec<Recipient>,
    pub subject: String,
    pub date: Option<DateTime<Utc>>,
    pub text_body: Option<String>,
    pub html_body: Option<String>,
}

impl ParsedEmail {
    /// The body text used for previews and code extraction: plain text if
    /// present, otherwise the HTML body with tag markup stripped.
    pub fn body_text(&self) -> String {
        if let Some(text) = &self.text_body {
            return text.clone();
        }
        if let Some(html) = &self.html_body {
            return strip_html(html);
        }
        String::new()
    }

    /// True iff any To address, lowercased, contains the lowercased prefix
    /// as a substring. Substring (not exact) semantics: the prefix is
    /// matched within the fuller address string.
    pub fn recipient_matches(&self, prefix: &str) -> bool {
        let needle = prefix.to_lowercase();
        self.to
            .iter()
            .any(|recipient| recipient.address.to_lowercase().contains(&needle))
    }

    /// Stringified To list, comma-separated.
    pub fn to_display(&self) -> String {
        self.to
            .iter()
            .map(Recipient::display)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Parse raw message bytes into a `ParsedEmail`.
///
/// The raw stream is fully consumed here; a failure affects only this
/// message.
pub fn parse_email(raw: &[u8]) -> Result<ParsedEmail, ParseError> {
    if raw.is_empty() {
        return Err(ParseError::Empty);
    }

    let parsed = MessageParser::default()
        .parse(raw)
        .ok_or(ParseError::Malformed)?;

    let from = parsed
        .from()
        .and_then(|addr| addr.first())
        .map(|a| {
            Recipient {
                name: a.name().map(str::to_string),
                address: a.address().unwrap_or_default().to_string(),
            }
            .display()
        })
        .unwrap_or_default();

    let to = recipients(parsed.to());

    let subject = parsed.subject().unwrap_or_default().to_string();

    let date = parsed
        .date()
        .and_then(|d| DateTime::from_timestamp(d.to_timestamp(), 0));

    let text_body = parsed.body_text(0).map(|s| s.to_string());
    let html_body = parsed.body_html(0).map(|s| s.to_string());

    Ok(ParsedEmail {
        from,
        to,
        subject,
        date,
        text_body,
        html_body,
    })
}

/// Flatten a mail_parser Address (list or group form) into recipients.
fn recipients(addr: Option<&mail_parser::Address>) -> Vec<Recipient> {
    let Some(addr) = addr else {
        return Vec::new();
    };
    match addr {
        mail_parser::Address::List(addrs) => addrs.iter().filter_map(to_recipient).collect(),
        mail_parser::Address::Group(groups) => groups
            .iter()
            .flat_map(|g| g.addresses.iter().filter_map(to_recipient))
            .collect(),
    }
}

fn to_recipient(a: &mail_parser::Addr) -> Option<Recipient> {
    let address = a.address.as_ref()?.to_string();
    Some(Recipient {
        name: a.name.as_ref().map(|n| n.to_string()),
        address,
    })
}

/// Strip HTML tag markup via simple `<...>` removal.
///
/// Not an HTML-to-text converter: entities and script contents pass
/// through untouched. Whitespace is preserved so previews show the body
/// as-is.
pub fn strip_html(html: &str) -> String {
    let mut result = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }
    result
}
