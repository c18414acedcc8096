//! Blocking IMAP session: authenticate, select, fetch a sequence range,
//! tear down. One session serves one fetch-range request end-to-end; run
//! it inside `tokio::task::spawn_blocking`.
//!
//! The connection is released on every exit path: `logout()` on the happy
//! path, and a `Drop` impl that best-effort LOGOUTs and shuts the socket
//! when a session is abandoned mid-operation.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use rustls::{ClientConnection, StreamOwned};
use rustls_pki_types::ServerName;
use secrecy::ExposeSecret;
use tracing::debug;

use crate::config::MailboxConfig;
use crate::error::SessionError;
use crate::mailbox::tls;

const IO_TIMEOUT: Duration = Duration::from_secs(30);

/// A raw fetched message: sequence number plus the full RFC 822 bytes.
/// Ownership transfers to the parser, which consumes the bytes whole.
#[derive(Debug, Clone)]
pub struct RawEmail {
    pub seq: u32,
    pub bytes: Vec<u8>,
}

/// Result of selecting a mailbox.
#[derive(Debug, Clone, Copy)]
pub struct MailboxInfo {
    pub total_messages: u32,
}

/// A contiguous 1-based sequence-number interval.
///
/// `last_n(total, n)` covers the newest `n` messages:
/// start `max(1, total - n + 1)`, end `total`. A zero total yields the
/// empty range and no FETCH is issued for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeqRange {
    start: u32,
    end: u32,
}

impl SeqRange {
    pub fn last_n(total: u32, n: u32) -> Self {
        if total == 0 {
            return Self { start: 1, end: 0 };
        }
        Self {
            start: total.saturating_sub(n - 1).max(1),
            end: total,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> u32 {
        self.end
    }

    /// Number of messages covered.
    pub fn len(&self) -> u32 {
        if self.is_empty() {
            0
        } else {
            self.end - self.start + 1
        }
    }
}

/// Tagged-command response: untagged data lines plus the tagged completion.
struct CommandResponse {
    tagged: String,
    untagged: Vec<String>,
}

impl CommandResponse {
    fn is_ok(&self) -> bool {
        tagged_ok(&self.tagged)
    }
}

/// True iff a tagged completion line reports OK.
fn tagged_ok(line: &str) -> bool {
    line.split_whitespace()
        .nth(1)
        .is_some_and(|word| word.eq_ignore_ascii_case("OK"))
}

/// An authenticated IMAP session over TLS.
pub struct MailboxSession {
    stream: StreamOwned<ClientConnection, TcpStream>,
    tag: u32,
    closed: bool,
}

impl MailboxSession {
    /// Connect, perform the TLS handshake, and authenticate.
    ///
    /// Network and TLS failures map to `Connection`; a rejected LOGIN maps
    /// to `Auth`.
    pub fn open(config: &MailboxConfig) -> Result<Self, SessionError> {
        let tcp = TcpStream::connect((config.host.as_str(), config.port))
            .map_err(|e| SessionError::Connection(format!("connect {}: {e}", config.host)))?;
        tcp.set_read_timeout(Some(IO_TIMEOUT))
            .map_err(|e| SessionError::Connection(e.to_string()))?;
        tcp.set_write_timeout(Some(IO_TIMEOUT))
            .map_err(|e| SessionError::Connection(e.to_string()))?;

        let server_name = ServerName::try_from(config.host.clone())
            .map_err(|e| SessionError::Connection(format!("invalid host name: {e}")))?;
        let conn =
            ClientConnection::new(tls::client_config(config.accept_invalid_certs), server_name)
                .map_err(|e| SessionError::Connection(format!("TLS setup: {e}")))?;

        let mut session = Self {
            stream: StreamOwned::new(conn, tcp),
            tag: 0,
            closed: false,
        };

        let greeting = session
            .read_line()
            .map_err(|e| SessionError::Connection(format!("greeting: {e}")))?;
        debug!(greeting = greeting.trim(), "IMAP server greeting");

        let login = session
            .command(&format!(
                "LOGIN {} {}",
                quote(&config.username),
                quote(config.password.expose_secret()),
            ))
            .map_err(|e| SessionError::Connection(format!("login: {e}")))?;
        if !login.is_ok() {
            return Err(SessionError::Auth(login.tagged.trim().to_string()));
        }

        Ok(session)
    }

    /// Select a mailbox and report its total message count.
    pub fn select(&mut self, mailbox: &str) -> Result<MailboxInfo, SessionError> {
        let response = self
            .command(&format!("SELECT {}", quote(mailbox)))
            .map_err(|e| SessionError::Mailbox(format!("select {mailbox}: {e}")))?;
        if !response.is_ok() {
            return Err(SessionError::Mailbox(response.tagged.trim().to_string()));
        }

        let total = response
            .untagged
            .iter()
            .find_map(|line| parse_exists(line))
            .unwrap_or(0);
        Ok(MailboxInfo {
            total_messages: total,
        })
    }

    /// Fetch the full body of every message in `range`.
    ///
    /// The empty range issues no FETCH. A descending non-empty range can
    /// only come from a miscomputed range, caught by the debug assertion.
    pub fn fetch(&mut self, range: SeqRange) -> Result<Vec<RawEmail>, SessionError> {
        if range.is_empty() {
            return Ok(Vec::new());
        }
        debug_assert!(range.end >= range.start, "descending fetch range");

        self.tag += 1;
        let tag = format!("A{}", self.tag);
        self.write_all(&format!(
            "{tag} FETCH {}:{} (BODY.PEEK[])\r\n",
            range.start, range.end
        ))
        .map_err(|e| SessionError::Fetch(format!("send: {e}")))?;

        let mut raws = Vec::with_capacity(range.len() as usize);
        loop {
            let line = self
                .read_line()
                .map_err(|e| SessionError::Fetch(format!("read: {e}")))?;

            if line.starts_with(&tag) {
                if !tagged_ok(&line) {
                    return Err(SessionError::Fetch(line.trim().to_string()));
                }
                break;
            }

            if let Some((seq, len)) = parse_fetch_prelude(&line) {
                let mut bytes = vec![0u8; len];
                self.stream
                    .read_exact(&mut bytes)
                    .map_err(|e| SessionError::Fetch(format!("literal: {e}")))?;
                raws.push(RawEmail { seq, bytes });
            }
            // Attribute continuation lines and closing ")" are skipped.
        }

        debug!(count = raws.len(), "fetched raw messages");
        Ok(raws)
    }

    /// Log out and release the connection. Errors during LOGOUT are
    /// ignored; the session is gone either way.
    pub fn logout(mut self) {
        let _ = self.command("LOGOUT");
        let _ = self.stream.sock.shutdown(std::net::Shutdown::Both);
        self.closed = true;
    }

    // ── wire helpers ────────────────────────────────────────────────

    fn command(&mut self, cmd: &str) -> std::io::Result<CommandResponse> {
        self.tag += 1;
        let tag = format!("A{}", self.tag);
        self.write_all(&format!("{tag} {cmd}\r\n"))?;

        let mut untagged = Vec::new();
        loop {
            let line = self.read_line()?;
            if line.starts_with(&tag) {
                return Ok(CommandResponse {
                    tagged: line,
                    untagged,
                });
            }
            untagged.push(line);
        }
    }

    fn write_all(&mut self, data: &str) -> std::io::Result<()> {
        self.stream.write_all(data.as_bytes())?;
        self.stream.flush()
    }

    fn read_line(&mut self) -> std::io::Result<String> {
        let mut buf = Vec::new();
        loop {
            let mut byte = [0u8; 1];
            let n = self.stream.read(&mut byte)?;
            if n == 0 {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed",
                ));
            }
            buf.push(byte[0]);
            if buf.ends_with(b"\r\n") {
                return Ok(String::from_utf8_lossy(&buf).to_string());
            }
        }
    }
}

impl Drop for MailboxSession {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        // Abandoned mid-operation: try to say goodbye, then cut the socket.
        self.tag += 1;
        let _ = self.write_all(&format!("A{} LOGOUT\r\n", self.tag));
        let _ = self.stream.sock.shutdown(std::net::Shutdown::Both);
    }
}

/// Quote a string for an IMAP command argument.
fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Parse `* <n> EXISTS`.
fn parse_exists(line: &str) -> Option<u32> {
    let mut tokens = line.split_whitespace();
    if tokens.next()? != "*" {
        return None;
    }
    let n: u32 = tokens.next()?.parse().ok()?;
    tokens
        .next()?
        .eq_ignore_ascii_case("EXISTS")
        .then_some(n)
}

/// Parse the first line of an untagged FETCH response carrying a literal,
/// e.g. `* 17 FETCH (BODY[] {2048}` — returns (sequence number, literal
/// length).
fn parse_fetch_prelude(line: &str) -> Option<(u32, usize)> {
    let mut tokens = line.split_whitespace();
    if tokens.next()? != "*" {
        return None;
    }
    let seq: u32 = tokens.next()?.parse().ok()?;
    if !tokens.next()?.eq_ignore_ascii_case("FETCH") {
        return None;
    }

    let trimmed = line.trim_end();
    let open = trimmed.rfind('{')?;
    let close = trimmed.rfind('}')?;
    if close != trimmed.len() - 1 || close <= open {
        return None;
    }
    let len: usize = trimmed[open + 1..close].parse().ok()?;
    Some((seq, len))
}
