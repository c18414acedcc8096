//! IMAP mailbox access — TLS plumbing and the blocking session.

pub mod session;
pub mod tls;

pub use session::{MailboxInfo, MailboxSession, RawEmail, SeqRange};
