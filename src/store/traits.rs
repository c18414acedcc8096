//! Backend-agnostic `Store` trait — single async interface for persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::StoreError;

/// What happened to an alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AliasAction {
    Generated,
    Copied,
}

impl AliasAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AliasAction::Generated => "generated",
            AliasAction::Copied => "copied",
        }
    }
}

/// One alias from the recent-alias listing.
#[derive(Debug, Clone, Serialize)]
pub struct AliasRecord {
    pub email_prefix: String,
    pub full_email: String,
    pub created_at: DateTime<Utc>,
}

/// A cached received email.
///
/// The natural key is `(email_prefix, subject)`: two distinct messages
/// sharing a subject for the same prefix collapse to one stored row. That
/// is the intended (coarse) dedup policy, not an accident.
#[derive(Debug, Clone, Serialize)]
pub struct ReceivedEmail {
    pub email_prefix: String,
    pub target_email: String,
    pub from_address: String,
    pub subject: String,
    pub body: String,
    pub verification_code: Option<String>,
    pub received_at: Option<DateTime<Utc>>,
}

/// Backend-agnostic store covering alias events and received emails.
#[async_trait]
pub trait Store: Send + Sync {
    /// Record a generate/copy event for an alias.
    async fn record_alias_event(
        &self,
        prefix: &str,
        address: &str,
        action: AliasAction,
    ) -> Result<(), StoreError>;

    /// Recently generated aliases, deduplicated by prefix, newest first.
    async fn recent_aliases(&self, limit: usize) -> Result<Vec<AliasRecord>, StoreError>;

    /// Insert-or-replace a received email, conflicting on
    /// `(email_prefix, subject)`.
    async fn upsert_received_email(&self, email: &ReceivedEmail) -> Result<(), StoreError>;

    /// Cached received emails for one prefix, newest first.
    async fn received_for_prefix(&self, prefix: &str) -> Result<Vec<ReceivedEmail>, StoreError>;
}
