//! libSQL backend — async `Store` implementation over a local database.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::info;

use crate::error::StoreError;
use crate::store::traits::{AliasAction, AliasRecord, ReceivedEmail, Store};

/// libSQL store backend.
///
/// Holds a single connection reused for all operations;
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and initialize the schema.
    pub async fn new_local(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Pool(format!("Failed to open libSQL database: {e}")))?;
        let conn = db
            .connect()
            .map_err(|e| StoreError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        info!(path = %path.display(), "Store opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| StoreError::Pool(format!("Failed to create in-memory database: {e}")))?;
        let conn = db
            .connect()
            .map_err(|e| StoreError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        Ok(backend)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS alias_events (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    email_prefix TEXT NOT NULL,
                    full_email TEXT NOT NULL,
                    action TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_alias_events_prefix
                    ON alias_events(email_prefix);

                CREATE TABLE IF NOT EXISTS received_emails (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    email_prefix TEXT NOT NULL,
                    target_email TEXT NOT NULL,
                    from_address TEXT NOT NULL,
                    subject TEXT NOT NULL,
                    body TEXT NOT NULL,
                    verification_code TEXT,
                    received_at TEXT,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    UNIQUE(email_prefix, subject)
                );
                CREATE INDEX IF NOT EXISTS idx_received_emails_prefix
                    ON received_emails(email_prefix);",
            )
            .await
            .map_err(|e| StoreError::Query(format!("Schema init failed: {e}")))?;
        Ok(())
    }
}

/// Parse an RFC 3339 or SQLite datetime string.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn query_err(e: libsql::Error) -> StoreError {
    StoreError::Query(e.to_string())
}

fn row_to_received(row: &libsql::Row) -> Result<ReceivedEmail, libsql::Error> {
    // Column order: email_prefix, target_email, from_address, subject,
    // body, verification_code, received_at
    Ok(ReceivedEmail {
        email_prefix: row.get(0)?,
        target_email: row.get(1)?,
        from_address: row.get(2)?,
        subject: row.get(3)?,
        body: row.get(4)?,
        // NULL columns read as Err under get::<String>; treat as absent.
        verification_code: row.get::<String>(5).ok(),
        received_at: row.get::<String>(6).ok().map(|s| parse_datetime(&s)),
    })
}

#[async_trait]
impl Store for LibSqlBackend {
    async fn record_alias_event(
        &self,
        prefix: &str,
        address: &str,
        action: AliasAction,
    ) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO alias_events (email_prefix, full_email, action, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![prefix, address, action.as_str(), Utc::now().to_rfc3339()],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn recent_aliases(&self, limit: usize) -> Result<Vec<AliasRecord>, StoreError> {
        let mut rows = self
            .conn
            .query(
                "SELECT email_prefix, full_email, MAX(created_at) AS created_at
                 FROM alias_events
                 WHERE action = 'generated'
                 GROUP BY email_prefix
                 ORDER BY created_at DESC
                 LIMIT ?1",
                params![limit as i64],
            )
            .await
            .map_err(query_err)?;

        let mut aliases = Vec::new();
        while let Some(row) = rows.next().await.map_err(query_err)? {
            let created: String = row.get(2).map_err(query_err)?;
            aliases.push(AliasRecord {
                email_prefix: row.get(0).map_err(query_err)?,
                full_email: row.get(1).map_err(query_err)?,
                created_at: parse_datetime(&created),
            });
        }
        Ok(aliases)
    }

    async fn upsert_received_email(&self, email: &ReceivedEmail) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO received_emails
                    (email_prefix, target_email, from_address, subject, body,
                     verification_code, received_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
                 ON CONFLICT(email_prefix, subject) DO UPDATE SET
                    target_email = excluded.target_email,
                    from_address = excluded.from_address,
                    body = excluded.body,
                    verification_code = excluded.verification_code,
                    received_at = excluded.received_at,
                    updated_at = excluded.updated_at",
                params![
                    email.email_prefix.as_str(),
                    email.target_email.as_str(),
                    email.from_address.as_str(),
                    email.subject.as_str(),
                    email.body.as_str(),
                    email.verification_code.clone(),
                    email.received_at.map(|d| d.to_rfc3339()),
                    now,
                ],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn received_for_prefix(&self, prefix: &str) -> Result<Vec<ReceivedEmail>, StoreError> {
        let mut rows = self
            .conn
            .query(
                "SELECT email_prefix, target_email, from_address, subject, body,
                        verification_code, received_at
                 FROM received_emails
                 WHERE email_prefix = ?1
                 ORDER BY updated_at DESC",
                params![prefix],
            )
            .await
            .map_err(query_err)?;

        let mut emails = Vec::new();
        while let Some(row) = rows.next().await.map_err(query_err)? {
            emails.push(row_to_received(&row).map_err(query_err)?);
        }
        Ok(emails)
    }
}
