//! Error types for mailcode.

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),
}

/// Mailbox-session errors. All of these abort the whole fetch operation;
/// the session connection is released before any of them surface.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("IMAP authentication failed: {0}")]
    Auth(String),

    #[error("IMAP connection failed: {0}")]
    Connection(String),

    #[error("Mailbox selection failed: {0}")]
    Mailbox(String),

    #[error("Message fetch failed: {0}")]
    Fetch(String),
}

/// Per-message parse errors. A failed parse drops only that message;
/// sibling messages from the same fetch are unaffected.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("message stream was empty")]
    Empty,

    #[error("message could not be parsed")]
    Malformed,
}

/// Store errors. Upsert failures are record-level (logged, swallowed);
/// only startup/migration failures are fatal.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
