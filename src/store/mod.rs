//! Persistence — alias event log and the received-email cache.

pub mod libsql_backend;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::{AliasAction, AliasRecord, ReceivedEmail, Store};
