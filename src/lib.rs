//! mailcode — disposable mailbox aliases and verification-code retrieval.

pub mod alias;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetcher;
pub mod mailbox;
pub mod message;
pub mod routes;
pub mod store;
