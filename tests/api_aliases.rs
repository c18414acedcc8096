//! Integration tests for the alias REST endpoints.
//!
//! Each test spins up the Axum router on a random port with an in-memory
//! store and exercises the real HTTP contract with reqwest. The emails
//! endpoint is not covered here — it needs a live IMAP server.

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::time::timeout;

use mailcode::alias::PREFIX_LEN;
use mailcode::config::MailboxConfig;
use mailcode::routes::{AppState, api_routes};
use mailcode::store::{LibSqlBackend, Store};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

fn test_mailbox_config() -> MailboxConfig {
    MailboxConfig {
        host: "imap.test.local".into(),
        port: 993,
        username: "test@test.local".into(),
        password: SecretString::from("secret".to_string()),
        accept_invalid_certs: true,
        mailbox: "INBOX".into(),
        domain: "test.local".into(),
    }
}

async fn spawn_server() -> String {
    let store: Arc<dyn Store> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
    let state = AppState {
        store,
        mailbox: Arc::new(test_mailbox_config()),
    };
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, api_routes(state)).await.ok();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn generate_alias_returns_wellformed_prefix() {
    timeout(TEST_TIMEOUT, async {
        let base = spawn_server().await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{base}/api/aliases"))
            .send()
            .await
            .unwrap();
        assert!(resp.status().is_success());

        let body: Value = resp.json().await.unwrap();
        let prefix = body["prefix"].as_str().unwrap();
        let address = body["address"].as_str().unwrap();

        assert_eq!(prefix.len(), PREFIX_LEN);
        assert!(prefix.chars().next().unwrap().is_ascii_uppercase());
        assert_eq!(address, &format!("{prefix}@test.local"));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn generated_alias_appears_in_recent_list() {
    timeout(TEST_TIMEOUT, async {
        let base = spawn_server().await;
        let client = reqwest::Client::new();

        let body: Value = client
            .post(format!("{base}/api/aliases"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let prefix = body["prefix"].as_str().unwrap().to_string();

        let aliases: Value = client
            .get(format!("{base}/api/aliases"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        let listed: Vec<&str> = aliases
            .as_array()
            .unwrap()
            .iter()
            .map(|a| a["email_prefix"].as_str().unwrap())
            .collect();
        assert!(listed.contains(&prefix.as_str()));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn copy_event_does_not_duplicate_recent_list() {
    timeout(TEST_TIMEOUT, async {
        let base = spawn_server().await;
        let client = reqwest::Client::new();

        let body: Value = client
            .post(format!("{base}/api/aliases"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let prefix = body["prefix"].as_str().unwrap().to_string();

        let resp = client
            .post(format!("{base}/api/aliases/{prefix}/copied"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::NO_CONTENT);

        let aliases: Value = client
            .get(format!("{base}/api/aliases"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(aliases.as_array().unwrap().len(), 1);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn received_requires_prefix() {
    timeout(TEST_TIMEOUT, async {
        let base = spawn_server().await;
        let client = reqwest::Client::new();

        let resp = client
            .get(format!("{base}/api/received"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn received_empty_for_unknown_prefix() {
    timeout(TEST_TIMEOUT, async {
        let base = spawn_server().await;
        let client = reqwest::Client::new();

        let rows: Value = client
            .get(format!("{base}/api/received?prefix=NopeNope"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(rows.as_array().unwrap().is_empty());
    })
    .await
    .expect("test timed out");
}
