use std::sync::Arc;

use mailcode::config::{MailboxConfig, ServerConfig};
use mailcode::routes::{AppState, api_routes};
use mailcode::store::{LibSqlBackend, Store};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let mailbox = MailboxConfig::from_env()?;
    let server = ServerConfig::from_env();

    eprintln!("📬 mailcode v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   IMAP: {}:{}", mailbox.host, mailbox.port);
    eprintln!("   Alias domain: @{}", mailbox.domain);
    eprintln!("   API: http://0.0.0.0:{}/api", server.http_port);

    let store: Arc<dyn Store> = Arc::new(
        LibSqlBackend::new_local(std::path::Path::new(&server.db_path)).await?,
    );
    eprintln!("   Database: {}\n", server.db_path);

    let state = AppState {
        store,
        mailbox: Arc::new(mailbox),
    };

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", server.http_port)).await?;
    tracing::info!(port = server.http_port, "API server started");
    axum::serve(listener, api_routes(state)).await?;

    Ok(())
}
