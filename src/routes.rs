//! REST endpoints — verification-email fetch, alias generation, history.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tracing::error;

use crate::config::MailboxConfig;
use crate::store::{AliasAction, Store};
use crate::{alias, fetcher};

/// Shared state for the API routes.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub mailbox: Arc<MailboxConfig>,
}

#[derive(Debug, Deserialize)]
pub struct PrefixQuery {
    pub prefix: Option<String>,
}

/// GET /api/emails?prefix=<p>
///
/// Runs the whole pipeline: fetch the newest mailbox window, parse, filter
/// by prefix, extract codes. Session-level failures surface as the failure
/// JSON shape with status 500 — this handler never propagates an error.
async fn fetch_emails(
    State(state): State<AppState>,
    Query(query): Query<PrefixQuery>,
) -> impl IntoResponse {
    let prefix = query.prefix.filter(|p| !p.is_empty());

    match fetcher::fetch_verification_emails(state.mailbox.as_ref(), prefix.as_deref()).await {
        Ok(results) => {
            if let Some(prefix) = &prefix
                && !results.is_empty()
            {
                fetcher::record_results(&*state.store, prefix, &state.mailbox.domain, &results)
                    .await;
            }
            Json(serde_json::json!({
                "success": true,
                "count": results.len(),
                "emails": results,
            }))
            .into_response()
        }
        Err(e) => {
            error!(error = %e, "failed to fetch emails");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "success": false,
                    "error": e.to_string(),
                })),
            )
                .into_response()
        }
    }
}

/// POST /api/aliases — generate a fresh alias and record the event.
async fn generate_alias(State(state): State<AppState>) -> impl IntoResponse {
    let prefix = alias::generate_prefix();
    let address = alias::full_address(&prefix, &state.mailbox.domain);

    match state
        .store
        .record_alias_event(&prefix, &address, AliasAction::Generated)
        .await
    {
        Ok(()) => Json(serde_json::json!({
            "prefix": prefix,
            "address": address,
        }))
        .into_response(),
        Err(e) => store_failure(e),
    }
}

/// POST /api/aliases/{prefix}/copied — record that an alias was copied.
async fn record_copy(
    State(state): State<AppState>,
    Path(prefix): Path<String>,
) -> impl IntoResponse {
    let address = alias::full_address(&prefix, &state.mailbox.domain);
    match state
        .store
        .record_alias_event(&prefix, &address, AliasAction::Copied)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => store_failure(e),
    }
}

/// GET /api/aliases — recently generated aliases, deduplicated by prefix.
async fn list_aliases(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.recent_aliases(50).await {
        Ok(aliases) => Json(aliases).into_response(),
        Err(e) => store_failure(e),
    }
}

/// GET /api/received?prefix=<p> — cached received emails for one prefix.
async fn list_received(
    State(state): State<AppState>,
    Query(query): Query<PrefixQuery>,
) -> impl IntoResponse {
    let Some(prefix) = query.prefix.filter(|p| !p.is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "prefix query parameter is required"})),
        )
            .into_response();
    };
    match state.store.received_for_prefix(&prefix).await {
        Ok(rows) => Json(rows).into_response(),
        Err(e) => store_failure(e),
    }
}

fn store_failure(e: crate::error::StoreError) -> axum::response::Response {
    error!(error = %e, "store operation failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({"error": e.to_string()})),
    )
        .into_response()
}

/// Build the API router.
pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/emails", get(fetch_emails))
        .route("/api/aliases", post(generate_alias).get(list_aliases))
        .route("/api/aliases/{prefix}/copied", post(record_copy))
        .route("/api/received", get(list_received))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
