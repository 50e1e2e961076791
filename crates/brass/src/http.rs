//! Axum HTTP surface.
//!
//! A thin adapter: the pipeline itself takes a parsed payload and an
//! explicit request context, so everything here is header plumbing and
//! status-code mapping.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;

use brass_core::ErrorKind;

use crate::auth::bearer_token;
use crate::handler::{handle_spend, RequestContext, SpendOutcome};
use crate::AppState;

/// Build the router. Non-POST methods on `/verify` get a 405 from the
/// method router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/verify", post(handle_verify))
        .route("/health", get(handle_health))
        .with_state(state)
}

/// POST /verify — the spend endpoint.
async fn handle_verify(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let bearer = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token);

    let request = RequestContext {
        method: "POST".into(),
        path: uri.path().into(),
        body: body.to_vec(),
    };

    match handle_spend(&state, bearer, &request) {
        SpendOutcome::Accepted {
            remaining,
            idempotent,
            window_used,
        } => (
            StatusCode::OK,
            Json(serde_json::json!({
                "ok": true,
                "remaining": remaining,
                "idempotent": idempotent,
                "windowUsed": window_used,
            })),
        ),
        SpendOutcome::Denied { window_used } => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(serde_json::json!({
                "error": ErrorKind::LimitExceeded.as_str(),
                "remaining": 0,
                "windowUsed": window_used,
            })),
        ),
        SpendOutcome::Rejected { kind } => {
            let status = match kind {
                ErrorKind::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::UNAUTHORIZED,
            };
            (
                status,
                Json(serde_json::json!({
                    "error": kind.as_str(),
                })),
            )
        }
    }
}

/// GET /health — liveness and mode.
async fn handle_health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "ok": true,
        "ts": chrono::Utc::now().timestamp_millis(),
        "build": env!("CARGO_PKG_VERSION"),
        "mode": state.mode(),
    }))
}
