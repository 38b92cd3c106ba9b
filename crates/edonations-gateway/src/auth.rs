use axum::extract::{Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::warn;

use crate::state::SharedState;

/// Guard for admin routes: requires `Authorization: Bearer <admin_token>`.
/// Deployments without a token get a 404, so the admin surface does not
/// advertise itself.
pub async fn require_admin(
    State(state): State<SharedState>,
    req: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.config.admin_token.as_deref() else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let supplied = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match supplied {
        Some(token) if token == expected => next.run(req).await,
        _ => {
            warn!("rejected admin request without a valid token");
            (
                StatusCode::UNAUTHORIZED,
                axum::Json(json!({"error": "admin token required"})),
            )
                .into_response()
        }
    }
}

/// Reject requests whose Host header is not in `allowed_hosts`. An empty
/// list admits any host, matching a development setup.
pub async fn enforce_allowed_hosts(
    State(state): State<SharedState>,
    req: Request,
    next: Next,
) -> Response {
    if state.config.allowed_hosts.is_empty() {
        return next.run(req).await;
    }

    let host = req
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(|h| h.split(':').next().unwrap_or(h).to_string());

    match host {
        Some(h) if state.config.allowed_hosts.iter().any(|a| a == &h) => next.run(req).await,
        other => {
            warn!("rejected request for disallowed host {:?}", other);
            (
                StatusCode::BAD_REQUEST,
                axum::Json(json!({"error": "host not allowed"})),
            )
                .into_response()
        }
    }
}
