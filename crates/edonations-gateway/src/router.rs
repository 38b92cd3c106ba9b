use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get};
use axum::{Json, Router, middleware};
use edonations_common::{Error, Result, SponsorId};
use edonations_db::NewSponsor;
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth;
use crate::state::SharedState;

const DEFAULT_LIST_LIMIT: usize = 100;

/// Top-level segments the admin mount must not shadow.
const RESERVED_SEGMENTS: &[&str] = &["api", "health"];

pub fn build_router(state: SharedState) -> Result<Router> {
    let admin = Router::new()
        .route("/sponsors/{id}", delete(delete_sponsor))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_admin,
        ));

    // Nesting at "/" or over an existing mount makes axum panic; reject the
    // value as configuration instead.
    let segment = state.config.admin_url.trim_matches('/');
    if segment.is_empty() {
        return Err(Error::Config(
            "admin_url must not be empty".to_string(),
        ));
    }
    if RESERVED_SEGMENTS.contains(&segment) {
        return Err(Error::Config(format!(
            "admin_url {segment:?} collides with a reserved route"
        )));
    }
    let admin_mount = format!("/{segment}");

    let router = Router::new()
        .route("/health", get(health))
        .route("/api/organizations", get(list_organizations))
        .route("/api/sponsors", get(list_sponsors).post(create_sponsor))
        .route("/api/sponsors/{id}", get(get_sponsor).put(update_sponsor))
        .nest(&admin_mount, admin)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::enforce_allowed_hosts,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);
    Ok(router)
}

async fn health() -> &'static str {
    "ok"
}

/// (code, label) pairs for populating the organization single-select.
async fn list_organizations(State(state): State<SharedState>) -> Response {
    Json(state.sponsors.organizations().entries()).into_response()
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    limit: Option<usize>,
}

async fn list_sponsors(State(state): State<SharedState>, Query(query): Query<ListQuery>) -> Response {
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    match state.sponsors.list(limit) {
        Ok(sponsors) => Json(sponsors).into_response(),
        Err(e) => error_response(e),
    }
}

async fn create_sponsor(
    State(state): State<SharedState>,
    Json(payload): Json<NewSponsor>,
) -> Response {
    match state.sponsors.create(&payload) {
        Ok(sponsor) => (StatusCode::CREATED, Json(sponsor)).into_response(),
        Err(e) => error_response(e),
    }
}

async fn get_sponsor(State(state): State<SharedState>, Path(id): Path<String>) -> Response {
    let id = SponsorId::from_string(id);
    match state.sponsors.get(&id) {
        Ok(Some(sponsor)) => Json(sponsor).into_response(),
        Ok(None) => error_response(Error::NotFound(format!("sponsor {id}"))),
        Err(e) => error_response(e),
    }
}

async fn update_sponsor(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(payload): Json<NewSponsor>,
) -> Response {
    let id = SponsorId::from_string(id);
    match state.sponsors.update(&id, &payload) {
        Ok(sponsor) => Json(sponsor).into_response(),
        Err(e) => error_response(e),
    }
}

async fn delete_sponsor(State(state): State<SharedState>, Path(id): Path<String>) -> Response {
    let id = SponsorId::from_string(id);
    match state.sponsors.delete(&id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

/// Map domain errors onto HTTP responses. Validation failures carry the
/// offending value and the permitted set so forms can render a field error.
fn error_response(err: Error) -> Response {
    match &err {
        Error::Validation {
            field,
            value,
            allowed,
        } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "error": err.to_string(),
                "field": field,
                "value": value,
                "allowed": allowed,
            })),
        )
            .into_response(),
        Error::NotFound(_) => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": err.to_string()})),
        )
            .into_response(),
        Error::Unauthorized(_) => (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": err.to_string()})),
        )
            .into_response(),
        _ => {
            tracing::error!("request failed: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "internal error"})),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;
    use edonations_config::AppConfig;
    use edonations_db::{OrganizationSet, SponsorStore, schema};
    use std::sync::Arc;

    fn state_with_admin_url(admin_url: &str) -> SharedState {
        let mut config = AppConfig::default();
        config.admin_url = admin_url.to_string();
        let store =
            SponsorStore::in_memory(&schema::plan().unwrap(), OrganizationSet::current()).unwrap();
        Arc::new(AppState::new(config, Arc::new(store)))
    }

    #[test]
    fn default_admin_url_builds_a_router() {
        assert!(build_router(state_with_admin_url("admin")).is_ok());
    }

    #[test]
    fn empty_admin_url_is_a_config_error() {
        let err = build_router(state_with_admin_url("")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("admin_url"));
    }

    #[test]
    fn slash_only_admin_url_is_a_config_error() {
        let err = build_router(state_with_admin_url("/")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn admin_url_shadowing_api_routes_is_rejected() {
        let err = build_router(state_with_admin_url("api")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("api"));

        let err = build_router(state_with_admin_url("/health/")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
