use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use shard_router::ShardCoordinator;

use crate::error::ApiError;

type AppState = Arc<ShardCoordinator>;

pub(crate) fn router(coordinator: AppState) -> Router {
    Router::new()
        .route("/{tenant}/challenges", post(issue_challenge))
        .route("/{tenant}/challenges/{id}/consume", post(consume_challenge))
        .route("/{tenant}/codes", post(issue_code))
        .route("/{tenant}/token", post(token))
        .route("/{tenant}/refresh/revoke", post(revoke_refresh))
        .route("/{tenant}/login-failures", post(record_failure))
        .route(
            "/{tenant}/login-failures/{identifier}",
            get(check_login).delete(clear_failures),
        )
        .route("/{tenant}/sessions", post(create_session))
        .route(
            "/{tenant}/sessions/{id}",
            get(get_session).delete(delete_session),
        )
        .route(
            "/{tenant}/entities/{*key}",
            get(get_entity).put(put_entity).delete(delete_entity),
        )
        .with_state(coordinator)
}

#[derive(Deserialize)]
struct IssueRequest {
    shard_key: String,
    #[serde(default)]
    payload: Value,
}

async fn issue_challenge(
    State(coordinator): State<AppState>,
    Path(tenant): Path<String>,
    Json(request): Json<IssueRequest>,
) -> Result<Response, ApiError> {
    let issued = coordinator
        .issue_challenge(&tenant, &request.shard_key, &request.payload.to_string())
        .await?;
    Ok((StatusCode::CREATED, Json(issued)).into_response())
}

/// Used, expired and unknown challenges all get the same `invalid_grant` answer.
async fn consume_challenge(
    State(coordinator): State<AppState>,
    Path((tenant, id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let payload = coordinator.verify_challenge(&tenant, &id).await?;
    Ok(Json(json!({ "payload": as_json(payload) })))
}

#[derive(Deserialize)]
struct CodeRequest {
    client_id: String,
    #[serde(default)]
    payload: Value,
}

async fn issue_code(
    State(coordinator): State<AppState>,
    Path(tenant): Path<String>,
    Json(request): Json<CodeRequest>,
) -> Result<Response, ApiError> {
    let issued = coordinator
        .issue_authorization_code(&tenant, &request.client_id, &request.payload.to_string())
        .await?;
    Ok((StatusCode::CREATED, Json(issued)).into_response())
}

#[derive(Deserialize)]
#[serde(tag = "grant_type", rename_all = "snake_case")]
enum TokenRequest {
    AuthorizationCode { code: String, subject: String },
    RefreshToken { refresh_token: String },
}

/// Minimal token endpoint: redeems a code into a refresh-token family or
/// rotates a refresh token.
async fn token(
    State(coordinator): State<AppState>,
    Path(tenant): Path<String>,
    Json(request): Json<TokenRequest>,
) -> Result<Json<Value>, ApiError> {
    let refresh_token = match request {
        TokenRequest::AuthorizationCode { code, subject } => {
            coordinator.redeem_authorization_code(&tenant, &code).await?;
            coordinator.start_refresh_family(&tenant, &subject).await?
        }
        TokenRequest::RefreshToken { refresh_token } => {
            coordinator
                .rotate_refresh_token(&tenant, &refresh_token)
                .await?
        }
    };
    Ok(Json(json!({ "refresh_token": refresh_token })))
}

#[derive(Deserialize)]
struct RevokeRequest {
    refresh_token: String,
}

async fn revoke_refresh(
    State(coordinator): State<AppState>,
    Path(tenant): Path<String>,
    Json(request): Json<RevokeRequest>,
) -> Result<StatusCode, ApiError> {
    coordinator
        .revoke_refresh_family(&tenant, &request.refresh_token)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct FailureRequest {
    identifier: String,
}

async fn record_failure(
    State(coordinator): State<AppState>,
    Path(tenant): Path<String>,
    Json(request): Json<FailureRequest>,
) -> Result<Response, ApiError> {
    let status = coordinator
        .record_login_failure(&tenant, &request.identifier)
        .await?;
    Ok(Json(status).into_response())
}

async fn check_login(
    State(coordinator): State<AppState>,
    Path((tenant, identifier)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let status = coordinator.check_login_allowed(&tenant, &identifier).await?;
    Ok(Json(status).into_response())
}

async fn clear_failures(
    State(coordinator): State<AppState>,
    Path((tenant, identifier)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    coordinator.clear_login_failures(&tenant, &identifier).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct SessionRequest {
    user_id: String,
    #[serde(default)]
    payload: Value,
}

async fn create_session(
    State(coordinator): State<AppState>,
    Path(tenant): Path<String>,
    Json(request): Json<SessionRequest>,
) -> Result<Response, ApiError> {
    let session_id = coordinator
        .put_session(&tenant, &request.user_id, &request.payload.to_string())
        .await?;
    Ok((StatusCode::CREATED, Json(json!({ "session_id": session_id }))).into_response())
}

async fn get_session(
    State(coordinator): State<AppState>,
    Path((tenant, id)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    Ok(json_or_404(coordinator.get_session(&tenant, &id).await?))
}

async fn delete_session(
    State(coordinator): State<AppState>,
    Path((tenant, id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    Ok(deleted_status(coordinator.delete_session(&tenant, &id).await?))
}

#[derive(Deserialize)]
struct EntityRequest {
    value: Value,
    ttl_secs: Option<u64>,
}

async fn get_entity(
    State(coordinator): State<AppState>,
    Path((tenant, key)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    Ok(json_or_404(coordinator.get_entity(&tenant, &key).await?))
}

async fn put_entity(
    State(coordinator): State<AppState>,
    Path((tenant, key)): Path<(String, String)>,
    Json(request): Json<EntityRequest>,
) -> Result<StatusCode, ApiError> {
    coordinator
        .put_entity(
            &tenant,
            &key,
            &request.value.to_string(),
            request.ttl_secs.map(Duration::from_secs),
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_entity(
    State(coordinator): State<AppState>,
    Path((tenant, key)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    Ok(deleted_status(coordinator.delete_entity(&tenant, &key).await?))
}

fn json_or_404(stored: Option<String>) -> Response {
    match stored {
        Some(raw) => Json(as_json(raw)).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Stored payloads are usually JSON; anything else is returned as a string.
fn as_json(raw: String) -> Value {
    serde_json::from_str(&raw).unwrap_or(Value::String(raw))
}

fn deleted_status(found: bool) -> StatusCode {
    if found {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}
