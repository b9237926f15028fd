//! HTTP Front-end
//!
//! REST-style routes over the operation engine. Every route accepts an
//! optional `username` query parameter for tenant namespacing; key lists
//! come back with the tenant prefix stripped. Errors map onto status codes
//! with a JSON body of `{"error": ..., "code": ...}`.
//!
//! `HEAD /kv/{key}` is served by the `GET` handler (axum answers HEAD
//! through GET routes), so an expiry-aware existence probe is a HEAD
//! request that checks for 200 vs 404.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::error;

use crate::engine::KvEngine;
use crate::error::StoreError;
use crate::tenant;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<KvEngine>,
}

/// Error surface of the HTTP layer.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound,
    Unavailable(String),
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::InvalidKey(_) | StoreError::ValueTooLarge { .. } => {
                ApiError::BadRequest(e.to_string())
            }
            StoreError::BackendUnavailable(_) => ApiError::Unavailable(e.to_string()),
            StoreError::Persistence(_) | StoreError::BackupFailed(_) => {
                ApiError::Internal(e.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "key not found".to_string()),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::Internal(msg) => {
                error!(error = %msg, "internal error serving request");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };
        let body = Json(json!({"error": message, "code": status.as_u16()}));
        (status, body).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct TenantQuery {
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KeysQuery {
    pattern: Option<String>,
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SetBody {
    value: Value,
    ttl: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ExpireBody {
    seconds: u64,
}

#[derive(Debug, Deserialize)]
struct AppendBody {
    string: String,
}

/// Builds the full route table over an engine.
pub fn build_router(engine: Arc<KvEngine>) -> Router {
    let state = AppState { engine };

    Router::new()
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/backup", post(backup))
        .route("/keys", get(list_keys))
        .route("/kv", get(dump).delete(clear))
        .route("/kv/{key}", get(get_key).post(set_key).delete(delete_key))
        .route("/kv/{key}/expire", post(expire_key))
        .route("/kv/{key}/persist", post(persist_key))
        .route("/kv/{key}/ttl", get(ttl_key))
        .route("/kv/{key}/incr", post(incr_key))
        .route("/kv/{key}/decr", post(decr_key))
        .route("/kv/{key}/append", post(append_key))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

async fn stats(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let stats = state.engine.stats().await?;
    let stats = serde_json::to_value(&stats).map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(stats))
}

async fn backup(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let path = state.engine.backup().await?;
    Ok(Json(json!({"path": path.display().to_string()})))
}

async fn list_keys(
    State(state): State<AppState>,
    Query(q): Query<KeysQuery>,
) -> Result<Json<Value>, ApiError> {
    let username = q.username.as_deref();
    let pattern = tenant::qualify_pattern(username, q.pattern.as_deref());
    let keys = state.engine.keys(pattern.as_deref()).await?;
    let keys = tenant::strip_prefix(username, keys);
    Ok(Json(json!({"count": keys.len(), "keys": keys})))
}

/// Full dump of live keys and values, tenant-scoped when a username is given.
async fn dump(
    State(state): State<AppState>,
    Query(q): Query<TenantQuery>,
) -> Result<Json<Value>, ApiError> {
    let username = q.username.as_deref();
    let pattern = tenant::qualify_pattern(username, None);
    let keys = state.engine.keys(pattern.as_deref()).await?;

    let mut out = Map::with_capacity(keys.len());
    for key in keys {
        if let Some(value) = state.engine.get(&key).await? {
            let display = tenant::strip_prefix(username, vec![key]).remove(0);
            out.insert(display, value);
        }
    }
    Ok(Json(Value::Object(out)))
}

async fn clear(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    state.engine.clear().await?;
    Ok(Json(json!({"cleared": true})))
}

async fn get_key(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(q): Query<TenantQuery>,
) -> Result<Json<Value>, ApiError> {
    let qualified = tenant::qualify(q.username.as_deref(), &key);
    match state.engine.get(&qualified).await? {
        Some(value) => Ok(Json(json!({"key": key, "value": value}))),
        None => Err(ApiError::NotFound),
    }
}

async fn set_key(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(q): Query<TenantQuery>,
    Json(body): Json<SetBody>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let qualified = tenant::qualify(q.username.as_deref(), &key);
    state.engine.set(&qualified, body.value, body.ttl).await?;
    Ok((StatusCode::CREATED, Json(json!({"key": key}))))
}

async fn delete_key(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(q): Query<TenantQuery>,
) -> Result<Json<Value>, ApiError> {
    let qualified = tenant::qualify(q.username.as_deref(), &key);
    let deleted = state.engine.delete(&qualified).await?;
    Ok(Json(json!({"key": key, "deleted": deleted})))
}

async fn expire_key(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(q): Query<TenantQuery>,
    Json(body): Json<ExpireBody>,
) -> Result<Json<Value>, ApiError> {
    let qualified = tenant::qualify(q.username.as_deref(), &key);
    let updated = state.engine.expire(&qualified, body.seconds).await?;
    if !updated {
        return Err(ApiError::NotFound);
    }
    Ok(Json(json!({"key": key, "updated": true})))
}

async fn persist_key(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(q): Query<TenantQuery>,
) -> Result<Json<Value>, ApiError> {
    let qualified = tenant::qualify(q.username.as_deref(), &key);
    let updated = state.engine.persist(&qualified).await?;
    if !updated {
        return Err(ApiError::NotFound);
    }
    Ok(Json(json!({"key": key, "updated": true})))
}

async fn ttl_key(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(q): Query<TenantQuery>,
) -> Result<Json<Value>, ApiError> {
    let qualified = tenant::qualify(q.username.as_deref(), &key);
    let ttl = state.engine.ttl(&qualified).await?;
    Ok(Json(json!({"key": key, "ttl": ttl})))
}

async fn incr_key(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(q): Query<TenantQuery>,
) -> Result<Json<Value>, ApiError> {
    let qualified = tenant::qualify(q.username.as_deref(), &key);
    let value = state.engine.incr(&qualified).await?;
    Ok(Json(json!({"key": key, "value": value})))
}

async fn decr_key(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(q): Query<TenantQuery>,
) -> Result<Json<Value>, ApiError> {
    let qualified = tenant::qualify(q.username.as_deref(), &key);
    let value = state.engine.decr(&qualified).await?;
    Ok(Json(json!({"key": key, "value": value})))
}

async fn append_key(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(q): Query<TenantQuery>,
    Json(body): Json<AppendBody>,
) -> Result<Json<Value>, ApiError> {
    let qualified = tenant::qualify(q.username.as_deref(), &key);
    let length = state.engine.append(&qualified, &body.string).await?;
    Ok(Json(json!({"key": key, "length": length})))
}
