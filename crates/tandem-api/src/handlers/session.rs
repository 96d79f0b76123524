use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Duration;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

fn default_ttl_hours() -> i64 {
    24
}

/// Actor identity pushed by the HRMS backend before the user starts chatting.
#[derive(Debug, Deserialize)]
pub struct SessionInitRequest {
    pub session_id: String,
    pub employee_id: i64,
    pub employee_name: String,
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: i64,
}

/// Initialize (or reinitialize) an agent session. Upsert: calling again with
/// the same session id replaces the stored actor identity.
pub async fn init_session(
    State(state): State<AppState>,
    Json(req): Json<SessionInitRequest>,
) -> ApiResult<Json<Value>> {
    if req.session_id.trim().is_empty() {
        return Err(ApiError::BadRequest("session_id is required".to_string()));
    }

    let record = state
        .sessions
        .create_or_update(
            &req.session_id,
            req.employee_id,
            &req.employee_name,
            Some(Duration::hours(req.ttl_hours)),
        )
        .await?;

    tracing::info!(
        session_id = %record.session_id,
        actor_id = record.actor_id,
        "session initialized"
    );

    Ok(Json(json!({
        "success": true,
        "message": "Session initialized",
        "session_id": record.session_id,
    })))
}

/// Session lookup, mainly for the HRMS backend to validate its own state.
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let record = state
        .sessions
        .get(&session_id)
        .await?
        .ok_or_else(|| ApiError::SessionNotFound(session_id.clone()))?;

    Ok(Json(json!({
        "session_id": record.session_id,
        "employee_id": record.actor_id,
        "employee_name": record.actor_name,
        "expires_at": record.expires_at,
    })))
}

/// Invalidate a session on logout.
pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let deleted = state.sessions.delete(&session_id).await?;
    if !deleted {
        return Err(ApiError::SessionNotFound(session_id));
    }

    tracing::info!(%session_id, "session deleted");
    Ok(Json(json!({
        "success": true,
        "message": "Session deleted",
    })))
}
