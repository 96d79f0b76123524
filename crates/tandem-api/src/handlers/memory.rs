use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

use crate::{error::ApiResult, state::AppState};

/// Delete all checkpoint data for a thread. Works whether or not the thread
/// still has a pending interrupt; deleting an unknown thread is a no-op.
pub async fn clear_memory(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let deleted = state.checkpoints.clear_thread(&thread_id).await?;
    tracing::info!(%thread_id, deleted, "cleared thread memory");

    Ok(Json(json!({
        "success": true,
        "thread_id": thread_id,
        "deleted_checkpoints": deleted,
    })))
}
