use crate::api::models::UserListResponse;
use crate::api::AppState;
use crate::auth::{AuthError, PageParams, UserRecord};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde_json::Value;
use tracing::{info, warn};

fn status_for(err: AuthError) -> StatusCode {
    if let AuthError::Provider(ref msg) = err {
        warn!("Identity provider error: {}", msg);
    }
    err.status_code()
}

pub async fn list_users(
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
) -> Result<Json<UserListResponse>, StatusCode> {
    let users = state.identity.list_users(page).await.map_err(status_for)?;
    Ok(Json(UserListResponse {
        users,
        limit: page.limit(),
        offset: page.offset(),
    }))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UserRecord>, StatusCode> {
    state
        .identity
        .get_user(&id)
        .await
        .map(Json)
        .map_err(status_for)
}

pub async fn update_user_metadata(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(metadata): Json<Value>,
) -> Result<Json<UserRecord>, StatusCode> {
    if !metadata.is_object() {
        return Err(StatusCode::BAD_REQUEST);
    }
    let user = state
        .identity
        .update_user_metadata(&id, metadata)
        .await
        .map_err(status_for)?;
    info!(user = %user.id, role = %user.role, "user metadata updated");
    Ok(Json(user))
}
