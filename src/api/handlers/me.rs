use crate::api::middleware::AuthenticatedUser;
use crate::api::models::MeResponse;
use crate::api::AppState;
use axum::{extract::State, response::Json, Extension};

pub async fn me(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
) -> Json<MeResponse> {
    Json(MeResponse::new(user, &state.admin_role))
}
