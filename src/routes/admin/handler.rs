use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
};

use crate::{
    AppState,
    error::AppError,
    middleware::{Action, Principal, authorize},
    models::UserProfile,
};

pub async fn list_users(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Vec<UserProfile>>, AppError> {
    authorize(&principal, Action::AdminOnly)?;
    Ok(Json(state.users.get_all().await?))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    authorize(&principal, Action::DeleteUser(id))?;
    state.users.delete(id).await?;
    tracing::info!(admin = %principal.username, user_id = id, "user removed by admin");
    Ok(StatusCode::NO_CONTENT)
}
