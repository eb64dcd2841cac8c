use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
};

use crate::{
    AppState,
    error::AppError,
    middleware::{Action, Principal, authorize},
    models::{SearchQuery, UserForm, UserProfile},
};

pub async fn get_all(State(state): State<AppState>) -> Result<Json<Vec<UserProfile>>, AppError> {
    Ok(Json(state.users.get_all().await?))
}

pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<UserProfile>, AppError> {
    Ok(Json(state.users.get_by_id(id).await?))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<UserProfile>, AppError> {
    Ok(Json(state.users.get_by_id(principal.id).await?))
}

pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<UserProfile>>, AppError> {
    if query.username.trim().is_empty() {
        return Err(AppError::Validation("username is required".to_string()));
    }
    Ok(Json(state.users.search_by_username(&query.username).await?))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<i32>,
    Json(form): Json<UserForm>,
) -> Result<Json<UserProfile>, AppError> {
    authorize(&principal, Action::ModifyUser(id))?;
    Ok(Json(state.users.update(id, &form).await?))
}

/// Anonymizes the caller's own account.
pub async fn anonymize_me(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<StatusCode, AppError> {
    state.users.anonymize(principal.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
