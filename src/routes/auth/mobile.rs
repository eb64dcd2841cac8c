//! Mobile transport: both tokens travel in JSON bodies, no cookies.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use serde_json::json;

use crate::{
    AppState,
    error::AppError,
    models::{LoginRequest, RefreshTokenRequest, UserForm},
    services::auth,
};

pub async fn test_connection() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "message": "Mobile API is working",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

pub async fn register(
    State(state): State<AppState>,
    Json(form): Json<UserForm>,
) -> Result<impl IntoResponse, AppError> {
    let session = auth::register(&state, &form).await?;
    let location = format!("{}/users/{}", state.config.api_base_uri, session.user.id);
    Ok((
        StatusCode::CREATED,
        [(axum::http::header::LOCATION, location)],
        Json(session.into_mobile_response()),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = auth::login(&state, &req).await?;
    Ok(Json(session.into_mobile_response()))
}

pub async fn refresh_token(
    State(state): State<AppState>,
    Json(req): Json<RefreshTokenRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = auth::refresh(&state, req.refresh_token.as_deref()).await?;
    Ok(Json(session.into_mobile_response()))
}

pub async fn logout(
    State(state): State<AppState>,
    Json(req): Json<RefreshTokenRequest>,
) -> Result<StatusCode, AppError> {
    auth::logout(&state, req.refresh_token.as_deref()).await?;
    Ok(StatusCode::OK)
}
