//! Browser transport: the refresh token lives in an HttpOnly cookie and the
//! response body carries `refreshToken: null`.

use axum::{
    Json,
    extract::State,
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{LOCATION, SET_COOKIE},
    },
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;

use crate::{
    AppState,
    config::Config,
    error::AppError,
    models::{LoginRequest, UserForm},
    services::{AuthSession, auth},
};

pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

fn refresh_cookie(config: &Config, token: &str) -> Result<HeaderValue, AppError> {
    let mut cookie = format!(
        "{REFRESH_TOKEN_COOKIE}={token}; Path=/; Max-Age={}; HttpOnly; SameSite=Strict",
        config.refresh_cookie_max_age()
    );
    if config.cookie_secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).map_err(|e| AppError::Internal(e.to_string()))
}

fn clear_refresh_cookie(config: &Config) -> Result<HeaderValue, AppError> {
    let mut cookie =
        format!("{REFRESH_TOKEN_COOKIE}=; Path=/; Max-Age=0; HttpOnly; SameSite=Strict");
    if config.cookie_secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).map_err(|e| AppError::Internal(e.to_string()))
}

fn cookie_token(jar: &CookieJar) -> Option<String> {
    jar.get(REFRESH_TOKEN_COOKIE)
        .map(|cookie| cookie.value().to_string())
}

fn session_headers(config: &Config, session: &AuthSession) -> Result<HeaderMap, AppError> {
    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, refresh_cookie(config, &session.refresh_token)?);
    Ok(headers)
}

pub async fn register(
    State(state): State<AppState>,
    Json(form): Json<UserForm>,
) -> Result<impl IntoResponse, AppError> {
    let session = auth::register(&state, &form).await?;

    let mut headers = session_headers(&state.config, &session)?;
    let location = format!("{}/users/{}", state.config.api_base_uri, session.user.id);
    headers.insert(
        LOCATION,
        HeaderValue::from_str(&location).map_err(|e| AppError::Internal(e.to_string()))?,
    );

    Ok((
        StatusCode::CREATED,
        headers,
        Json(session.into_browser_response()),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = auth::login(&state, &req).await?;
    let headers = session_headers(&state.config, &session)?;
    Ok((StatusCode::OK, headers, Json(session.into_browser_response())))
}

pub async fn refresh_token(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let token = cookie_token(&jar);
    let session = auth::refresh(&state, token.as_deref()).await?;
    let headers = session_headers(&state.config, &session)?;
    Ok((StatusCode::OK, headers, Json(session.into_browser_response())))
}

/// The cookie is cleared even when the token could not be revoked.
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Response, AppError> {
    let token = cookie_token(&jar);
    let outcome = auth::logout(&state, token.as_deref()).await;

    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, clear_refresh_cookie(&state.config)?);
    Ok(match outcome {
        Ok(()) => (StatusCode::OK, headers).into_response(),
        Err(e) => (headers, e).into_response(),
    })
}
