//! Register, login, refresh and logout, shared by the browser and mobile
//! transports. Only the way the refresh token travels differs between them.

use crate::AppState;
use crate::error::AppError;
use crate::models::{AuthResponse, LoginRequest, UserForm, UserProfile};
use crate::store::User;
use crate::utils::generate_token;

/// A freshly issued bearer token and refresh token for one user.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub refresh_token: String,
    pub user: UserProfile,
}

impl AuthSession {
    /// Response body for clients that keep the refresh token in a cookie.
    pub fn into_browser_response(self) -> AuthResponse {
        AuthResponse {
            token: self.token,
            refresh_token: None,
            user: self.user,
        }
    }

    pub fn into_mobile_response(self) -> AuthResponse {
        AuthResponse {
            token: self.token,
            refresh_token: Some(self.refresh_token),
            user: self.user,
        }
    }
}

pub async fn register(state: &AppState, form: &UserForm) -> Result<AuthSession, AppError> {
    let user = state.users.create(form).await?;
    issue_session(state, &user).await
}

pub async fn login(state: &AppState, login: &LoginRequest) -> Result<AuthSession, AppError> {
    let user = state.users.authenticate(login).await?;
    tracing::info!(user_id = user.id, "user logged in");
    issue_session(state, &user).await
}

/// Trades a live refresh token for a new bearer token and a rotated refresh token.
pub async fn refresh(state: &AppState, refresh_token: Option<&str>) -> Result<AuthSession, AppError> {
    let refresh_token = refresh_token
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Validation("Refresh token is missing".to_string()))?;

    let stored = state
        .refresh_tokens
        .find_by_token(refresh_token)
        .await?
        .ok_or(AppError::RefreshTokenNotFound)?;
    let stored = state.refresh_tokens.verify_expiration(stored).await?;

    let user = state
        .users
        .find_by_id(stored.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    if user.is_anonymized {
        return Err(AppError::Authentication("Account no longer exists".to_string()));
    }

    issue_session(state, &user).await
}

/// Revokes the given refresh token. Missing input is not an error.
pub async fn logout(state: &AppState, refresh_token: Option<&str>) -> Result<(), AppError> {
    let Some(refresh_token) = refresh_token.filter(|token| !token.is_empty()) else {
        return Ok(());
    };

    state
        .refresh_tokens
        .delete_refresh_token(refresh_token)
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "logout could not revoke refresh token");
            AppError::Validation("Refresh token could not be revoked".to_string())
        })
}

async fn issue_session(state: &AppState, user: &User) -> Result<AuthSession, AppError> {
    let token = generate_token(user, &state.config)?;
    let refresh_token = state
        .refresh_tokens
        .create_refresh_token(&user.username)
        .await?;

    Ok(AuthSession {
        token,
        refresh_token: refresh_token.token,
        user: state.users.to_profile(user),
    })
}
