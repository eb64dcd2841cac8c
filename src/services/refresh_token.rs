//! Refresh token lifecycle: one live token per user, rotated on every
//! login, registration and refresh.

use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::store::{RefreshToken, RefreshTokenStore, UserStore};

#[derive(Clone)]
pub struct RefreshTokenService {
    tokens: Arc<dyn RefreshTokenStore>,
    users: Arc<dyn UserStore>,
    ttl: Duration,
}

impl RefreshTokenService {
    pub fn new(tokens: Arc<dyn RefreshTokenStore>, users: Arc<dyn UserStore>, ttl: Duration) -> Self {
        Self { tokens, users, ttl }
    }

    /// Issues a fresh token for `username`, replacing whatever token the user held.
    pub async fn create_refresh_token(&self, username: &str) -> Result<RefreshToken, AppError> {
        let user = self
            .users
            .find_by_username(username)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User not found: {username}")))?;

        let token = RefreshToken {
            token: Uuid::new_v4().to_string(),
            user_id: user.id,
            username: user.username,
            expiry_date: Utc::now() + self.ttl,
        };
        self.tokens.replace_for_user(&token).await?;

        tracing::debug!(username = %token.username, "refresh token issued");
        Ok(token)
    }

    pub async fn find_by_token(&self, token: &str) -> Result<Option<RefreshToken>, AppError> {
        Ok(self.tokens.find_by_token(token).await?)
    }

    /// Returns the token unchanged while it is live. An expired token is deleted.
    pub async fn verify_expiration(&self, token: RefreshToken) -> Result<RefreshToken, AppError> {
        if token.expiry_date < Utc::now() {
            self.tokens.delete_by_token(&token.token).await?;
            tracing::info!(username = %token.username, "expired refresh token removed");
            return Err(AppError::RefreshTokenExpired);
        }
        Ok(token)
    }

    pub async fn delete_refresh_token(&self, token: &str) -> Result<(), AppError> {
        if self.tokens.delete_by_token(token).await? {
            Ok(())
        } else {
            Err(AppError::RefreshTokenNotFound)
        }
    }

    /// No-op when the user holds no token.
    pub async fn delete_by_username(&self, username: &str) -> Result<(), AppError> {
        let removed = self.tokens.delete_by_username(username).await?;
        tracing::debug!(username, removed, "refresh tokens revoked");
        Ok(())
    }
}
