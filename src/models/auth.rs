use serde::{Deserialize, Serialize};

use super::user::UserProfile;
use crate::error::AppError;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.username.trim().is_empty() || self.password.is_empty() {
            return Err(AppError::Validation(
                "username and password are required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Body used by the mobile refresh and logout endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RefreshTokenRequest {
    #[serde(default, rename = "refreshToken")]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    /// `None` for browser clients, which receive it as a cookie.
    pub refresh_token: Option<String>,
    pub user: UserProfile,
}
