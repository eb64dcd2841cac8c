use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::store::Role;

/// Registration and profile update payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserForm {
    #[serde(default)]
    pub username: String,
    #[serde(default, alias = "firstName")]
    pub firstname: String,
    #[serde(default, alias = "lastName")]
    pub lastname: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, alias = "profilePicture")]
    pub profilepicture: Option<String>,
}

impl UserForm {
    pub fn validate(&self) -> Result<(), AppError> {
        let required = [
            ("username", &self.username),
            ("firstname", &self.firstname),
            ("lastname", &self.lastname),
            ("email", &self.email),
            ("password", &self.password),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(AppError::Validation(format!("{field} is required")));
            }
        }
        if !self.email.contains('@') {
            return Err(AppError::Validation("email is not valid".to_string()));
        }
        Ok(())
    }
}

/// What other clients may see of a user. Personal fields are decrypted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub id: i32,
    pub username: String,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub email: Option<String>,
    pub profilepicture: Option<String>,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub username: String,
}
