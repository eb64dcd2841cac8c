//! Persistence seams for users, refresh tokens and the follow graph.
//!
//! All traits are object safe and shared through `AppState` as
//! `Arc<dyn …>`. `postgres::PgStore` is the production backend,
//! `memory::MemoryStore` keeps identical semantics in process.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
        }
    }

    /// Unknown values fall back to the least privileged role.
    pub fn from_db(value: &str) -> Self {
        match value {
            "ADMIN" => Role::Admin,
            _ => Role::User,
        }
    }
}

/// A persisted user. `firstname`, `lastname` and `email` hold ciphertext.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub password_hash: String,
    pub password_salt: String,
    pub profilepicture: Option<String>,
    pub role: Role,
    pub is_anonymized: bool,
    pub anonymized_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub password_hash: String,
    pub password_salt: String,
    pub profilepicture: Option<String>,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct ProfileUpdate {
    pub username: String,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub password_hash: String,
    pub password_salt: String,
    pub profilepicture: Option<String>,
}

/// Replacement values written by the anonymization flow.
#[derive(Debug, Clone)]
pub struct Anonymization {
    pub username: String,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub password_hash: String,
    pub password_salt: String,
    pub anonymized_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshToken {
    pub token: String,
    pub user_id: i32,
    pub username: String,
    pub expiry_date: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("username '{0}' already exists")]
    UniqueViolation(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert(&self, user: NewUser) -> Result<User, StoreError>;
    async fn find_by_id(&self, id: i32) -> Result<Option<User>, StoreError>;
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
    async fn exists_by_username(&self, username: &str) -> Result<bool, StoreError>;
    /// Users that are not anonymized, ordered by id.
    async fn list_active(&self) -> Result<Vec<User>, StoreError>;
    /// Case-insensitive substring match on username, anonymized users excluded.
    async fn search_active(&self, fragment: &str) -> Result<Vec<User>, StoreError>;
    async fn update_profile(&self, id: i32, update: &ProfileUpdate) -> Result<Option<User>, StoreError>;
    /// Applies all fields at once. `None` when the row is missing or already anonymized.
    async fn anonymize(&self, id: i32, fields: &Anonymization) -> Result<Option<User>, StoreError>;
    /// Also removes the user's refresh tokens. Returns whether a row was deleted.
    async fn delete(&self, id: i32) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Deletes any token held by `token.username` and stores `token`, atomically.
    async fn replace_for_user(&self, token: &RefreshToken) -> Result<(), StoreError>;
    async fn find_by_token(&self, token: &str) -> Result<Option<RefreshToken>, StoreError>;
    async fn delete_by_token(&self, token: &str) -> Result<bool, StoreError>;
    async fn delete_by_username(&self, username: &str) -> Result<u64, StoreError>;
}

/// Directed follow edges between users. Rows go with either user on delete.
#[async_trait]
pub trait FollowStore: Send + Sync {
    /// `false` when the edge already exists.
    async fn follow(&self, follower_id: i32, followee_id: i32) -> Result<bool, StoreError>;
    /// `false` when there was no edge to remove.
    async fn unfollow(&self, follower_id: i32, followee_id: i32) -> Result<bool, StoreError>;
    async fn is_following(&self, follower_id: i32, followee_id: i32) -> Result<bool, StoreError>;
    /// Users followed by `user_id`, anonymized users excluded, ordered by id.
    async fn following(&self, user_id: i32) -> Result<Vec<User>, StoreError>;
    /// Users following `user_id`, anonymized users excluded, ordered by id.
    async fn followers(&self, user_id: i32) -> Result<Vec<User>, StoreError>;
}
