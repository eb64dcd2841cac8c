pub mod auth;
pub mod follow;
pub mod user;

pub use auth::{AuthResponse, LoginRequest, RefreshTokenRequest};
pub use follow::{FollowMessage, FollowStatus};
pub use user::{SearchQuery, UserForm, UserProfile};
