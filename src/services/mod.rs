pub mod auth;
pub mod follow;
pub mod refresh_token;
pub mod user;

pub use auth::AuthSession;
pub use follow::FollowService;
pub use refresh_token::RefreshTokenService;
pub use user::UserService;
