mod handler;
pub mod mobile;

pub use handler::{REFRESH_TOKEN_COOKIE, login, logout, refresh_token, register};
