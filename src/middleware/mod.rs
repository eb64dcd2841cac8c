mod auth;
mod error_handler;

pub use auth::{Action, Principal, auth_middleware, authorize};
pub use error_handler::log_errors;
