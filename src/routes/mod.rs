pub mod admin;
pub mod auth;
pub mod follow;
pub mod user;
