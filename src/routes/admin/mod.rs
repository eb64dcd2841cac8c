mod handler;

pub use handler::{delete_user, list_users};
