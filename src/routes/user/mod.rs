mod handler;

pub use handler::{anonymize_me, get_all, get_by_id, me, search, update};
