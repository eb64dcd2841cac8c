mod handler;

pub use handler::{
    follow, followers, following, is_following, my_followers, my_following, unfollow,
};
