use std::sync::Arc;

use config::Config;
use services::{FollowService, RefreshTokenService, UserService};
use store::{FollowStore, RefreshTokenStore, UserStore};
use utils::FieldCipher;

pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod router;
pub mod routes;
pub mod services;
pub mod store;
pub mod utils;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub users: UserService,
    pub refresh_tokens: RefreshTokenService,
    pub follows: FollowService,
}

impl AppState {
    /// Wires the services over one backend that stores users, refresh tokens and follows.
    pub fn new<S>(config: Config, store: Arc<S>) -> Self
    where
        S: UserStore + RefreshTokenStore + FollowStore + 'static,
    {
        let user_store: Arc<dyn UserStore> = store.clone();
        let token_store: Arc<dyn RefreshTokenStore> = store.clone();
        let follow_store: Arc<dyn FollowStore> = store;

        let ttl = config.refresh_token_ttl();
        let refresh_tokens = RefreshTokenService::new(token_store, user_store.clone(), ttl);
        let users = UserService::new(
            user_store,
            refresh_tokens.clone(),
            FieldCipher::default(),
            config.bcrypt_cost,
        );

        let follows = FollowService::new(follow_store, users.clone());

        Self {
            config,
            users,
            refresh_tokens,
            follows,
        }
    }
}
