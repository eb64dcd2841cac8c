use axum::{
    Router,
    http::{
        HeaderValue, Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{delete, get, post},
};
use tower_http::cors::CorsLayer;

use crate::{
    AppState,
    config::Config,
    middleware::{auth_middleware, log_errors},
    routes,
};

// Browser auth routes: refresh token in a cookie
fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(routes::auth::register))
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/refresh", post(routes::auth::refresh_token))
        .route("/auth/logout", post(routes::auth::logout))
}

// Mobile auth routes: refresh token in the JSON body
fn mobile_auth_routes() -> Router<AppState> {
    Router::new()
        .route("/mobile/auth/test", get(routes::auth::mobile::test_connection))
        .route("/mobile/auth/register", post(routes::auth::mobile::register))
        .route("/mobile/auth/login", post(routes::auth::mobile::login))
        .route("/mobile/auth/refresh", post(routes::auth::mobile::refresh_token))
        .route("/mobile/auth/logout", post(routes::auth::mobile::logout))
}

fn protected_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/users", get(routes::user::get_all))
        .route("/users/me", get(routes::user::me))
        .route("/users/me/anonymize", post(routes::user::anonymize_me))
        .route("/users/search", get(routes::user::search))
        .route(
            "/users/{id}",
            get(routes::user::get_by_id).put(routes::user::update),
        )
        .route("/users/friends/follow/{id}", post(routes::follow::follow))
        .route("/users/friends/unfollow/{id}", delete(routes::follow::unfollow))
        .route("/users/friends/following", get(routes::follow::my_following))
        .route("/users/friends/followers", get(routes::follow::my_followers))
        .route("/users/friends/{id}/following", get(routes::follow::following))
        .route("/users/friends/{id}/followers", get(routes::follow::followers))
        .route(
            "/users/friends/is-following/{id}",
            get(routes::follow::is_following),
        )
        .route("/admin/users", get(routes::admin::list_users))
        .route("/admin/users/{id}", delete(routes::admin::delete_user))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
}

/// The browser client sends credentials, so its origin must be named explicitly.
fn browser_cors(config: &Config) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true);

    match HeaderValue::from_str(&config.cors_origin) {
        Ok(origin) => cors.allow_origin(origin),
        Err(_) => {
            tracing::warn!(origin = %config.cors_origin, "invalid CORS origin, cross-origin requests disabled");
            cors
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .merge(auth_routes())
        .merge(protected_routes(&state))
        .layer(browser_cors(&state.config))
        .merge(mobile_auth_routes().layer(CorsLayer::permissive()));

    Router::new()
        .nest(&state.config.api_base_uri, api)
        .layer(axum::middleware::from_fn(log_errors))
        .with_state(state)
}
