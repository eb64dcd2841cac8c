#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use serde_json::{Value, json};
use sinewave::{AppState, config::Config, router::create_router, store::MemoryStore};
use tower::ServiceExt;

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    /// Value of the `refreshToken` cookie set by this response, if any.
    pub fn refresh_cookie(&self) -> Option<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(|cookie| cookie.strip_prefix("refreshToken="))
            .map(|rest| rest.split(';').next().unwrap_or_default().to_string())
    }

    pub fn token(&self) -> String {
        self.body["token"].as_str().expect("token in body").to_string()
    }
}

pub fn test_config() -> Config {
    let mut config = Config::with_secret("integration-secret");
    config.bcrypt_cost = 4;
    config
}

pub fn spawn_app() -> TestApp {
    spawn_app_with(test_config())
}

pub fn spawn_app_with(config: Config) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(config, store.clone());
    TestApp {
        router: create_router(state),
        store,
    }
}

pub fn registration(username: &str, password: &str) -> Value {
    json!({
        "username": username,
        "firstname": "Test",
        "lastname": "User",
        "email": format!("{username}@example.com"),
        "password": password,
    })
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        bearer: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        self.send(builder.body(body).unwrap()).await
    }

    pub async fn post_json(&self, path: &str, body: Value) -> TestResponse {
        self.request(Method::POST, path, None, Some(body)).await
    }

    pub async fn get(&self, path: &str, bearer: &str) -> TestResponse {
        self.request(Method::GET, path, Some(bearer), None).await
    }

    /// POST with a `Cookie: refreshToken=…` header and no body.
    pub async fn post_with_cookie(&self, path: &str, refresh_token: Option<&str>) -> TestResponse {
        let mut builder = Request::builder().method(Method::POST).uri(path);
        if let Some(token) = refresh_token {
            builder = builder.header(header::COOKIE, format!("refreshToken={token}"));
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn register(&self, username: &str, password: &str) -> TestResponse {
        self.post_json("/api/auth/register", registration(username, password))
            .await
    }

    pub async fn login(&self, username: &str, password: &str) -> TestResponse {
        self.post_json(
            "/api/auth/login",
            json!({ "username": username, "password": password }),
        )
        .await
    }
}
