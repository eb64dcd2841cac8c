use std::env;

use chrono::Duration;

const DEFAULT_JWT_EXPIRATION_HOURS: u64 = 24;
const DEFAULT_REFRESH_EXPIRATION_MS: u64 = 604_800_000;
/// Longest accepted lifetime for either token. Larger values fall back to the default.
const MAX_LIFETIME_SECS: u64 = 10 * 365 * 24 * 3600;

fn within_limit(secs: u64) -> bool {
    secs <= MAX_LIFETIME_SECS
}

/// `JWT_EXPIRATION` in hours, with an optional `h` suffix, as seconds.
fn parse_jwt_expiration(value: &str) -> u64 {
    value
        .trim_end_matches('h')
        .parse::<u64>()
        .ok()
        .and_then(|hours| hours.checked_mul(3600))
        .filter(|secs| within_limit(*secs))
        .unwrap_or(DEFAULT_JWT_EXPIRATION_HOURS * 3600)
}

fn parse_refresh_expiration(value: &str) -> u64 {
    value
        .parse::<u64>()
        .ok()
        .filter(|ms| within_limit(ms / 1000))
        .unwrap_or(DEFAULT_REFRESH_EXPIRATION_MS)
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    /// Postgres connection string. Without it the server runs on the in-memory store.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub jwt_expiration_secs: u64,
    pub refresh_token_expiration_ms: u64,
    pub bcrypt_cost: u32,
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
    pub cors_origin: String,
    pub cookie_secure: bool,
}

impl Config {
    /// Defaults for everything except the signing secret.
    pub fn with_secret(jwt_secret: impl Into<String>) -> Self {
        Config {
            database_url: None,
            jwt_secret: jwt_secret.into(),
            jwt_expiration_secs: DEFAULT_JWT_EXPIRATION_HOURS * 3600,
            refresh_token_expiration_ms: DEFAULT_REFRESH_EXPIRATION_MS,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            server_host: "0.0.0.0".to_string(),
            server_port: 8080,
            api_base_uri: "/api".to_string(),
            cors_origin: "http://localhost:3000".to_string(),
            cookie_secure: false,
        }
    }

    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();

        let mut config = Config::with_secret(env::var("JWT_SECRET")?);
        config.database_url = env::var("DATABASE_URL").ok().filter(|url| !url.is_empty());

        if let Ok(hours) = env::var("JWT_EXPIRATION") {
            config.jwt_expiration_secs = parse_jwt_expiration(&hours);
        }
        if let Ok(ms) = env::var("JWT_REFRESH_EXPIRATION") {
            config.refresh_token_expiration_ms = parse_refresh_expiration(&ms);
        }
        if let Ok(cost) = env::var("BCRYPT_COST") {
            config.bcrypt_cost = cost.parse().unwrap_or(bcrypt::DEFAULT_COST);
        }
        if let Ok(host) = env::var("SERVER_HOST") {
            config.server_host = host;
        }
        if let Ok(port) = env::var("SERVER_PORT") {
            config.server_port = port.parse().unwrap_or(8080);
        }
        if let Ok(base) = env::var("API_BASE_URI") {
            config.api_base_uri = base;
        }
        if let Ok(origin) = env::var("CORS_ORIGIN") {
            config.cors_origin = origin;
        }
        if let Ok(secure) = env::var("COOKIE_SECURE") {
            config.cookie_secure = secure.eq_ignore_ascii_case("true") || secure == "1";
        }

        Ok(config)
    }

    /// Bearer token lifetime. Out-of-range values yield the default.
    pub fn jwt_ttl(&self) -> Duration {
        let secs = if within_limit(self.jwt_expiration_secs) {
            self.jwt_expiration_secs
        } else {
            DEFAULT_JWT_EXPIRATION_HOURS * 3600
        };
        Duration::seconds(secs as i64)
    }

    pub fn refresh_token_ttl(&self) -> Duration {
        let ms = if within_limit(self.refresh_token_expiration_ms / 1000) {
            self.refresh_token_expiration_ms
        } else {
            DEFAULT_REFRESH_EXPIRATION_MS
        };
        Duration::milliseconds(ms as i64)
    }

    /// Max-Age of the refresh cookie, in seconds.
    pub fn refresh_cookie_max_age(&self) -> i64 {
        self.refresh_token_ttl().num_seconds()
    }
}
