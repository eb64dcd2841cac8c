pub mod cipher;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Config;
use crate::store::{Role, User};

pub use cipher::{CipherError, DECRYPTION_ERROR_SENTINEL, FieldCipher};

const SALT_LEN: usize = 16;

/// 16 random bytes from the OS generator, base64 encoded.
pub fn generate_salt() -> String {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    STANDARD.encode(salt)
}

/// bcrypt over `password + salt`.
pub fn hash_password(password: &str, salt: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(format!("{password}{salt}"), cost)
}

/// Never errors: a malformed stored hash simply does not match.
pub fn verify_password(password: &str, salt: &str, hash: &str) -> bool {
    bcrypt::verify(format!("{password}{salt}"), hash).unwrap_or(false)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // username
    /// Row id of the user the token was issued to. Usernames can be freed
    /// and reused, ids cannot.
    pub uid: i32,
    pub role: Role,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

pub fn generate_token(user: &User, config: &Config) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let expiration = now + config.jwt_ttl();

    let claims = Claims {
        sub: user.username.clone(),
        uid: user.id,
        role: user.role,
        jti: Uuid::new_v4().to_string(),
        iat: now.timestamp(),
        exp: expiration.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
}

pub fn verify_token(token: &str, config: &Config) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}
