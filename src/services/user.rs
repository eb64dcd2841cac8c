use std::sync::Arc;

use chrono::Utc;

use crate::error::AppError;
use crate::models::{LoginRequest, UserForm, UserProfile};
use crate::store::{Anonymization, NewUser, ProfileUpdate, Role, StoreError, User, UserStore};
use crate::utils::{
    CipherError, DECRYPTION_ERROR_SENTINEL, FieldCipher, generate_salt, hash_password,
    verify_password,
};

use super::refresh_token::RefreshTokenService;

/// Written over both password columns on anonymization. Not a bcrypt hash,
/// so no password can ever verify against it.
pub const ANONYMIZED_SENTINEL: &str = "ANONYMIZED";

const INVALID_CREDENTIALS: &str = "Invalid username or password";

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn UserStore>,
    refresh_tokens: RefreshTokenService,
    cipher: FieldCipher,
    bcrypt_cost: u32,
}

impl UserService {
    pub fn new(
        store: Arc<dyn UserStore>,
        refresh_tokens: RefreshTokenService,
        cipher: FieldCipher,
        bcrypt_cost: u32,
    ) -> Self {
        Self {
            store,
            refresh_tokens,
            cipher,
            bcrypt_cost,
        }
    }

    pub async fn get_all(&self) -> Result<Vec<UserProfile>, AppError> {
        let users = self.store.list_active().await?;
        Ok(users.iter().map(|user| self.to_profile(user)).collect())
    }

    /// Anonymized users are reported as missing.
    pub async fn get_by_id(&self, id: i32) -> Result<UserProfile, AppError> {
        self.store
            .find_by_id(id)
            .await?
            .filter(|user| !user.is_anonymized)
            .map(|user| self.to_profile(&user))
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    pub async fn find_by_id(&self, id: i32) -> Result<Option<User>, AppError> {
        Ok(self.store.find_by_id(id).await?)
    }

    pub async fn search_by_username(&self, fragment: &str) -> Result<Vec<UserProfile>, AppError> {
        let users = self.store.search_active(fragment).await?;
        Ok(users.iter().map(|user| self.to_profile(user)).collect())
    }

    pub async fn create(&self, form: &UserForm) -> Result<User, AppError> {
        form.validate()?;
        if self.store.exists_by_username(&form.username).await? {
            return Err(AppError::UsernameTaken(form.username.clone()));
        }

        let salt = generate_salt();
        let new_user = NewUser {
            username: form.username.clone(),
            firstname: self.cipher.seal(&form.firstname)?,
            lastname: self.cipher.seal(&form.lastname)?,
            email: self.cipher.seal(&form.email)?,
            password_hash: hash_password(&form.password, &salt, self.bcrypt_cost)?,
            password_salt: salt,
            profilepicture: form.profilepicture.clone(),
            role: Role::User,
        };

        let user = self.store.insert(new_user).await.map_err(conflict)?;
        tracing::info!(user_id = user.id, username = %user.username, "user registered");
        Ok(user)
    }

    pub async fn update(&self, id: i32, form: &UserForm) -> Result<UserProfile, AppError> {
        form.validate()?;
        let existing = self
            .store
            .find_by_id(id)
            .await?
            .filter(|user| !user.is_anonymized)
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        let renamed = existing.username != form.username;
        if renamed && self.store.exists_by_username(&form.username).await? {
            return Err(AppError::UsernameTaken(form.username.clone()));
        }

        let salt = generate_salt();
        let update = ProfileUpdate {
            username: form.username.clone(),
            firstname: self.cipher.seal(&form.firstname)?,
            lastname: self.cipher.seal(&form.lastname)?,
            email: self.cipher.seal(&form.email)?,
            password_hash: hash_password(&form.password, &salt, self.bcrypt_cost)?,
            password_salt: salt,
            profilepicture: form.profilepicture.clone(),
        };

        let updated = self
            .store
            .update_profile(id, &update)
            .await
            .map_err(conflict)?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        // the refresh token row is keyed by the old username
        if renamed {
            if let Err(e) = self.refresh_tokens.delete_by_username(&existing.username).await {
                tracing::warn!(user_id = id, error = %e, "failed to revoke refresh token after rename");
            }
        }

        Ok(self.to_profile(&updated))
    }

    pub async fn delete(&self, id: i32) -> Result<(), AppError> {
        if self.store.delete(id).await? {
            tracing::info!(user_id = id, "user deleted");
            Ok(())
        } else {
            Err(AppError::NotFound("User not found".to_string()))
        }
    }

    pub async fn authenticate(&self, login: &LoginRequest) -> Result<User, AppError> {
        login.validate()?;
        let user = self
            .store
            .find_by_username(&login.username)
            .await?
            .ok_or_else(|| AppError::Authentication(INVALID_CREDENTIALS.to_string()))?;

        if user.is_anonymized {
            return Err(AppError::Authentication("Account no longer exists".to_string()));
        }

        if !verify_password(&login.password, &user.password_salt, &user.password_hash) {
            tracing::debug!(username = %login.username, "password mismatch");
            return Err(AppError::Authentication(INVALID_CREDENTIALS.to_string()));
        }

        Ok(user)
    }

    /// Scrubs the user's personal data in place. One way: the row keeps its id
    /// but can never log in again.
    pub async fn anonymize(&self, id: i32) -> Result<(), AppError> {
        let user = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        if user.is_anonymized {
            return Err(AppError::AlreadyAnonymized);
        }

        let now = Utc::now();
        let timestamp = now.timestamp_millis();
        let fields = Anonymization {
            username: format!("anonymous_user_{timestamp}"),
            firstname: self.cipher.seal("Anonymous")?,
            lastname: self.cipher.seal("User")?,
            email: self.cipher.seal(&format!("deleted_{timestamp}@anonymized.local"))?,
            password_hash: ANONYMIZED_SENTINEL.to_string(),
            password_salt: ANONYMIZED_SENTINEL.to_string(),
            anonymized_at: now,
        };

        // None here means a concurrent request got there first
        self.store
            .anonymize(id, &fields)
            .await
            .map_err(conflict)?
            .ok_or(AppError::AlreadyAnonymized)?;
        tracing::info!(user_id = id, "user anonymized");

        if let Err(e) = self.refresh_tokens.delete_by_username(&user.username).await {
            tracing::warn!(user_id = id, error = %e, "failed to revoke refresh token of anonymized user");
        }

        Ok(())
    }

    /// A row that fails to decrypt is still returned, with the username
    /// replaced by a sentinel and the personal fields left empty.
    pub fn to_profile(&self, user: &User) -> UserProfile {
        let (username, (firstname, lastname, email)) = match self.decrypt_fields(user) {
            Ok(fields) => (user.username.clone(), fields),
            Err(e) => {
                tracing::error!(user_id = user.id, error = %e, "failed to decrypt user fields");
                (DECRYPTION_ERROR_SENTINEL.to_string(), (None, None, None))
            }
        };

        UserProfile {
            id: user.id,
            username,
            firstname,
            lastname,
            email,
            profilepicture: user.profilepicture.clone(),
            role: user.role,
        }
    }

    fn decrypt_fields(&self, user: &User) -> Result<DecryptedFields, CipherError> {
        Ok((
            self.cipher.decrypt(Some(&user.firstname))?,
            self.cipher.decrypt(Some(&user.lastname))?,
            self.cipher.decrypt(Some(&user.email))?,
        ))
    }
}

type DecryptedFields = (Option<String>, Option<String>, Option<String>);

fn conflict(err: StoreError) -> AppError {
    match err {
        StoreError::UniqueViolation(username) => AppError::UsernameTaken(username),
        other => AppError::Store(other),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::store::MemoryStore;

    fn service() -> (Arc<MemoryStore>, UserService) {
        let store = Arc::new(MemoryStore::new());
        let refresh_tokens = RefreshTokenService::new(store.clone(), store.clone(), Duration::days(7));
        let service = UserService::new(store.clone(), refresh_tokens, FieldCipher::default(), 4);
        (store, service)
    }

    fn form(username: &str) -> UserForm {
        UserForm {
            username: username.into(),
            firstname: "Alice".into(),
            lastname: "Liddell".into(),
            email: "alice@example.com".into(),
            password: "secret1".into(),
            profilepicture: Some("alice.png".into()),
        }
    }

    fn login(username: &str, password: &str) -> LoginRequest {
        LoginRequest {
            username: username.into(),
            password: password.into(),
        }
    }

    #[tokio::test]
    async fn personal_fields_are_encrypted_at_rest() {
        let (store, service) = service();
        let user = service.create(&form("alice")).await.unwrap();

        let stored = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_ne!(stored.firstname, "Alice");
        assert_ne!(stored.email, "alice@example.com");

        let profile = service.to_profile(&stored);
        assert_eq!(profile.firstname.as_deref(), Some("Alice"));
        assert_eq!(profile.email.as_deref(), Some("alice@example.com"));
    }

    #[tokio::test]
    async fn authenticate_checks_password() {
        let (_, service) = service();
        service.create(&form("alice")).await.unwrap();

        assert!(service.authenticate(&login("alice", "secret1")).await.is_ok());
        assert!(matches!(
            service.authenticate(&login("alice", "wrong")).await,
            Err(AppError::Authentication(_))
        ));
        assert!(matches!(
            service.authenticate(&login("nobody", "secret1")).await,
            Err(AppError::Authentication(_))
        ));
    }

    #[tokio::test]
    async fn duplicate_username_conflicts() {
        let (_, service) = service();
        service.create(&form("bob")).await.unwrap();
        match service.create(&form("bob")).await {
            Err(AppError::UsernameTaken(name)) => assert_eq!(name, "bob"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn anonymize_succeeds_once_and_blocks_login() {
        let (store, service) = service();
        let user = service.create(&form("alice")).await.unwrap();

        service.anonymize(user.id).await.unwrap();
        assert!(matches!(
            service.anonymize(user.id).await,
            Err(AppError::AlreadyAnonymized)
        ));

        let stored = store.find_by_id(user.id).await.unwrap().unwrap();
        assert!(stored.is_anonymized);
        assert!(stored.anonymized_at.is_some());
        assert!(stored.username.starts_with("anonymous_user_"));
        assert_eq!(stored.password_hash, ANONYMIZED_SENTINEL);
        assert!(stored.profilepicture.is_none());

        let profile = service.to_profile(&stored);
        assert_eq!(profile.firstname.as_deref(), Some("Anonymous"));
        assert!(profile.email.unwrap().ends_with("@anonymized.local"));

        for password in ["secret1", ANONYMIZED_SENTINEL, ""] {
            assert!(service.authenticate(&login("alice", password)).await.is_err());
            assert!(service.authenticate(&login(&stored.username, password)).await.is_err());
        }
        assert!(matches!(service.get_by_id(user.id).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn anonymize_revokes_refresh_token() {
        let (store, service) = service();
        service.create(&form("alice")).await.unwrap();
        let user = store.find_by_username("alice").await.unwrap().unwrap();
        service.refresh_tokens.create_refresh_token("alice").await.unwrap();

        service.anonymize(user.id).await.unwrap();
        assert_eq!(store.refresh_token_count("alice").await, 0);
    }

    #[tokio::test]
    async fn anonymize_missing_user_is_not_found() {
        let (_, service) = service();
        assert!(matches!(service.anonymize(42).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn undecryptable_row_gets_sentinel_username() {
        let (store, service) = service();
        let user = service.create(&form("alice")).await.unwrap();
        let mut broken = store.find_by_id(user.id).await.unwrap().unwrap();
        broken.email = "plain text, never encrypted".into();

        let profile = service.to_profile(&broken);
        assert_eq!(profile.username, DECRYPTION_ERROR_SENTINEL);
        assert_eq!(profile.email, None);
        assert_eq!(profile.id, user.id);
    }

    #[tokio::test]
    async fn rename_to_taken_username_conflicts() {
        let (_, service) = service();
        let alice = service.create(&form("alice")).await.unwrap();
        service.create(&form("carol")).await.unwrap();

        let mut update = form("carol");
        update.firstname = "Alicia".into();
        assert!(matches!(
            service.update(alice.id, &update).await,
            Err(AppError::UsernameTaken(_))
        ));

        let renamed = service.update(alice.id, &form("alice2")).await.unwrap();
        assert_eq!(renamed.username, "alice2");
        assert!(service.authenticate(&login("alice2", "secret1")).await.is_ok());
    }

    #[tokio::test]
    async fn search_hides_anonymized_users() {
        let (_, service) = service();
        let alice = service.create(&form("alice")).await.unwrap();
        service.create(&form("malice")).await.unwrap();
        service.anonymize(alice.id).await.unwrap();

        let found = service.search_by_username("ALI").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].username, "malice");
    }
}
