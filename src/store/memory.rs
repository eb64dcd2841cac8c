use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{
    Anonymization, FollowStore, NewUser, ProfileUpdate, RefreshToken, RefreshTokenStore,
    StoreError, User, UserStore,
};

/// In-process store. Every operation holds the lock for its whole duration,
/// which gives the same atomicity the Postgres transactions provide.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    next_id: i32,
    users: BTreeMap<i32, User>,
    tokens: HashMap<String, RefreshToken>,
    /// (follower, followee)
    follows: BTreeSet<(i32, i32)>,
}

impl Inner {
    fn username_taken(&self, username: &str, except: Option<i32>) -> bool {
        self.users
            .values()
            .any(|user| user.username == username && Some(user.id) != except)
    }

    fn active_users(&self, ids: impl Iterator<Item = i32>) -> Vec<User> {
        let mut users: Vec<User> = ids
            .filter_map(|id| self.users.get(&id))
            .filter(|user| !user.is_anonymized)
            .cloned()
            .collect();
        users.sort_by_key(|user| user.id);
        users
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of refresh tokens currently stored for `username`.
    pub async fn refresh_token_count(&self, username: &str) -> usize {
        let inner = self.inner.lock().await;
        inner
            .tokens
            .values()
            .filter(|token| token.username == username)
            .count()
    }

    /// Overwrites a user's role.
    pub async fn set_role(&self, id: i32, role: super::Role) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.users.get_mut(&id) {
            Some(user) => {
                user.role = role;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.username_taken(&user.username, None) {
            return Err(StoreError::UniqueViolation(user.username));
        }
        inner.next_id += 1;
        let created = User {
            id: inner.next_id,
            username: user.username,
            firstname: user.firstname,
            lastname: user.lastname,
            email: user.email,
            password_hash: user.password_hash,
            password_salt: user.password_salt,
            profilepicture: user.profilepicture,
            role: user.role,
            is_anonymized: false,
            anonymized_at: None,
        };
        inner.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<User>, StoreError> {
        Ok(self.inner.lock().await.users.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .users
            .values()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn exists_by_username(&self, username: &str) -> Result<bool, StoreError> {
        Ok(self.inner.lock().await.username_taken(username, None))
    }

    async fn list_active(&self) -> Result<Vec<User>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .users
            .values()
            .filter(|user| !user.is_anonymized)
            .cloned()
            .collect())
    }

    async fn search_active(&self, fragment: &str) -> Result<Vec<User>, StoreError> {
        let needle = fragment.to_lowercase();
        let inner = self.inner.lock().await;
        Ok(inner
            .users
            .values()
            .filter(|user| !user.is_anonymized && user.username.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }

    async fn update_profile(&self, id: i32, update: &ProfileUpdate) -> Result<Option<User>, StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.username_taken(&update.username, Some(id)) {
            return Err(StoreError::UniqueViolation(update.username.clone()));
        }
        let Some(user) = inner.users.get_mut(&id) else {
            return Ok(None);
        };
        user.username = update.username.clone();
        user.firstname = update.firstname.clone();
        user.lastname = update.lastname.clone();
        user.email = update.email.clone();
        user.password_hash = update.password_hash.clone();
        user.password_salt = update.password_salt.clone();
        user.profilepicture = update.profilepicture.clone();
        Ok(Some(user.clone()))
    }

    async fn anonymize(&self, id: i32, fields: &Anonymization) -> Result<Option<User>, StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.username_taken(&fields.username, Some(id)) {
            return Err(StoreError::UniqueViolation(fields.username.clone()));
        }
        let Some(user) = inner.users.get_mut(&id).filter(|user| !user.is_anonymized) else {
            return Ok(None);
        };
        user.username = fields.username.clone();
        user.firstname = fields.firstname.clone();
        user.lastname = fields.lastname.clone();
        user.email = fields.email.clone();
        user.profilepicture = None;
        user.password_hash = fields.password_hash.clone();
        user.password_salt = fields.password_salt.clone();
        user.is_anonymized = true;
        user.anonymized_at = Some(fields.anonymized_at);
        Ok(Some(user.clone()))
    }

    async fn delete(&self, id: i32) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        let removed = inner.users.remove(&id).is_some();
        inner.tokens.retain(|_, token| token.user_id != id);
        inner
            .follows
            .retain(|(follower, followee)| *follower != id && *followee != id);
        Ok(removed)
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryStore {
    async fn replace_for_user(&self, token: &RefreshToken) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner
            .tokens
            .retain(|_, existing| existing.username != token.username);
        inner.tokens.insert(token.token.clone(), token.clone());
        Ok(())
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<RefreshToken>, StoreError> {
        Ok(self.inner.lock().await.tokens.get(token).cloned())
    }

    async fn delete_by_token(&self, token: &str) -> Result<bool, StoreError> {
        Ok(self.inner.lock().await.tokens.remove(token).is_some())
    }

    async fn delete_by_username(&self, username: &str) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().await;
        let before = inner.tokens.len();
        inner.tokens.retain(|_, token| token.username != username);
        Ok((before - inner.tokens.len()) as u64)
    }
}

#[async_trait]
impl FollowStore for MemoryStore {
    async fn follow(&self, follower_id: i32, followee_id: i32) -> Result<bool, StoreError> {
        Ok(self.inner.lock().await.follows.insert((follower_id, followee_id)))
    }

    async fn unfollow(&self, follower_id: i32, followee_id: i32) -> Result<bool, StoreError> {
        Ok(self.inner.lock().await.follows.remove(&(follower_id, followee_id)))
    }

    async fn is_following(&self, follower_id: i32, followee_id: i32) -> Result<bool, StoreError> {
        Ok(self.inner.lock().await.follows.contains(&(follower_id, followee_id)))
    }

    async fn following(&self, user_id: i32) -> Result<Vec<User>, StoreError> {
        let inner = self.inner.lock().await;
        let ids = inner
            .follows
            .iter()
            .filter(|(follower, _)| *follower == user_id)
            .map(|(_, followee)| *followee);
        Ok(inner.active_users(ids))
    }

    async fn followers(&self, user_id: i32) -> Result<Vec<User>, StoreError> {
        let inner = self.inner.lock().await;
        let ids = inner
            .follows
            .iter()
            .filter(|(_, followee)| *followee == user_id)
            .map(|(follower, _)| *follower);
        Ok(inner.active_users(ids))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::store::Role;

    fn new_user(username: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            firstname: "f".to_string(),
            lastname: "l".to_string(),
            email: "e".to_string(),
            password_hash: "h".to_string(),
            password_salt: "s".to_string(),
            profilepicture: Some("pic.png".to_string()),
            role: Role::User,
        }
    }

    fn token(value: &str, user: &User) -> RefreshToken {
        RefreshToken {
            token: value.to_string(),
            user_id: user.id,
            username: user.username.clone(),
            expiry_date: Utc::now() + Duration::days(7),
        }
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_username() {
        let store = MemoryStore::new();
        store.insert(new_user("bob")).await.unwrap();
        let err = store.insert(new_user("bob")).await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(name) if name == "bob"));
    }

    #[tokio::test]
    async fn replace_keeps_one_token_per_user() {
        let store = MemoryStore::new();
        let alice = store.insert(new_user("alice")).await.unwrap();
        store.replace_for_user(&token("first", &alice)).await.unwrap();
        store.replace_for_user(&token("second", &alice)).await.unwrap();

        assert!(store.find_by_token("first").await.unwrap().is_none());
        assert!(store.find_by_token("second").await.unwrap().is_some());
        assert_eq!(store.refresh_token_count("alice").await, 1);
    }

    #[tokio::test]
    async fn anonymize_applies_once() {
        let store = MemoryStore::new();
        let alice = store.insert(new_user("alice")).await.unwrap();
        let fields = Anonymization {
            username: "anonymous_user_1".to_string(),
            firstname: "a".to_string(),
            lastname: "u".to_string(),
            email: "deleted".to_string(),
            password_hash: "ANONYMIZED".to_string(),
            password_salt: "ANONYMIZED".to_string(),
            anonymized_at: Utc::now(),
        };

        let updated = store.anonymize(alice.id, &fields).await.unwrap().unwrap();
        assert!(updated.is_anonymized);
        assert!(updated.profilepicture.is_none());
        assert!(store.anonymize(alice.id, &fields).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn search_is_case_insensitive_and_skips_anonymized() {
        let store = MemoryStore::new();
        store.insert(new_user("MetalFan")).await.unwrap();
        store.insert(new_user("jazzfan")).await.unwrap();
        store.insert(new_user("classical")).await.unwrap();

        let found = store.search_active("FAN").await.unwrap();
        let names: Vec<_> = found.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, vec!["MetalFan", "jazzfan"]);
    }

    #[tokio::test]
    async fn delete_cascades_to_tokens() {
        let store = MemoryStore::new();
        let alice = store.insert(new_user("alice")).await.unwrap();
        store.replace_for_user(&token("t", &alice)).await.unwrap();

        assert!(store.delete(alice.id).await.unwrap());
        assert!(store.find_by_token("t").await.unwrap().is_none());
        assert!(!store.delete(alice.id).await.unwrap());
    }

    #[tokio::test]
    async fn delete_by_username_without_rows_is_noop() {
        let store = MemoryStore::new();
        assert_eq!(store.delete_by_username("ghost").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn follow_edges_are_directed_and_unique() {
        let store = MemoryStore::new();
        let alice = store.insert(new_user("alice")).await.unwrap();
        let bob = store.insert(new_user("bob")).await.unwrap();

        assert!(store.follow(alice.id, bob.id).await.unwrap());
        assert!(!store.follow(alice.id, bob.id).await.unwrap());
        assert!(store.is_following(alice.id, bob.id).await.unwrap());
        assert!(!store.is_following(bob.id, alice.id).await.unwrap());

        let followers = store.followers(bob.id).await.unwrap();
        assert_eq!(followers.len(), 1);
        assert_eq!(followers[0].id, alice.id);
        assert!(store.following(bob.id).await.unwrap().is_empty());

        assert!(store.unfollow(alice.id, bob.id).await.unwrap());
        assert!(!store.unfollow(alice.id, bob.id).await.unwrap());
    }

    #[tokio::test]
    async fn delete_removes_follow_edges() {
        let store = MemoryStore::new();
        let alice = store.insert(new_user("alice")).await.unwrap();
        let bob = store.insert(new_user("bob")).await.unwrap();
        store.follow(alice.id, bob.id).await.unwrap();
        store.follow(bob.id, alice.id).await.unwrap();

        store.delete(bob.id).await.unwrap();
        assert!(!store.is_following(alice.id, bob.id).await.unwrap());
        assert!(store.followers(alice.id).await.unwrap().is_empty());
    }
}
