use std::sync::Arc;

use crate::error::AppError;
use crate::models::UserProfile;
use crate::store::{FollowStore, User};

use super::user::UserService;

#[derive(Clone)]
pub struct FollowService {
    follows: Arc<dyn FollowStore>,
    users: UserService,
}

impl FollowService {
    pub fn new(follows: Arc<dyn FollowStore>, users: UserService) -> Self {
        Self { follows, users }
    }

    pub async fn follow(&self, follower_id: i32, target_id: i32) -> Result<(), AppError> {
        if follower_id == target_id {
            return Err(AppError::Validation("You cannot follow yourself".to_string()));
        }
        self.active_user(target_id).await?;

        if !self.follows.follow(follower_id, target_id).await? {
            return Err(AppError::AlreadyFollowing);
        }
        tracing::info!(follower_id, target_id, "user followed");
        Ok(())
    }

    /// Works on anonymized targets too, so stale edges can still be dropped.
    pub async fn unfollow(&self, follower_id: i32, target_id: i32) -> Result<(), AppError> {
        self.existing_user(target_id).await?;

        if !self.follows.unfollow(follower_id, target_id).await? {
            return Err(AppError::NotFound("You are not following this user".to_string()));
        }
        tracing::info!(follower_id, target_id, "user unfollowed");
        Ok(())
    }

    pub async fn is_following(&self, follower_id: i32, target_id: i32) -> Result<bool, AppError> {
        self.existing_user(target_id).await?;
        Ok(self.follows.is_following(follower_id, target_id).await?)
    }

    pub async fn following(&self, user_id: i32) -> Result<Vec<UserProfile>, AppError> {
        self.active_user(user_id).await?;
        let users = self.follows.following(user_id).await?;
        Ok(users.iter().map(|user| self.users.to_profile(user)).collect())
    }

    pub async fn followers(&self, user_id: i32) -> Result<Vec<UserProfile>, AppError> {
        self.active_user(user_id).await?;
        let users = self.follows.followers(user_id).await?;
        Ok(users.iter().map(|user| self.users.to_profile(user)).collect())
    }

    async fn existing_user(&self, id: i32) -> Result<User, AppError> {
        self.users
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User not found with id: {id}")))
    }

    async fn active_user(&self, id: i32) -> Result<User, AppError> {
        let user = self.existing_user(id).await?;
        if user.is_anonymized {
            return Err(AppError::NotFound(format!("User not found with id: {id}")));
        }
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::models::UserForm;
    use crate::services::RefreshTokenService;
    use crate::store::MemoryStore;
    use crate::utils::FieldCipher;

    struct Fixture {
        users: UserService,
        follows: FollowService,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let refresh_tokens = RefreshTokenService::new(store.clone(), store.clone(), Duration::days(7));
        let users = UserService::new(store.clone(), refresh_tokens, FieldCipher::default(), 4);
        let follows = FollowService::new(store, users.clone());
        Fixture { users, follows }
    }

    async fn user(fixture: &Fixture, username: &str) -> i32 {
        let form = UserForm {
            username: username.into(),
            firstname: "Test".into(),
            lastname: "User".into(),
            email: format!("{username}@example.com"),
            password: "secret1".into(),
            profilepicture: None,
        };
        fixture.users.create(&form).await.unwrap().id
    }

    #[tokio::test]
    async fn following_yourself_is_rejected() {
        let fixture = fixture();
        let alice = user(&fixture, "alice").await;
        assert!(matches!(
            fixture.follows.follow(alice, alice).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn follow_twice_conflicts() {
        let fixture = fixture();
        let alice = user(&fixture, "alice").await;
        let bob = user(&fixture, "bob").await;

        fixture.follows.follow(alice, bob).await.unwrap();
        assert!(matches!(
            fixture.follows.follow(alice, bob).await,
            Err(AppError::AlreadyFollowing)
        ));
        assert!(fixture.follows.is_following(alice, bob).await.unwrap());
    }

    #[tokio::test]
    async fn unknown_target_is_not_found() {
        let fixture = fixture();
        let alice = user(&fixture, "alice").await;
        assert!(matches!(
            fixture.follows.follow(alice, 404).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            fixture.follows.is_following(alice, 404).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn anonymized_followers_drop_out_of_lists() {
        let fixture = fixture();
        let alice = user(&fixture, "alice").await;
        let bob = user(&fixture, "bob").await;
        let carol = user(&fixture, "carol").await;

        fixture.follows.follow(alice, carol).await.unwrap();
        fixture.follows.follow(bob, carol).await.unwrap();
        fixture.users.anonymize(alice).await.unwrap();

        let followers = fixture.follows.followers(carol).await.unwrap();
        let names: Vec<_> = followers.iter().map(|p| p.username.as_str()).collect();
        assert_eq!(names, vec!["bob"]);
        assert_eq!(followers[0].email.as_deref(), Some("bob@example.com"));

        assert!(matches!(
            fixture.follows.following(alice).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            fixture.follows.follow(bob, alice).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn unfollow_without_edge_is_not_found() {
        let fixture = fixture();
        let alice = user(&fixture, "alice").await;
        let bob = user(&fixture, "bob").await;

        assert!(matches!(
            fixture.follows.unfollow(alice, bob).await,
            Err(AppError::NotFound(_))
        ));
        fixture.follows.follow(alice, bob).await.unwrap();
        fixture.follows.unfollow(alice, bob).await.unwrap();
        assert!(!fixture.follows.is_following(alice, bob).await.unwrap());
    }
}
