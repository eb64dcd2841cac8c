use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use super::{
    Anonymization, FollowStore, NewUser, ProfileUpdate, RefreshToken, RefreshTokenStore, Role,
    StoreError, User, UserStore,
};

const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: i32,
    username: String,
    firstname: String,
    lastname: String,
    email: String,
    password_hash: String,
    password_salt: String,
    profilepicture: Option<String>,
    role: String,
    is_anonymized: bool,
    anonymized_at: Option<DateTime<Utc>>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            username: row.username,
            firstname: row.firstname,
            lastname: row.lastname,
            email: row.email,
            password_hash: row.password_hash,
            password_salt: row.password_salt,
            profilepicture: row.profilepicture,
            role: Role::from_db(&row.role),
            is_anonymized: row.is_anonymized,
            anonymized_at: row.anonymized_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct RefreshTokenRow {
    token: String,
    user_id: i32,
    username: String,
    expiry_date: DateTime<Utc>,
}

impl From<RefreshTokenRow> for RefreshToken {
    fn from(row: RefreshTokenRow) -> Self {
        RefreshToken {
            token: row.token,
            user_id: row.user_id,
            username: row.username,
            expiry_date: row.expiry_date,
        }
    }
}

fn unique_violation(err: sqlx::Error, username: &str) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return StoreError::UniqueViolation(username.to_string());
        }
    }
    StoreError::Database(err)
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the tables if they do not exist yet.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (username, firstname, lastname, email, password_hash, password_salt, profilepicture, role)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, username, firstname, lastname, email, password_hash, password_salt,
                      profilepicture, role, is_anonymized, anonymized_at
            "#,
        )
        .bind(&user.username)
        .bind(&user.firstname)
        .bind(&user.lastname)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.password_salt)
        .bind(&user.profilepicture)
        .bind(user.role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_violation(e, &user.username))?;

        Ok(row.into())
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, firstname, lastname, email, password_hash, password_salt,
                   profilepicture, role, is_anonymized, anonymized_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, firstname, lastname, email, password_hash, password_salt,
                   profilepicture, role, is_anonymized, anonymized_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    async fn exists_by_username(&self, username: &str) -> Result<bool, StoreError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE username = $1)")
                .bind(username)
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }

    async fn list_active(&self) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, firstname, lastname, email, password_hash, password_salt,
                   profilepicture, role, is_anonymized, anonymized_at
            FROM users
            WHERE is_anonymized = FALSE
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn search_active(&self, fragment: &str) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, firstname, lastname, email, password_hash, password_salt,
                   profilepicture, role, is_anonymized, anonymized_at
            FROM users
            WHERE is_anonymized = FALSE
              AND strpos(lower(username), lower($1)) > 0
            ORDER BY id
            "#,
        )
        .bind(fragment)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn update_profile(&self, id: i32, update: &ProfileUpdate) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users
            SET username = $2, firstname = $3, lastname = $4, email = $5,
                password_hash = $6, password_salt = $7, profilepicture = $8
            WHERE id = $1
            RETURNING id, username, firstname, lastname, email, password_hash, password_salt,
                      profilepicture, role, is_anonymized, anonymized_at
            "#,
        )
        .bind(id)
        .bind(&update.username)
        .bind(&update.firstname)
        .bind(&update.lastname)
        .bind(&update.email)
        .bind(&update.password_hash)
        .bind(&update.password_salt)
        .bind(&update.profilepicture)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| unique_violation(e, &update.username))?;

        Ok(row.map(User::from))
    }

    async fn anonymize(&self, id: i32, fields: &Anonymization) -> Result<Option<User>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users
            SET username = $2, firstname = $3, lastname = $4, email = $5,
                profilepicture = NULL, password_hash = $6, password_salt = $7,
                is_anonymized = TRUE, anonymized_at = $8
            WHERE id = $1 AND is_anonymized = FALSE
            RETURNING id, username, firstname, lastname, email, password_hash, password_salt,
                      profilepicture, role, is_anonymized, anonymized_at
            "#,
        )
        .bind(id)
        .bind(&fields.username)
        .bind(&fields.firstname)
        .bind(&fields.lastname)
        .bind(&fields.email)
        .bind(&fields.password_hash)
        .bind(&fields.password_salt)
        .bind(fields.anonymized_at)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| unique_violation(e, &fields.username))?;

        tx.commit().await?;
        Ok(row.map(User::from))
    }

    async fn delete(&self, id: i32) -> Result<bool, StoreError> {
        // refresh_tokens rows go with the user through ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl RefreshTokenStore for PgStore {
    async fn replace_for_user(&self, token: &RefreshToken) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM refresh_tokens WHERE username = $1")
            .bind(&token.username)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (token, user_id, username, expiry_date)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&token.token)
        .bind(token.user_id)
        .bind(&token.username)
        .bind(token.expiry_date)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<RefreshToken>, StoreError> {
        let row = sqlx::query_as::<_, RefreshTokenRow>(
            r#"
            SELECT token, user_id, username, expiry_date
            FROM refresh_tokens
            WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(RefreshToken::from))
    }

    async fn delete_by_token(&self, token: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_by_username(&self, username: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE username = $1")
            .bind(username)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl FollowStore for PgStore {
    async fn follow(&self, follower_id: i32, followee_id: i32) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO user_follows (follower_id, followee_id)
            VALUES ($1, $2)
            ON CONFLICT (follower_id, followee_id) DO NOTHING
            "#,
        )
        .bind(follower_id)
        .bind(followee_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn unfollow(&self, follower_id: i32, followee_id: i32) -> Result<bool, StoreError> {
        let result =
            sqlx::query("DELETE FROM user_follows WHERE follower_id = $1 AND followee_id = $2")
                .bind(follower_id)
                .bind(followee_id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn is_following(&self, follower_id: i32, followee_id: i32) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM user_follows WHERE follower_id = $1 AND followee_id = $2)",
        )
        .bind(follower_id)
        .bind(followee_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn following(&self, user_id: i32) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT u.id, u.username, u.firstname, u.lastname, u.email, u.password_hash,
                   u.password_salt, u.profilepicture, u.role, u.is_anonymized, u.anonymized_at
            FROM user_follows f
            JOIN users u ON u.id = f.followee_id
            WHERE f.follower_id = $1 AND u.is_anonymized = FALSE
            ORDER BY u.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn followers(&self, user_id: i32) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT u.id, u.username, u.firstname, u.lastname, u.email, u.password_hash,
                   u.password_salt, u.profilepicture, u.role, u.is_anonymized, u.anonymized_at
            FROM user_follows f
            JOIN users u ON u.id = f.follower_id
            WHERE f.followee_id = $1 AND u.is_anonymized = FALSE
            ORDER BY u.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(User::from).collect())
    }
}
