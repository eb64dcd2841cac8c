//! Follow graph endpoints. The follower is always the authenticated caller.

use axum::{
    Json,
    extract::{Extension, Path, State},
};

use crate::{
    AppState,
    error::AppError,
    middleware::Principal,
    models::{FollowMessage, FollowStatus, UserProfile},
};

pub async fn follow(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(target_id): Path<i32>,
) -> Result<Json<FollowMessage>, AppError> {
    state.follows.follow(principal.id, target_id).await?;
    Ok(Json(FollowMessage::new("You are now following this user")))
}

pub async fn unfollow(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(target_id): Path<i32>,
) -> Result<Json<FollowMessage>, AppError> {
    state.follows.unfollow(principal.id, target_id).await?;
    Ok(Json(FollowMessage::new("You have unfollowed this user")))
}

pub async fn my_following(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Vec<UserProfile>>, AppError> {
    Ok(Json(state.follows.following(principal.id).await?))
}

pub async fn my_followers(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Vec<UserProfile>>, AppError> {
    Ok(Json(state.follows.followers(principal.id).await?))
}

pub async fn following(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
) -> Result<Json<Vec<UserProfile>>, AppError> {
    Ok(Json(state.follows.following(user_id).await?))
}

pub async fn followers(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
) -> Result<Json<Vec<UserProfile>>, AppError> {
    Ok(Json(state.follows.followers(user_id).await?))
}

pub async fn is_following(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(target_id): Path<i32>,
) -> Result<Json<FollowStatus>, AppError> {
    let following = state.follows.is_following(principal.id, target_id).await?;
    Ok(Json(FollowStatus { following }))
}
