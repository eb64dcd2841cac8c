//! Bearer token authentication and the single authorization predicate.
//!
//! The middleware resolves the token's user id against the current row on
//! every request, since role, username and anonymization state can change
//! after the token was issued. Handlers get the result as an explicit `Principal`.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};

use crate::{AppState, error::AppError, store::Role, store::User, utils::verify_token};

/// The authenticated caller, attached to the request as an extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: i32,
    pub username: String,
    pub role: Role,
}

impl From<&User> for Principal {
    fn from(user: &User) -> Self {
        Principal {
            id: user.id,
            username: user.username.clone(),
            role: user.role,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    AdminOnly,
    ModifyUser(i32),
    DeleteUser(i32),
}

pub fn authorize(principal: &Principal, action: Action) -> Result<(), AppError> {
    let is_admin = principal.role == Role::Admin;
    match action {
        Action::AdminOnly if is_admin => Ok(()),
        Action::AdminOnly => Err(AppError::Forbidden(
            "Access denied. Admin role required.".to_string(),
        )),
        Action::ModifyUser(id) if is_admin || principal.id == id => Ok(()),
        Action::ModifyUser(_) => Err(AppError::Forbidden(
            "You can only modify your own account".to_string(),
        )),
        Action::DeleteUser(id) if principal.id == id => Err(AppError::Forbidden(
            "Cannot delete your own account".to_string(),
        )),
        Action::DeleteUser(_) if is_admin => Ok(()),
        Action::DeleteUser(_) => Err(AppError::Forbidden(
            "Access denied. Admin role required.".to_string(),
        )),
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers()).ok_or(AppError::Unauthorized)?;

    let claims = verify_token(&token, &state.config).map_err(|e| {
        tracing::debug!(error = %e, "rejected bearer token");
        AppError::Unauthorized
    })?;

    // a renamed or anonymized account no longer matches the subject
    let user = state
        .users
        .find_by_id(claims.uid)
        .await?
        .filter(|user| !user.is_anonymized && user.username == claims.sub)
        .ok_or(AppError::Unauthorized)?;

    request.extensions_mut().insert(Principal::from(&user));
    Ok(next.run(request).await)
}
