//! Request extractors.

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use hostelhub_core::CallerContext;
use hostelhub_db::entities::user;

/// Authenticated user extractor.
#[derive(Debug, Clone)]
pub struct AuthUser(pub user::Model);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Get user from request extensions (set by auth middleware)
        parts
            .extensions
            .get::<user::Model>()
            .cloned()
            .map(AuthUser)
            .ok_or((StatusCode::UNAUTHORIZED, "Unauthorized"))
    }
}

/// Caller-context extractor.
///
/// Reduces the authenticated user to the role union domain logic matches
/// over. Verified accounts that hold no role yet (unapproved or roleless
/// management) are rejected here.
#[derive(Debug, Clone)]
pub struct Caller(pub CallerContext);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = parts
            .extensions
            .get::<user::Model>()
            .ok_or((StatusCode::UNAUTHORIZED, "Unauthorized"))?;

        CallerContext::from_user(user)
            .map(Caller)
            .ok_or((StatusCode::FORBIDDEN, "No role assigned"))
    }
}
