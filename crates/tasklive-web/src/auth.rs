//! Request identity extraction.
//!
//! Authentication is verified upstream; handlers trust the `x-user-id`
//! header injected by the auth layer and reject requests without it.

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};

pub use tasklive_core::USER_HEADER;

/// The authenticated user a request runs on behalf of.
#[derive(Debug, Clone)]
pub struct AuthedUser(pub String);

impl<S> FromRequestParts<S> for AuthedUser
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(StatusCode::UNAUTHORIZED)?;

        Ok(AuthedUser(user_id.to_string()))
    }
}
