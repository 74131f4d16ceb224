use crate::error::ApiError;
use crate::models::UserId;
use crate::services::token::{TokenService, identity_from_claims};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use std::sync::Arc;

/// Represents an authenticated user extracted from the bearer token.
///
/// Use this as a handler parameter and Axum will:
/// 1. Read the Authorization header
/// 2. Verify the JWT (algorithm, signature, expiry, issuer, audience)
/// 3. Hand the handler an `AuthenticatedUser`, or answer 401 without calling it
///
/// A handler that takes one of these cannot run on an unauthenticated request,
/// and anything downstream that needs the caller's identity asks for it by type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
    pub first_name: String,
    pub last_name: String,
}

impl AuthenticatedUser {
    /// "First Last", as it appears in the token.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<TokenService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let tokens = Arc::<TokenService>::from_ref(state);

        // A header that isn't valid UTF-8 is treated the same as a missing one.
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok());

        let claims = tokens.authenticate(header).map_err(|e| {
            tracing::debug!(reason = %e, "rejecting unauthenticated request");
            ApiError::Unauthorized(e)
        })?;
        let identity = identity_from_claims(&claims)?;

        Ok(AuthenticatedUser {
            user_id: identity.id,
            first_name: identity.first_name,
            last_name: identity.last_name,
        })
    }
}
