use thiserror::Error;

use crate::db::{Store, StoreError};
use crate::middleware::auth::AuthenticatedUser;
use crate::models::PollId;
use crate::utils::validation::parse_id;

#[derive(Debug, Error)]
pub enum AuthorizationError {
    #[error("invalid poll ID")]
    InvalidId,

    /// Also returned when the poll does not exist, so a denial never reveals
    /// whether the id is taken.
    #[error("you are not authorized to modify this poll")]
    NotAuthorized,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Confirms `user` owns the poll named by the raw path segment `poll_id`.
///
/// Returns the parsed poll id so the caller does not parse it twice. Taking an
/// [`AuthenticatedUser`] means this cannot be called on a request that skipped
/// authentication.
pub async fn check_ownership(
    store: &dyn Store,
    user: &AuthenticatedUser,
    poll_id: &str,
) -> Result<PollId, AuthorizationError> {
    let poll_id = parse_id(poll_id).ok_or(AuthorizationError::InvalidId)?;

    match store.get_poll_by_id(poll_id).await? {
        Some(poll) if poll.user_id == user.user_id => Ok(poll_id),
        Some(_) | None => {
            tracing::warn!(user_id = user.user_id, poll_id, "ownership check denied");
            Err(AuthorizationError::NotAuthorized)
        }
    }
}
