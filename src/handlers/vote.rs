use crate::error::{ApiError, message};
use crate::handlers::id_param;
use crate::middleware::auth::AuthenticatedUser;
use crate::services::votes;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};

/// Casts the caller's vote, moving it if they already voted elsewhere in the
/// poll. Any authenticated user may vote; ownership doesn't matter.
pub async fn vote(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((poll_id, option_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let poll_id = id_param(&poll_id, "poll")?;
    let option_id = id_param(&option_id, "option")?;

    // Membership check, old-vote cleanup and insert all happen in one store
    // transaction inside the service. Nothing to do here but hand it the ids.
    votes::vote(state.store.as_ref(), poll_id, option_id, user.user_id).await?;

    tracing::debug!(voter = %user.display_name(), poll_id, option_id, "vote handled");
    Ok(message("Voted successfully"))
}

/// Takes back the caller's vote on an option. Succeeds even if there was
/// nothing to take back.
pub async fn unvote(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(option_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let option_id = id_param(&option_id, "option")?;

    votes::unvote(state.store.as_ref(), option_id, user.user_id).await?;
    Ok(message("Unvoted successfully"))
}

/// Lists the votes on an option. Public, like the polls themselves.
pub async fn option_votes(
    State(state): State<AppState>,
    Path(option_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let option_id = id_param(&option_id, "option")?;

    let votes = votes::get_option_votes(state.store.as_ref(), option_id).await?;
    Ok(Json(votes))
}
