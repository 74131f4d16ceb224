use crate::error::{ApiError, message};
use crate::handlers::id_param;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::poll::{AddOptionsRequest, CreatePollRequest, OptionText, UpdatePollRequest};
use crate::services::ownership::check_ownership;
use crate::state::AppState;
use crate::utils::validation::require_fields;
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};

/// Lists every poll with its options. Public.
pub async fn list_polls(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let polls = state.store.list_polls().await?;
    Ok(Json(polls))
}

/// Gets a single poll with its options. Public.
pub async fn get_poll(
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let poll_id = id_param(&poll_id, "poll")?;

    let poll = state
        .store
        .get_poll_by_id(poll_id)
        .await?
        .ok_or(ApiError::NotFound("poll"))?;

    Ok(Json(poll))
}

/// Creates a poll owned by the caller. Ownership can't be handed to anyone
/// else, here or later.
pub async fn create_poll(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    payload: Result<Json<CreatePollRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    // 1. Validate input
    // The description is optional. A poll with no title is just a list of options.
    let Json(payload) = payload?;
    require_fields(&[&payload.title], &["title"]).map_err(ApiError::Validation)?;

    // 2. Create poll, owned by whoever the token says
    let poll = state
        .store
        .create_poll(user.user_id, payload.title.trim(), &payload.description)
        .await?;

    tracing::info!(
        user_id = user.user_id,
        owner = %user.display_name(),
        poll_id = poll.id,
        "poll created"
    );
    Ok((StatusCode::CREATED, Json(poll)))
}

/// Replaces a poll's title and description. Owner only.
pub async fn update_poll(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(poll_id): Path<String>,
    payload: Result<Json<UpdatePollRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    // 1. Check ownership
    // Before the body is even looked at: a stranger gets the same 401 whether
    // their JSON was valid or not.
    let poll_id = check_ownership(state.store.as_ref(), &user, &poll_id).await?;

    // 2. Validate input
    let Json(payload) = payload?;
    require_fields(&[&payload.title], &["title"]).map_err(ApiError::Validation)?;

    // 3. Update
    // Ownership passed, so a miss here means the poll was deleted in between.
    if !state
        .store
        .update_poll_by_id(poll_id, payload.title.trim(), &payload.description)
        .await?
    {
        return Err(ApiError::NotFound("poll"));
    }

    tracing::info!(user_id = user.user_id, poll_id, "poll updated");
    Ok(message("Poll updated"))
}

/// Deletes a poll along with its options and their votes.
pub async fn delete_poll(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(poll_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let poll_id = check_ownership(state.store.as_ref(), &user, &poll_id).await?;

    // The schema cascades, so options and votes go with it.
    if !state.store.delete_poll_by_id(poll_id).await? {
        return Err(ApiError::NotFound("poll"));
    }

    tracing::info!(user_id = user.user_id, poll_id, "poll deleted");
    Ok(message("Poll deleted"))
}

/// Appends options to a poll. Owner only. Answers 201 with the new options in
/// the order they were sent.
pub async fn add_options(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(poll_id): Path<String>,
    payload: Result<Json<AddOptionsRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    // 1. Check ownership
    let poll_id = check_ownership(state.store.as_ref(), &user, &poll_id).await?;

    // 2. Validate input
    // All or nothing: one blank option rejects the whole batch.
    let Json(payload) = payload?;
    let texts: Vec<String> = payload
        .options
        .into_iter()
        .map(|o| o.text.trim().to_string())
        .collect();
    if texts.is_empty() || texts.iter().any(|t| t.is_empty()) {
        return Err(ApiError::Validation(
            "options must be a non-empty list of options with text".to_string(),
        ));
    }

    // 3. Insert
    let options = state.store.add_options(poll_id, &texts).await?;

    tracing::info!(user_id = user.user_id, poll_id, count = options.len(), "options added");
    Ok((StatusCode::CREATED, Json(options)))
}

/// Renames an option. Its votes stay where they are.
pub async fn update_option(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((poll_id, option_id)): Path<(String, String)>,
    payload: Result<Json<OptionText>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let poll_id = check_ownership(state.store.as_ref(), &user, &poll_id).await?;
    let option_id = id_param(&option_id, "option")?;

    let Json(payload) = payload?;
    require_fields(&[&payload.text], &["text"]).map_err(ApiError::Validation)?;

    // The store matches on (poll, option), so an option from some other poll
    // is a 404 here even though the caller owns this one.
    if !state
        .store
        .update_option(poll_id, option_id, payload.text.trim())
        .await?
    {
        return Err(ApiError::NotFound("option"));
    }

    tracing::info!(user_id = user.user_id, poll_id, option_id, "option updated");
    Ok(message("Option updated"))
}

/// Deletes an option and every vote cast for it.
pub async fn delete_option(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((poll_id, option_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let poll_id = check_ownership(state.store.as_ref(), &user, &poll_id).await?;
    let option_id = id_param(&option_id, "option")?;

    if !state.store.delete_option(poll_id, option_id).await? {
        return Err(ApiError::NotFound("option"));
    }

    tracing::info!(user_id = user.user_id, poll_id, option_id, "option deleted");
    Ok(message("Option deleted"))
}
