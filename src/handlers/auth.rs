use crate::db::StoreError;
use crate::error::{ApiError, message};
use crate::models::user::{AuthResponse, LoginRequest, NewUser, SignupRequest, UserSummary};
use crate::services::token::AuthError;
use crate::state::AppState;
use crate::utils::auth::{hash_password_blocking, verify_password_blocking};
use crate::utils::validation::{require_fields, validate_password, validate_username};
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    response::IntoResponse,
};
use axum_extra::extract::cookie::CookieJar;
use serde_json::json;

/// Creates an account. No tokens are issued; the client logs in afterwards.
pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;

    // 1. Validate input
    require_fields(
        &[
            &payload.username,
            &payload.password,
            &payload.first_name,
            &payload.last_name,
        ],
        &["username", "password", "first_name", "last_name"],
    )
    .map_err(ApiError::Validation)?;
    validate_username(&payload.username).map_err(ApiError::Validation)?;
    validate_password(&payload.password).map_err(ApiError::Validation)?;

    // 2. Hash password (off the async workers, Argon2 is slow on purpose)
    let password_hash = hash_password_blocking(payload.password).await?;

    // 3. Create user. The unique index on username is the real duplicate check,
    // so two racing signups can't both win.
    let new_user = NewUser {
        username: payload.username,
        password_hash,
        first_name: payload.first_name,
        last_name: payload.last_name,
        created_at: chrono::Utc::now().timestamp(),
    };

    let user = match state.store.create_user(new_user).await {
        Ok(user) => user,
        Err(StoreError::Conflict(_)) => {
            return Err(ApiError::Conflict("username already taken".to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    tracing::info!(user_id = user.id, username = %user.username, "user signed up");
    Ok(message("User successfully created"))
}

/// Checks credentials and issues a token pair.
///
/// The access token goes back in the body, the refresh token only as a cookie.
/// A wrong password sets no cookie.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;

    // 1. Validate input
    // No username/password rules here. Those were enforced at signup, and
    // telling a stranger which rule their guess breaks helps nobody.
    require_fields(
        &[&payload.username, &payload.password],
        &["username", "password"],
    )
    .map_err(ApiError::Validation)?;

    // 2. Fetch user
    let user = state
        .store
        .get_user_by_username(&payload.username)
        .await?
        .ok_or(ApiError::NotFound("user"))?;

    // 3. Verify password
    if !verify_password_blocking(payload.password, user.password_hash.clone()).await {
        tracing::warn!(user_id = user.id, "login with wrong password");
        return Err(ApiError::WrongPassword);
    }

    // 4. Issue tokens
    // Access token in the body, refresh token in an HttpOnly cookie the page's
    // JavaScript never sees.
    let summary = UserSummary::from(&user);
    let tokens = state.tokens.issue(&summary)?;
    let jar = jar.add(state.tokens.refresh_cookie(&tokens));

    tracing::info!(user_id = user.id, "user logged in");
    Ok((
        jar,
        Json(AuthResponse {
            user: summary,
            tokens,
        }),
    ))
}

/// Swaps the refresh cookie for a fresh pair.
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    // 1. Find the cookie
    // No cookie means no session. Same 401 as a missing bearer header.
    let refresh_token = jar
        .get(&state.tokens.config().cookie_name)
        .map(|c| c.value().to_string())
        .ok_or(ApiError::Unauthorized(AuthError::MissingCredential))?;

    // 2. Verify it and mint a new pair
    // The cookie is rotated too, so an active session keeps sliding forward.
    let tokens = state.tokens.refresh(&refresh_token)?;
    let jar = jar.add(state.tokens.refresh_cookie(&tokens));

    Ok((jar, Json(json!({ "tokens": tokens }))))
}

/// Overwrites the refresh cookie with an expired one.
///
/// Tokens already handed out stay valid until they expire; there is no
/// server-side revocation.
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    let jar = jar.add(state.tokens.expired_refresh_cookie());
    (jar, message("Logged out"))
}
