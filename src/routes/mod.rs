use crate::handlers::{
    auth::{login, logout, refresh, signup},
    health::health_check,
    poll::{
        add_options, create_poll, delete_option, delete_poll, get_poll, list_polls, update_option,
        update_poll,
    },
    vote::{option_votes, unvote, vote},
};
use crate::state::AppState;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, header::VARY},
    routing::{delete, get, patch, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

/// Request bodies are small JSON documents. Anything bigger is refused.
const MAX_BODY_BYTES: usize = 1024 * 1024;

pub fn create_routes(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Handlers that take an `AuthenticatedUser` reject unauthenticated calls
    // themselves. Mutations additionally check poll ownership.
    let poll_routes = Router::new()
        .route("/polls", get(list_polls).post(create_poll))
        .route(
            "/polls/{poll_id}",
            get(get_poll).patch(update_poll).delete(delete_poll),
        )
        .route("/polls/{poll_id}/options", post(add_options))
        .route(
            "/polls/{poll_id}/options/{option_id}",
            patch(update_option).delete(delete_option),
        )
        .route("/polls/{poll_id}/options/{option_id}/vote", post(vote))
        .route("/options/{option_id}/vote", delete(unvote))
        .route("/options/{option_id}/votes", get(option_votes));

    Router::new()
        .route("/health", get(health_check))
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .merge(poll_routes)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        // Responses depend on who is asking, caches must key on the header.
        .layer(SetResponseHeaderLayer::appending(
            VARY,
            HeaderValue::from_static("Authorization"),
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
