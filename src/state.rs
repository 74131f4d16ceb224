use crate::db::Store;
use crate::services::token::TokenService;
use axum::extract::FromRef;
use std::sync::Arc;

/// Shared by every handler. Both halves are immutable after startup; the
/// store coordinates its own concurrency.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub tokens: Arc<TokenService>,
}

impl FromRef<AppState> for Arc<TokenService> {
    fn from_ref(state: &AppState) -> Self {
        state.tokens.clone()
    }
}
