#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Duration;
use polling::db::{MemoryStore, Store, StoreError, VoteTx, bounded};
use polling::middleware::auth::AuthenticatedUser;
use polling::models::poll::{Poll, PollOption, Vote};
use polling::models::user::{NewUser, User, UserSummary};
use polling::models::{OptionId, PollId, UserId};
use polling::services::token::{TokenConfig, TokenService};
use polling::state::AppState;
use polling::utils::auth::hash_password;
use std::sync::Arc;

pub fn token_config() -> TokenConfig {
    TokenConfig {
        issuer: "test".to_string(),
        audience: "test".to_string(),
        secret: "test-secret-test-secret-test-secret".to_string(),
        access_ttl: Duration::hours(1),
        refresh_ttl: Duration::hours(24),
        cookie_name: "__Host-refresh_token".to_string(),
        cookie_path: "/".to_string(),
        cookie_domain: "localhost".to_string(),
    }
}

/// App state over a fresh memory store. The returned store shares its data
/// with the one inside the state.
pub fn app_state() -> (AppState, MemoryStore) {
    let store = MemoryStore::new();
    let state = state_over(Arc::new(store.clone()));
    (state, store)
}

pub fn state_over(store: Arc<dyn Store>) -> AppState {
    let tokens = TokenService::new(token_config()).expect("valid token config");
    AppState {
        store,
        tokens: Arc::new(tokens),
    }
}

pub async fn seed_user(store: &dyn Store, username: &str, password: &str) -> User {
    store
        .create_user(NewUser {
            username: username.to_string(),
            password_hash: hash_password(password).expect("hash"),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            created_at: 0,
        })
        .await
        .expect("seed user")
}

pub fn identity(user: &User) -> AuthenticatedUser {
    AuthenticatedUser {
        user_id: user.id,
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
    }
}

/// `Authorization` header value carrying a fresh access token for `user`.
pub fn bearer(state: &AppState, user: &User) -> String {
    let pair = state
        .tokens
        .issue(&UserSummary::from(user))
        .expect("issue tokens");
    format!("Bearer {}", pair.access_token)
}

/// A memory store whose vote transactions never get an insert through.
///
/// Everything else passes straight to the wrapped store, and the wrapped
/// store sees only what a real commit would have published.
#[derive(Clone)]
pub struct StallingStore {
    inner: MemoryStore,
}

impl StallingStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl Store for StallingStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.inner.ping().await
    }

    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        self.inner.create_user(user).await
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        self.inner.get_user_by_username(username).await
    }

    async fn create_poll(
        &self,
        owner: UserId,
        title: &str,
        description: &str,
    ) -> Result<Poll, StoreError> {
        self.inner.create_poll(owner, title, description).await
    }

    async fn list_polls(&self) -> Result<Vec<Poll>, StoreError> {
        self.inner.list_polls().await
    }

    async fn get_poll_by_id(&self, id: PollId) -> Result<Option<Poll>, StoreError> {
        self.inner.get_poll_by_id(id).await
    }

    async fn update_poll_by_id(
        &self,
        id: PollId,
        title: &str,
        description: &str,
    ) -> Result<bool, StoreError> {
        self.inner.update_poll_by_id(id, title, description).await
    }

    async fn delete_poll_by_id(&self, id: PollId) -> Result<bool, StoreError> {
        self.inner.delete_poll_by_id(id).await
    }

    async fn add_options(
        &self,
        poll_id: PollId,
        texts: &[String],
    ) -> Result<Vec<PollOption>, StoreError> {
        self.inner.add_options(poll_id, texts).await
    }

    async fn update_option(
        &self,
        poll_id: PollId,
        option_id: OptionId,
        text: &str,
    ) -> Result<bool, StoreError> {
        self.inner.update_option(poll_id, option_id, text).await
    }

    async fn delete_option(
        &self,
        poll_id: PollId,
        option_id: OptionId,
    ) -> Result<bool, StoreError> {
        self.inner.delete_option(poll_id, option_id).await
    }

    async fn list_votes_for_option(&self, option_id: OptionId) -> Result<Vec<Vote>, StoreError> {
        self.inner.list_votes_for_option(option_id).await
    }

    async fn begin_votes(&self, voter: UserId) -> Result<Box<dyn VoteTx>, StoreError> {
        let inner = self.inner.begin_votes(voter).await?;
        Ok(Box::new(StallingTx { inner }))
    }
}

struct StallingTx {
    inner: Box<dyn VoteTx>,
}

#[async_trait]
impl VoteTx for StallingTx {
    async fn list_options_for_poll(
        &mut self,
        poll_id: PollId,
    ) -> Result<Vec<OptionId>, StoreError> {
        self.inner.list_options_for_poll(poll_id).await
    }

    async fn delete_vote(
        &mut self,
        option_id: OptionId,
        user_id: UserId,
    ) -> Result<(), StoreError> {
        self.inner.delete_vote(option_id, user_id).await
    }

    async fn insert_vote(
        &mut self,
        _poll_id: PollId,
        _option_id: OptionId,
        _user_id: UserId,
    ) -> Result<(), StoreError> {
        bounded(std::future::pending()).await
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.inner.commit().await
    }
}
