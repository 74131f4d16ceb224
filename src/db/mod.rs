pub mod memory;
pub mod postgres;

use anyhow::Result;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::models::poll::{Poll, PollOption, Vote};
use crate::models::user::{NewUser, User};
use crate::models::{OptionId, PollId, UserId};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Every store call gets this long before it is abandoned.
pub const STORE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store call timed out")]
    Timeout,

    /// A uniqueness constraint rejected the write, or the database gave up on
    /// a transaction that raced another one.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(sqlx::Error),
}

/// SQLSTATEs Postgres uses when it aborts one of two racing transactions.
const DEADLOCK_DETECTED: &str = "40P01";
const SERIALIZATION_FAILURE: &str = "40001";

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        let conflict = err.as_database_error().and_then(|db| {
            if db.is_unique_violation() {
                return Some(db.constraint().unwrap_or("unique").to_string());
            }
            match db.code().as_deref() {
                Some(code @ (DEADLOCK_DETECTED | SERIALIZATION_FAILURE)) => Some(code.to_string()),
                _ => None,
            }
        });

        match conflict {
            Some(reason) => StoreError::Conflict(reason),
            None => StoreError::Database(err),
        }
    }
}

/// Runs a store future under [`STORE_TIMEOUT`].
///
/// A call that does not finish in time fails with [`StoreError::Timeout`]. When
/// it ran inside a transaction, the caller drops the transaction and nothing
/// is committed.
pub async fn bounded<T, F>(fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    tokio::time::timeout(STORE_TIMEOUT, fut)
        .await
        .map_err(|_| StoreError::Timeout)?
}

/// Persistence operations the service needs.
///
/// Lookups return `Ok(None)` for missing rows. Updates and deletes report
/// whether a row was touched so handlers can answer 404.
#[async_trait]
pub trait Store: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;

    async fn create_user(&self, user: NewUser) -> Result<User, StoreError>;
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    async fn create_poll(
        &self,
        owner: UserId,
        title: &str,
        description: &str,
    ) -> Result<Poll, StoreError>;
    async fn list_polls(&self) -> Result<Vec<Poll>, StoreError>;
    /// Returns the poll with its owner and options.
    async fn get_poll_by_id(&self, id: PollId) -> Result<Option<Poll>, StoreError>;
    async fn update_poll_by_id(
        &self,
        id: PollId,
        title: &str,
        description: &str,
    ) -> Result<bool, StoreError>;
    async fn delete_poll_by_id(&self, id: PollId) -> Result<bool, StoreError>;

    async fn add_options(
        &self,
        poll_id: PollId,
        texts: &[String],
    ) -> Result<Vec<PollOption>, StoreError>;
    async fn update_option(
        &self,
        poll_id: PollId,
        option_id: OptionId,
        text: &str,
    ) -> Result<bool, StoreError>;
    async fn delete_option(&self, poll_id: PollId, option_id: OptionId)
    -> Result<bool, StoreError>;

    async fn list_votes_for_option(&self, option_id: OptionId) -> Result<Vec<Vote>, StoreError>;

    /// Opens a transaction for `voter`'s vote mutations.
    ///
    /// Vote transactions for the same voter are serialized: a second one waits
    /// here until the first commits or is dropped.
    async fn begin_votes(&self, voter: UserId) -> Result<Box<dyn VoteTx>, StoreError>;
}

/// Vote mutations that must land together.
///
/// Nothing is visible to other callers until [`VoteTx::commit`]. Dropping the
/// transaction without committing discards every change made through it.
#[async_trait]
pub trait VoteTx: Send {
    async fn list_options_for_poll(&mut self, poll_id: PollId)
    -> Result<Vec<OptionId>, StoreError>;

    /// Deletes the vote for `(option_id, user_id)` if there is one.
    async fn delete_vote(&mut self, option_id: OptionId, user_id: UserId)
    -> Result<(), StoreError>;

    /// Inserts a vote. An existing `(option_id, user_id)` row makes this a no-op.
    async fn insert_vote(
        &mut self,
        poll_id: PollId,
        option_id: OptionId,
        user_id: UserId,
    ) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

/// Builds the store for this process.
///
/// With a database URL this connects to Postgres and runs migrations; a
/// failure here aborts startup. Without one it falls back to an in-memory
/// store, which loses everything on restart.
pub async fn connect(database_url: Option<&str>) -> Result<Arc<dyn Store>> {
    match database_url {
        Some(url) => {
            let store = PgStore::connect(url).await?;
            Ok(Arc::new(store))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
