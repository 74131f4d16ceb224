use anyhow::Result;
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};

use super::{STORE_TIMEOUT, Store, StoreError, VoteTx, bounded};
use crate::models::poll::{Poll, PollOption, Vote};
use crate::models::user::{NewUser, User};
use crate::models::{OptionId, PollId, UserId};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(url: &str) -> Result<Self> {
        // 1. Connect
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(STORE_TIMEOUT)
            .connect(url)
            .await?;

        // 2. Bring the schema up to date
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    async fn options_for(&self, poll_id: PollId) -> Result<Vec<PollOption>, StoreError> {
        let options = sqlx::query_as::<_, PollOption>(
            "SELECT id, poll_id, option_text FROM poll_options WHERE poll_id = $1 ORDER BY id",
        )
        .bind(poll_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(options)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        bounded(async {
            sqlx::query("SELECT 1").execute(&self.pool).await?;
            Ok(())
        })
        .await
    }

    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        bounded(async {
            let created = sqlx::query_as::<_, User>(
                r#"
                INSERT INTO users (username, password_hash, first_name, last_name, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $5)
                RETURNING id, username, password_hash, first_name, last_name, created_at, updated_at
                "#,
            )
            .bind(&user.username)
            .bind(&user.password_hash)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(user.created_at)
            .fetch_one(&self.pool)
            .await?;
            Ok(created)
        })
        .await
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        bounded(async {
            let user = sqlx::query_as::<_, User>(
                r#"
                SELECT id, username, password_hash, first_name, last_name, created_at, updated_at
                FROM users
                WHERE username = $1
                "#,
            )
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
            Ok(user)
        })
        .await
    }

    async fn create_poll(
        &self,
        owner: UserId,
        title: &str,
        description: &str,
    ) -> Result<Poll, StoreError> {
        bounded(async {
            let poll = sqlx::query_as::<_, Poll>(
                r#"
                INSERT INTO polls (title, description, user_id)
                VALUES ($1, $2, $3)
                RETURNING id, title, description, user_id
                "#,
            )
            .bind(title)
            .bind(description)
            .bind(owner)
            .fetch_one(&self.pool)
            .await?;
            Ok(poll)
        })
        .await
    }

    async fn list_polls(&self) -> Result<Vec<Poll>, StoreError> {
        bounded(async {
            let mut polls = sqlx::query_as::<_, Poll>(
                "SELECT id, title, description, user_id FROM polls ORDER BY id",
            )
            .fetch_all(&self.pool)
            .await?;

            // One query for every option, grouped in memory.
            let options = sqlx::query_as::<_, PollOption>(
                "SELECT id, poll_id, option_text FROM poll_options ORDER BY id",
            )
            .fetch_all(&self.pool)
            .await?;

            for option in options {
                if let Some(poll) = polls.iter_mut().find(|p| p.id == option.poll_id) {
                    poll.options.push(option);
                }
            }
            Ok(polls)
        })
        .await
    }

    async fn get_poll_by_id(&self, id: PollId) -> Result<Option<Poll>, StoreError> {
        bounded(async {
            let poll = sqlx::query_as::<_, Poll>(
                "SELECT id, title, description, user_id FROM polls WHERE id = $1",
            )
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

            let Some(mut poll) = poll else {
                return Ok(None);
            };
            poll.options = self.options_for(id).await?;
            Ok(Some(poll))
        })
        .await
    }

    async fn update_poll_by_id(
        &self,
        id: PollId,
        title: &str,
        description: &str,
    ) -> Result<bool, StoreError> {
        bounded(async {
            let result = sqlx::query("UPDATE polls SET title = $1, description = $2 WHERE id = $3")
                .bind(title)
                .bind(description)
                .bind(id)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected() > 0)
        })
        .await
    }

    async fn delete_poll_by_id(&self, id: PollId) -> Result<bool, StoreError> {
        bounded(async {
            let result = sqlx::query("DELETE FROM polls WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected() > 0)
        })
        .await
    }

    async fn add_options(
        &self,
        poll_id: PollId,
        texts: &[String],
    ) -> Result<Vec<PollOption>, StoreError> {
        bounded(async {
            // UNNEST keeps this a single statement however many options arrive.
            // Ids follow the request order, and RETURNING alone doesn't promise
            // any order, hence the outer sort.
            let options = sqlx::query_as::<_, PollOption>(
                r#"
                WITH inserted AS (
                    INSERT INTO poll_options (poll_id, option_text)
                    SELECT $1, t FROM UNNEST($2::text[]) WITH ORDINALITY AS u(t, n)
                    ORDER BY n
                    RETURNING id, poll_id, option_text
                )
                SELECT id, poll_id, option_text FROM inserted ORDER BY id
                "#,
            )
            .bind(poll_id)
            .bind(texts)
            .fetch_all(&self.pool)
            .await?;
            Ok(options)
        })
        .await
    }

    async fn update_option(
        &self,
        poll_id: PollId,
        option_id: OptionId,
        text: &str,
    ) -> Result<bool, StoreError> {
        bounded(async {
            let result = sqlx::query(
                "UPDATE poll_options SET option_text = $1 WHERE id = $2 AND poll_id = $3",
            )
            .bind(text)
            .bind(option_id)
            .bind(poll_id)
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected() > 0)
        })
        .await
    }

    async fn delete_option(
        &self,
        poll_id: PollId,
        option_id: OptionId,
    ) -> Result<bool, StoreError> {
        bounded(async {
            let result = sqlx::query("DELETE FROM poll_options WHERE id = $1 AND poll_id = $2")
                .bind(option_id)
                .bind(poll_id)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected() > 0)
        })
        .await
    }

    async fn list_votes_for_option(&self, option_id: OptionId) -> Result<Vec<Vote>, StoreError> {
        bounded(async {
            let votes = sqlx::query_as::<_, Vote>(
                "SELECT id, option_id, user_id FROM votes WHERE option_id = $1",
            )
            .bind(option_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(votes)
        })
        .await
    }

    async fn begin_votes(&self, voter: UserId) -> Result<Box<dyn VoteTx>, StoreError> {
        bounded(async {
            let mut tx = self.pool.begin().await?;

            // Serializes vote transactions per voter. Without it two switches
            // by one user each delete the old row and then wait on the other's
            // insert under (poll_id, user_id): a deadlock.
            sqlx::query("SELECT 1 FROM users WHERE id = $1 FOR NO KEY UPDATE")
                .bind(voter)
                .fetch_optional(&mut *tx)
                .await?;

            Ok(Box::new(PgVoteTx { tx }) as Box<dyn VoteTx>)
        })
        .await
    }
}

/// A vote transaction on its own pooled connection. sqlx rolls it back if it
/// is dropped before `commit`.
struct PgVoteTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl VoteTx for PgVoteTx {
    async fn list_options_for_poll(
        &mut self,
        poll_id: PollId,
    ) -> Result<Vec<OptionId>, StoreError> {
        let tx = &mut self.tx;
        bounded(async move {
            // FOR SHARE stops the option set changing under an in-flight vote.
            let ids = sqlx::query_scalar::<_, OptionId>(
                "SELECT id FROM poll_options WHERE poll_id = $1 ORDER BY id FOR SHARE",
            )
            .bind(poll_id)
            .fetch_all(&mut **tx)
            .await?;
            Ok(ids)
        })
        .await
    }

    async fn delete_vote(
        &mut self,
        option_id: OptionId,
        user_id: UserId,
    ) -> Result<(), StoreError> {
        let tx = &mut self.tx;
        bounded(async move {
            sqlx::query("DELETE FROM votes WHERE option_id = $1 AND user_id = $2")
                .bind(option_id)
                .bind(user_id)
                .execute(&mut **tx)
                .await?;
            Ok(())
        })
        .await
    }

    async fn insert_vote(
        &mut self,
        poll_id: PollId,
        option_id: OptionId,
        user_id: UserId,
    ) -> Result<(), StoreError> {
        let tx = &mut self.tx;
        bounded(async move {
            // Only the (option_id, user_id) key is a silent no-op. A clash on
            // (poll_id, user_id) means a concurrent vote won and surfaces as a
            // conflict.
            sqlx::query(
                r#"
                INSERT INTO votes (poll_id, option_id, user_id)
                VALUES ($1, $2, $3)
                ON CONFLICT (option_id, user_id) DO NOTHING
                "#,
            )
            .bind(poll_id)
            .bind(option_id)
            .bind(user_id)
            .execute(&mut **tx)
            .await?;
            Ok(())
        })
        .await
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        bounded(async move { Ok(self.tx.commit().await?) }).await
    }
}
