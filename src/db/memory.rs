use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, OwnedMutexGuard};

use super::{Store, StoreError, VoteTx, bounded};
use crate::models::poll::{Poll, PollOption, Vote};
use crate::models::user::{NewUser, User};
use crate::models::{OptionId, PollId, UserId};

/// A store that lives in process memory.
///
/// Enforces the same constraints as the Postgres schema: unique usernames,
/// cascading deletes, and unique `(option_id, user_id)` and `(poll_id, user_id)`
/// vote keys. A vote transaction holds the lock for its whole lifetime, so vote
/// transactions are fully serialized. Waiting for the lock counts against the
/// store timeout like any other call.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

#[derive(Default)]
struct State {
    next_id: i64,
    users: Vec<User>,
    polls: Vec<Poll>,
    options: Vec<PollOption>,
    votes: Vec<VoteRow>,
}

#[derive(Clone)]
struct VoteRow {
    id: i64,
    poll_id: PollId,
    option_id: OptionId,
    user_id: UserId,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn with_options(&self, poll: &Poll) -> Poll {
        let mut poll = poll.clone();
        poll.options = self
            .options
            .iter()
            .filter(|o| o.poll_id == poll.id)
            .cloned()
            .collect();
        poll
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn lock(&self) -> Result<MutexGuard<'_, State>, StoreError> {
        bounded(async { Ok(self.state.lock().await) }).await
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.lock().await.map(|_| ())
    }

    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut state = self.lock().await?;
        if state.users.iter().any(|u| u.username == user.username) {
            return Err(StoreError::Conflict("users_username_key".to_string()));
        }

        let created = User {
            id: state.next_id(),
            username: user.username,
            password_hash: user.password_hash,
            first_name: user.first_name,
            last_name: user.last_name,
            created_at: user.created_at,
            updated_at: user.created_at,
        };
        state.users.push(created.clone());
        Ok(created)
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let state = self.lock().await?;
        Ok(state.users.iter().find(|u| u.username == username).cloned())
    }

    async fn create_poll(
        &self,
        owner: UserId,
        title: &str,
        description: &str,
    ) -> Result<Poll, StoreError> {
        let mut state = self.lock().await?;
        let poll = Poll {
            id: state.next_id(),
            title: title.to_string(),
            description: description.to_string(),
            user_id: owner,
            options: Vec::new(),
        };
        state.polls.push(poll.clone());
        Ok(poll)
    }

    async fn list_polls(&self) -> Result<Vec<Poll>, StoreError> {
        let state = self.lock().await?;
        Ok(state.polls.iter().map(|p| state.with_options(p)).collect())
    }

    async fn get_poll_by_id(&self, id: PollId) -> Result<Option<Poll>, StoreError> {
        let state = self.lock().await?;
        Ok(state
            .polls
            .iter()
            .find(|p| p.id == id)
            .map(|p| state.with_options(p)))
    }

    async fn update_poll_by_id(
        &self,
        id: PollId,
        title: &str,
        description: &str,
    ) -> Result<bool, StoreError> {
        let mut state = self.lock().await?;
        match state.polls.iter_mut().find(|p| p.id == id) {
            Some(poll) => {
                poll.title = title.to_string();
                poll.description = description.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_poll_by_id(&self, id: PollId) -> Result<bool, StoreError> {
        let mut state = self.lock().await?;
        let before = state.polls.len();
        state.polls.retain(|p| p.id != id);
        if state.polls.len() == before {
            return Ok(false);
        }
        state.options.retain(|o| o.poll_id != id);
        state.votes.retain(|v| v.poll_id != id);
        Ok(true)
    }

    async fn add_options(
        &self,
        poll_id: PollId,
        texts: &[String],
    ) -> Result<Vec<PollOption>, StoreError> {
        let mut state = self.lock().await?;
        if !state.polls.iter().any(|p| p.id == poll_id) {
            return Err(StoreError::Conflict("poll_options_poll_id_fkey".to_string()));
        }

        let mut added = Vec::with_capacity(texts.len());
        for text in texts {
            let option = PollOption {
                id: state.next_id(),
                poll_id,
                text: text.clone(),
            };
            state.options.push(option.clone());
            added.push(option);
        }
        Ok(added)
    }

    async fn update_option(
        &self,
        poll_id: PollId,
        option_id: OptionId,
        text: &str,
    ) -> Result<bool, StoreError> {
        let mut state = self.lock().await?;
        match state
            .options
            .iter_mut()
            .find(|o| o.id == option_id && o.poll_id == poll_id)
        {
            Some(option) => {
                option.text = text.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_option(
        &self,
        poll_id: PollId,
        option_id: OptionId,
    ) -> Result<bool, StoreError> {
        let mut state = self.lock().await?;
        let before = state.options.len();
        state
            .options
            .retain(|o| !(o.id == option_id && o.poll_id == poll_id));
        if state.options.len() == before {
            return Ok(false);
        }
        state.votes.retain(|v| v.option_id != option_id);
        Ok(true)
    }

    async fn list_votes_for_option(&self, option_id: OptionId) -> Result<Vec<Vote>, StoreError> {
        let state = self.lock().await?;
        Ok(state
            .votes
            .iter()
            .filter(|v| v.option_id == option_id)
            .map(|v| Vote {
                id: v.id,
                option_id: v.option_id,
                user_id: v.user_id,
            })
            .collect())
    }

    async fn begin_votes(&self, _voter: UserId) -> Result<Box<dyn VoteTx>, StoreError> {
        // The single store lock already serializes every vote transaction.
        let guard = bounded(async { Ok(self.state.clone().lock_owned().await) }).await?;
        let votes = guard.votes.clone();
        let next_id = guard.next_id;
        Ok(Box::new(MemoryVoteTx {
            guard,
            votes,
            next_id,
        }))
    }
}

/// Stages vote changes on a copy of the vote table and swaps it in on commit.
/// Everything else is only read, straight through the held lock.
struct MemoryVoteTx {
    guard: OwnedMutexGuard<State>,
    votes: Vec<VoteRow>,
    next_id: i64,
}

#[async_trait]
impl VoteTx for MemoryVoteTx {
    async fn list_options_for_poll(
        &mut self,
        poll_id: PollId,
    ) -> Result<Vec<OptionId>, StoreError> {
        Ok(self
            .guard
            .options
            .iter()
            .filter(|o| o.poll_id == poll_id)
            .map(|o| o.id)
            .collect())
    }

    async fn delete_vote(
        &mut self,
        option_id: OptionId,
        user_id: UserId,
    ) -> Result<(), StoreError> {
        self.votes
            .retain(|v| !(v.option_id == option_id && v.user_id == user_id));
        Ok(())
    }

    async fn insert_vote(
        &mut self,
        poll_id: PollId,
        option_id: OptionId,
        user_id: UserId,
    ) -> Result<(), StoreError> {
        let votes = &self.votes;
        if votes
            .iter()
            .any(|v| v.option_id == option_id && v.user_id == user_id)
        {
            return Ok(());
        }
        if votes
            .iter()
            .any(|v| v.poll_id == poll_id && v.user_id == user_id)
        {
            return Err(StoreError::Conflict("votes_poll_id_user_id_key".to_string()));
        }

        self.next_id += 1;
        let id = self.next_id;
        self.votes.push(VoteRow {
            id,
            poll_id,
            option_id,
            user_id,
        });
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryVoteTx {
            mut guard,
            votes,
            next_id,
        } = *self;
        guard.votes = votes;
        guard.next_id = next_id;
        Ok(())
    }
}
