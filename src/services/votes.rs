use thiserror::Error;

use crate::db::{Store, StoreError};
use crate::models::poll::Vote;
use crate::models::{OptionId, PollId, UserId};

#[derive(Debug, Error)]
pub enum VoteError {
    #[error("option does not belong to this poll")]
    OptionNotInPoll,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Records `user_id`'s vote for `option_id`, replacing any vote they already
/// hold on another option of the same poll.
///
/// Runs as one store transaction:
/// 1. load the poll's option ids and check `option_id` is among them
/// 2. delete the user's vote on every option of the poll
/// 3. insert the new vote (a no-op if the same row already exists)
///
/// Any failure drops the transaction, so either the whole switch lands or
/// nothing changes. Concurrent votes by the same user queue up behind each
/// other in `begin_votes`; if the store still has to abort one, it comes back
/// as `StoreError::Conflict`. Switching votes is otherwise unlimited.
pub async fn vote(
    store: &dyn Store,
    poll_id: PollId,
    option_id: OptionId,
    user_id: UserId,
) -> Result<(), VoteError> {
    let mut tx = store.begin_votes(user_id).await?;

    let option_ids = tx.list_options_for_poll(poll_id).await?;
    if !option_ids.contains(&option_id) {
        return Err(VoteError::OptionNotInPoll);
    }

    for id in &option_ids {
        tx.delete_vote(*id, user_id).await?;
    }
    tx.insert_vote(poll_id, option_id, user_id).await?;
    tx.commit().await?;

    tracing::info!(user_id, poll_id, option_id, "vote recorded");
    Ok(())
}

/// Removes `user_id`'s vote on `option_id`. Having no such vote is fine.
pub async fn unvote(
    store: &dyn Store,
    option_id: OptionId,
    user_id: UserId,
) -> Result<(), VoteError> {
    let mut tx = store.begin_votes(user_id).await?;
    tx.delete_vote(option_id, user_id).await?;
    tx.commit().await?;

    tracing::info!(user_id, option_id, "vote removed");
    Ok(())
}

/// Every live vote on an option, in no particular order.
pub async fn get_option_votes(
    store: &dyn Store,
    option_id: OptionId,
) -> Result<Vec<Vote>, VoteError> {
    Ok(store.list_votes_for_option(option_id).await?)
}
