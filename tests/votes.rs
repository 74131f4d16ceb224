//! Single-live-vote behaviour of the vote coordinator against the memory store.

mod common;

use common::{StallingStore, seed_user};
use polling::db::{MemoryStore, Store, StoreError};
use polling::models::poll::PollOption;
use polling::models::{PollId, UserId};
use polling::services::votes::{self, VoteError};

/// Poll with three options, plus a voter who does not own it.
async fn setup(store: &MemoryStore) -> (PollId, Vec<PollOption>, UserId) {
    let owner = seed_user(store, "owner", "pw123456").await;
    let voter = seed_user(store, "voter", "pw123456").await;

    let poll = store.create_poll(owner.id, "Lunch", "Where?").await.unwrap();
    let options = store
        .add_options(
            poll.id,
            &["Pizza".to_string(), "Tacos".to_string(), "Ramen".to_string()],
        )
        .await
        .unwrap();

    (poll.id, options, voter.id)
}

/// How many votes `user_id` holds across the given options.
async fn votes_held(store: &MemoryStore, options: &[PollOption], user_id: UserId) -> usize {
    let mut held = 0;
    for option in options {
        held += store
            .list_votes_for_option(option.id)
            .await
            .unwrap()
            .iter()
            .filter(|v| v.user_id == user_id)
            .count();
    }
    held
}

#[tokio::test]
async fn revoting_the_same_option_keeps_one_row() {
    let store = MemoryStore::new();
    let (poll_id, options, user) = setup(&store).await;

    votes::vote(&store, poll_id, options[0].id, user).await.unwrap();
    votes::vote(&store, poll_id, options[0].id, user).await.unwrap();

    assert_eq!(votes_held(&store, &options, user).await, 1);
    assert_eq!(store.list_votes_for_option(options[0].id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn switching_options_leaves_exactly_one_live_vote() {
    let store = MemoryStore::new();
    let (poll_id, options, user) = setup(&store).await;

    for index in [0, 2, 1, 1, 0, 2] {
        votes::vote(&store, poll_id, options[index].id, user).await.unwrap();
        assert_eq!(votes_held(&store, &options, user).await, 1);
    }

    let last = store.list_votes_for_option(options[2].id).await.unwrap();
    assert_eq!(last.len(), 1);
    assert_eq!(last[0].user_id, user);
}

#[tokio::test]
async fn moving_a_vote_empties_the_old_option() {
    let store = MemoryStore::new();
    let (poll_id, options, user) = setup(&store).await;

    votes::vote(&store, poll_id, options[0].id, user).await.unwrap();
    votes::vote(&store, poll_id, options[1].id, user).await.unwrap();

    let first = votes::get_option_votes(&store, options[0].id).await.unwrap();
    let second = votes::get_option_votes(&store, options[1].id).await.unwrap();
    assert!(first.is_empty());
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].user_id, user);
    assert_eq!(second[0].option_id, options[1].id);
}

#[tokio::test]
async fn votes_in_different_polls_are_independent() {
    let store = MemoryStore::new();
    let (poll_id, options, user) = setup(&store).await;

    let other = store.create_poll(user, "Dinner", "").await.unwrap();
    let other_options = store
        .add_options(other.id, &["Soup".to_string()])
        .await
        .unwrap();

    votes::vote(&store, poll_id, options[0].id, user).await.unwrap();
    votes::vote(&store, other.id, other_options[0].id, user).await.unwrap();

    assert_eq!(votes_held(&store, &options, user).await, 1);
    assert_eq!(votes_held(&store, &other_options, user).await, 1);
}

#[tokio::test]
async fn different_users_keep_their_own_votes() {
    let store = MemoryStore::new();
    let (poll_id, options, user) = setup(&store).await;
    let other = seed_user(&store, "other", "pw123456").await;

    votes::vote(&store, poll_id, options[0].id, user).await.unwrap();
    votes::vote(&store, poll_id, options[0].id, other.id).await.unwrap();
    votes::vote(&store, poll_id, options[1].id, other.id).await.unwrap();

    let first = store.list_votes_for_option(options[0].id).await.unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].user_id, user);
}

#[tokio::test]
async fn option_from_another_poll_is_rejected() {
    let store = MemoryStore::new();
    let (poll_id, options, user) = setup(&store).await;
    votes::vote(&store, poll_id, options[0].id, user).await.unwrap();

    let other = store.create_poll(user, "Dinner", "").await.unwrap();
    let foreign = store
        .add_options(other.id, &["Soup".to_string()])
        .await
        .unwrap();

    let err = votes::vote(&store, poll_id, foreign[0].id, user)
        .await
        .unwrap_err();
    assert!(matches!(err, VoteError::OptionNotInPoll));

    // The rejected attempt must not have touched the existing vote.
    assert_eq!(store.list_votes_for_option(options[0].id).await.unwrap().len(), 1);
    assert!(store.list_votes_for_option(foreign[0].id).await.unwrap().is_empty());
}

#[tokio::test]
async fn voting_on_a_missing_poll_is_rejected() {
    let store = MemoryStore::new();
    let (_, options, user) = setup(&store).await;

    let err = votes::vote(&store, 9_999, options[0].id, user)
        .await
        .unwrap_err();
    assert!(matches!(err, VoteError::OptionNotInPoll));
}

#[tokio::test]
async fn unvote_is_idempotent() {
    let store = MemoryStore::new();
    let (poll_id, options, user) = setup(&store).await;

    // Nothing to remove yet.
    votes::unvote(&store, options[0].id, user).await.unwrap();

    votes::vote(&store, poll_id, options[0].id, user).await.unwrap();
    votes::unvote(&store, options[0].id, user).await.unwrap();
    votes::unvote(&store, options[0].id, user).await.unwrap();

    assert_eq!(votes_held(&store, &options, user).await, 0);
}

#[tokio::test]
async fn unvote_only_touches_the_callers_vote() {
    let store = MemoryStore::new();
    let (poll_id, options, user) = setup(&store).await;
    let other = seed_user(&store, "other", "pw123456").await;

    votes::vote(&store, poll_id, options[0].id, user).await.unwrap();
    votes::vote(&store, poll_id, options[0].id, other.id).await.unwrap();
    votes::unvote(&store, options[0].id, user).await.unwrap();

    let left = store.list_votes_for_option(options[0].id).await.unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].user_id, other.id);
}

#[tokio::test]
async fn concurrent_votes_by_one_user_leave_one_live_vote() {
    let store = MemoryStore::new();
    let (poll_id, options, user) = setup(&store).await;

    let mut handles = Vec::new();
    for round in 0..30 {
        let store = store.clone();
        let option_id = options[round % options.len()].id;
        handles.push(tokio::spawn(async move {
            votes::vote(&store, poll_id, option_id, user).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(votes_held(&store, &options, user).await, 1);
}

#[tokio::test(start_paused = true)]
async fn timed_out_switch_keeps_the_previous_vote() {
    let store = MemoryStore::new();
    let (poll_id, options, user) = setup(&store).await;
    votes::vote(&store, poll_id, options[0].id, user).await.unwrap();

    // The delete of the old vote goes through, then the insert never finishes.
    let stalling = StallingStore::new(store.clone());
    let err = votes::vote(&stalling, poll_id, options[1].id, user)
        .await
        .unwrap_err();
    assert!(matches!(err, VoteError::Store(StoreError::Timeout)));

    let kept = store.list_votes_for_option(options[0].id).await.unwrap();
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].user_id, user);
    assert!(store.list_votes_for_option(options[1].id).await.unwrap().is_empty());

    // And the store is usable again once the stalled transaction is gone.
    votes::vote(&store, poll_id, options[1].id, user).await.unwrap();
    assert_eq!(votes_held(&store, &options, user).await, 1);
}
