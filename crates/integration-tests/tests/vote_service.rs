use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use domains::{PostId, UserId, VoteStore};
use integration_tests::{seed_poll, vote_service};
use services::{VoteError, VotePolicy};
use storage_adapters::MemoryStore;
use tokio_test::{assert_err, assert_ok};

fn anonymous() -> VotePolicy {
    VotePolicy {
        unique_voters: false,
        ..VotePolicy::default()
    }
}

async fn counts(store: &MemoryStore, post_id: PostId) -> Vec<u64> {
    let poll = store.load_poll(post_id).await.unwrap().unwrap();
    poll.options.iter().map(|o| o.votes).collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn hundred_concurrent_votes_are_all_counted() {
    let store = Arc::new(MemoryStore::new());
    let post_id = seed_poll(store.as_ref(), &["A", "B"], None).await;
    let service = Arc::new(vote_service(store.clone(), anonymous()));

    let handles: Vec<_> = (0..100)
        .map(|i| {
            let service = service.clone();
            tokio::spawn(async move { service.cast_vote(post_id, i % 2, Utc::now(), None).await })
        })
        .collect();
    for handle in handles {
        assert_ok!(handle.await.unwrap());
    }

    assert_eq!(counts(&store, post_id).await, vec![50, 50]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn hundred_distinct_voters_on_one_option() {
    let store = Arc::new(MemoryStore::new());
    let post_id = seed_poll(store.as_ref(), &["A", "B", "C"], None).await;
    let service = Arc::new(vote_service(store.clone(), VotePolicy::default()));

    let handles: Vec<_> = (0..100)
        .map(|i| {
            let service = service.clone();
            let voter = UserId::new(format!("voter-{i}"));
            tokio::spawn(async move {
                service
                    .cast_vote(post_id, 2, Utc::now(), Some(voter))
                    .await
            })
        })
        .collect();
    for handle in handles {
        assert_ok!(handle.await.unwrap());
    }

    let tally = assert_ok!(
        service
            .cast_vote(post_id, 0, Utc::now(), Some(UserId::new("late")))
            .await
    );
    assert_eq!(tally.total_votes, 101);
    assert_eq!(counts(&store, post_id).await, vec![1, 0, 100]);
}

#[tokio::test]
async fn out_of_range_indices_change_nothing() {
    let store = Arc::new(MemoryStore::new());
    let post_id = seed_poll(store.as_ref(), &["A", "B"], None).await;
    let service = vote_service(store.clone(), anonymous());

    for index in [-1, 2, 99] {
        assert_eq!(
            assert_err!(service.cast_vote(post_id, index, Utc::now(), None).await),
            VoteError::InvalidOption
        );
    }
    assert_eq!(counts(&store, post_id).await, vec![0, 0]);
}

#[tokio::test]
async fn expiry_is_enforced() {
    let store = Arc::new(MemoryStore::new());
    let now = Utc::now();
    let expired = seed_poll(store.as_ref(), &["A", "B"], Some(now - TimeDelta::seconds(1))).await;
    let open = seed_poll(store.as_ref(), &["A", "B"], Some(now + TimeDelta::days(1))).await;
    let forever = seed_poll(store.as_ref(), &["A", "B"], None).await;
    let service = vote_service(store.clone(), anonymous());

    assert_eq!(
        assert_err!(service.cast_vote(expired, 0, now, None).await),
        VoteError::PollExpired
    );
    assert_eq!(counts(&store, expired).await, vec![0, 0]);

    assert_ok!(service.cast_vote(open, 1, now, None).await);
    assert_ok!(service.cast_vote(forever, 1, now, None).await);
}

#[tokio::test]
async fn same_voter_counts_once() {
    let store = Arc::new(MemoryStore::new());
    let post_id = seed_poll(store.as_ref(), &["A", "B"], None).await;
    let service = vote_service(store.clone(), VotePolicy::default());
    let ada = UserId::new("ada");

    assert_ok!(service.cast_vote(post_id, 0, Utc::now(), Some(ada.clone())).await);
    assert_eq!(
        assert_err!(service.cast_vote(post_id, 1, Utc::now(), Some(ada)).await),
        VoteError::AlreadyVoted
    );
    assert_eq!(counts(&store, post_id).await, vec![1, 0]);
}

#[tokio::test]
async fn anonymous_vote_needs_identity_when_unique() {
    let store = Arc::new(MemoryStore::new());
    let post_id = seed_poll(store.as_ref(), &["A", "B"], None).await;
    let service = vote_service(store.clone(), VotePolicy::default());

    assert_eq!(
        assert_err!(service.cast_vote(post_id, 0, Utc::now(), None).await),
        VoteError::VoterRequired
    );
    assert_eq!(counts(&store, post_id).await, vec![0, 0]);
}

#[tokio::test]
async fn unknown_post_is_not_found() {
    let store = Arc::new(MemoryStore::new());
    let service = vote_service(store, anonymous());
    assert_eq!(
        assert_err!(service.cast_vote(PostId::new(), 0, Utc::now(), None).await),
        VoteError::PollNotFound
    );
}

#[tokio::test]
async fn tally_reports_rounded_percentages() {
    let store = Arc::new(MemoryStore::new());
    let post_id = seed_poll(store.as_ref(), &["A", "B", "C"], None).await;
    let service = vote_service(store.clone(), anonymous());

    for index in [0, 1] {
        assert_ok!(service.cast_vote(post_id, index, Utc::now(), None).await);
    }
    let tally = assert_ok!(service.cast_vote(post_id, 2, Utc::now(), None).await);

    let percentages: Vec<u64> = tally.options.iter().map(|o| o.percentage).collect();
    assert_eq!(percentages, vec![33, 33, 33]);
    assert_eq!(tally.total_votes, 3);
}
