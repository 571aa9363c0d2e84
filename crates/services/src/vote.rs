//! # Vote Service
//!
//! The only mutation entry point for poll counts. A call loads a snapshot to
//! validate against, then hands a single atomic increment to the store. The
//! snapshot is never written back.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use domains::{IncrementRequest, PostId, StoreError, UserId, VoteRejection, VoteStore};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::projector::{project, PollTally};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VoteError {
    #[error("Invalid poll option")]
    InvalidOption,

    #[error("Poll has expired")]
    PollExpired,

    #[error("Post not found")]
    PollNotFound,

    #[error("Already voted")]
    AlreadyVoted,

    /// Voter uniqueness is on and the call carried no identity.
    #[error("Authentication required")]
    VoterRequired,

    /// Contention outlasted the retry budget. Nothing was counted.
    #[error("vote not recorded after {attempts} attempts")]
    TransientFailure { attempts: u32 },

    /// The store could not be read before any write was attempted.
    #[error("store unreachable before voting: {0}")]
    StoreUnreachable(String),

    /// The store stopped answering mid-write; the vote may have been counted.
    #[error("vote outcome unknown: {0}")]
    OutcomeUnknown(String),

    #[error("store failure: {0}")]
    Store(String),
}

impl VoteError {
    /// Short label used for logs and metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::InvalidOption => "invalid_option",
            Self::PollExpired => "expired",
            Self::PollNotFound => "not_found",
            Self::AlreadyVoted => "already_voted",
            Self::VoterRequired => "unauthenticated",
            Self::TransientFailure { .. } | Self::StoreUnreachable(_) => "transient",
            Self::OutcomeUnknown(_) => "unknown",
            Self::Store(_) => "error",
        }
    }

    /// Rejections are final answers about the request itself.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::InvalidOption
                | Self::PollExpired
                | Self::PollNotFound
                | Self::AlreadyVoted
                | Self::VoterRequired
        )
    }
}

impl From<VoteRejection> for VoteError {
    fn from(rejection: VoteRejection) -> Self {
        match rejection {
            VoteRejection::InvalidOption => Self::InvalidOption,
            VoteRejection::PollExpired => Self::PollExpired,
        }
    }
}

impl From<StoreError> for VoteError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::PollNotFound,
            StoreError::OptionOutOfRange => Self::InvalidOption,
            StoreError::Expired => Self::PollExpired,
            StoreError::AlreadyVoted => Self::AlreadyVoted,
            StoreError::Conflict => Self::TransientFailure { attempts: 1 },
            StoreError::Unavailable(msg) => Self::OutcomeUnknown(msg),
            StoreError::QueryUnsupported(msg) | StoreError::Backend(msg) => Self::Store(msg),
        }
    }
}

/// Bounded exponential backoff for store conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    /// Delay before attempt `attempt + 1`, where `attempt` starts at 1.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VotePolicy {
    /// One counted vote per identity per poll.
    pub unique_voters: bool,
    pub retry: RetryPolicy,
}

impl Default for VotePolicy {
    fn default() -> Self {
        Self {
            unique_voters: true,
            retry: RetryPolicy::default(),
        }
    }
}

pub struct VoteService {
    store: Arc<dyn VoteStore>,
    policy: VotePolicy,
}

impl VoteService {
    pub fn new(store: Arc<dyn VoteStore>, policy: VotePolicy) -> Self {
        Self { store, policy }
    }

    /// Whether a caller may repeat a failed call without risking a double
    /// count. Only true when the store deduplicates by voter.
    pub fn is_retry_safe(&self) -> bool {
        self.policy.unique_voters
    }

    /// Counts one vote for `option_index` on the poll of `post_id`.
    ///
    /// Exactly one counter is incremented when this returns `Ok`; nothing is
    /// written on any rejection.
    pub async fn cast_vote(
        &self,
        post_id: PostId,
        option_index: i64,
        now: DateTime<Utc>,
        voter: Option<UserId>,
    ) -> Result<PollTally, VoteError> {
        let started = Instant::now();
        let mut attempts = 0;
        let result = self.try_cast(post_id, option_index, now, voter, &mut attempts).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(tally) => info!(
                %post_id, option_index, attempts, latency_ms,
                total_votes = tally.total_votes,
                outcome = "accepted",
                "vote cast"
            ),
            Err(e) if e.is_rejection() => info!(
                %post_id, option_index, attempts, latency_ms,
                outcome = e.outcome(),
                "vote rejected"
            ),
            Err(
                e @ (VoteError::TransientFailure { .. }
                | VoteError::StoreUnreachable(_)
                | VoteError::OutcomeUnknown(_)),
            ) => warn!(
                %post_id, option_index, attempts, latency_ms,
                outcome = e.outcome(),
                error = %e,
                "vote not confirmed"
            ),
            Err(e) => error!(
                %post_id, option_index, attempts, latency_ms,
                outcome = e.outcome(),
                error = %e,
                "vote failed"
            ),
        }

        result
    }

    async fn try_cast(
        &self,
        post_id: PostId,
        option_index: i64,
        now: DateTime<Utc>,
        voter: Option<UserId>,
        attempts: &mut u32,
    ) -> Result<PollTally, VoteError> {
        let poll = self
            .store
            .load_poll(post_id)
            .await
            .map_err(|e| match e {
                // Nothing has been written yet.
                StoreError::Unavailable(msg) => VoteError::StoreUnreachable(msg),
                other => other.into(),
            })?
            .ok_or(VoteError::PollNotFound)?;

        let index = poll.validate_vote(option_index, now)?;

        let voter = match (self.policy.unique_voters, voter) {
            (true, Some(voter)) => Some(voter),
            (true, None) => return Err(VoteError::VoterRequired),
            (false, _) => None,
        };

        let request = IncrementRequest {
            post_id,
            option_index: index,
            amount: 1,
            voter,
            now,
        };

        let retry = self.policy.retry;
        loop {
            *attempts += 1;
            match self.store.atomic_increment(request.clone()).await {
                Ok(options) => return Ok(project(&options)),
                Err(StoreError::Conflict) if *attempts < retry.max_attempts => {
                    let delay = retry.backoff(*attempts);
                    debug!(%post_id, attempt = *attempts, ?delay, "increment conflict, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(StoreError::Conflict) => {
                    return Err(VoteError::TransientFailure { attempts: *attempts })
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
