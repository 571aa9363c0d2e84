//! # Poll Aggregate
//!
//! A poll is embedded in its parent post and created together with it. The
//! option set is fixed at creation; only the per-option counts change, and
//! only through the vote store's atomic increment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound on the number of options a poll may carry.
pub const MAX_POLL_OPTIONS: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOption {
    pub label: String,
    pub votes: u64,
}

impl PollOption {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            votes: 0,
        }
    }
}

/// Why a vote was refused before reaching the store.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteRejection {
    #[error("Invalid poll option")]
    InvalidOption,

    #[error("Poll has expired")]
    PollExpired,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Poll {
    /// Ordered options. The position is the option index used for voting.
    #[serde(rename = "polls")]
    pub options: Vec<PollOption>,
    /// When set and passed, the poll is closed to new votes.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Poll {
    /// Builds the poll for a new post from raw user labels.
    ///
    /// Only the first [`MAX_POLL_OPTIONS`] labels are considered; blank
    /// labels among them are dropped rather than replaced.
    pub fn from_labels<I, S>(labels: I, expires_at: Option<DateTime<Utc>>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let options = labels
            .into_iter()
            .take(MAX_POLL_OPTIONS)
            .map(|label| label.as_ref().trim().to_string())
            .filter(|label| !label.is_empty())
            .map(PollOption::new)
            .collect();

        Self {
            options,
            expires_at,
        }
    }

    pub fn total_votes(&self) -> u64 {
        self.options.iter().map(|o| o.votes).sum()
    }

    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now < expires_at,
            None => true,
        }
    }

    /// Decides whether a vote for `option_index` may be counted at `now`.
    ///
    /// Expiry is checked first: a closed poll reports `PollExpired` even for
    /// an out-of-range index. On success the index is returned as a `usize`.
    pub fn validate_vote(
        &self,
        option_index: i64,
        now: DateTime<Utc>,
    ) -> Result<usize, VoteRejection> {
        if !self.is_open(now) {
            return Err(VoteRejection::PollExpired);
        }

        usize::try_from(option_index)
            .ok()
            .filter(|&index| index < self.options.len())
            .ok_or(VoteRejection::InvalidOption)
    }
}
