//! # Ports
//!
//! Any adapter must implement these traits to be wired into the binary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::{AuthError, StoreError};
use crate::models::{
    Caller, Comment, CommentId, Group, GroupId, Poll, PollOption, Post, PostId, UserId,
};

/// Everything the store needs to count one vote atomically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncrementRequest {
    pub post_id: PostId,
    pub option_index: usize,
    pub amount: u64,
    /// When set, the store must check-and-insert this voter in the same
    /// atomic operation as the increment.
    pub voter: Option<UserId>,
    /// Instant the expiry guard is evaluated against.
    pub now: DateTime<Utc>,
}

/// Durable vote counters.
///
/// Implementations must make [`VoteStore::atomic_increment`] linearizable
/// with respect to every other increment on the same post, regardless of how
/// many processes call it.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait VoteStore: Send + Sync {
    /// Snapshot of the poll embedded in `post_id`, for validation only.
    async fn load_poll(&self, post_id: PostId) -> Result<Option<Poll>, StoreError>;

    /// Adds `amount` to one option counter and returns the options as they
    /// stand after the write. Re-checks existence, bounds, expiry and (when
    /// `voter` is set) voter uniqueness inside the same operation.
    async fn atomic_increment(
        &self,
        request: IncrementRequest,
    ) -> Result<Vec<PollOption>, StoreError>;
}

/// Filter for feed and group listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostQuery {
    /// `None` selects the public feed.
    pub group: Option<GroupId>,
    pub limit: u32,
}

/// Data persistence contract for posts.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn create_post(&self, post: Post) -> Result<(), StoreError>;
    async fn get_post(&self, id: PostId) -> Result<Option<Post>, StoreError>;
    /// Newest first, at most `query.limit` posts.
    async fn list_posts(&self, query: PostQuery) -> Result<Vec<Post>, StoreError>;
    /// Appends to `comment_refs` and bumps `updated_at`.
    async fn add_comment_ref(
        &self,
        post_id: PostId,
        comment_id: CommentId,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn insert_comment(&self, comment: Comment) -> Result<(), StoreError>;
    /// Comments of a post, oldest first. May fail with
    /// [`StoreError::QueryUnsupported`] when the backend cannot sort.
    async fn list_ordered(&self, post_id: PostId) -> Result<Vec<Comment>, StoreError>;
    /// Comments of a post in storage order.
    async fn list_unordered(&self, post_id: PostId) -> Result<Vec<Comment>, StoreError>;
    /// Fetches by id; missing ids are skipped.
    async fn get_many(&self, ids: Vec<CommentId>) -> Result<Vec<Comment>, StoreError>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait GroupRepository: Send + Sync {
    async fn create_group(&self, group: Group) -> Result<(), StoreError>;
    async fn get_group(&self, id: GroupId) -> Result<Option<Group>, StoreError>;
    /// Ordered by name.
    async fn list_groups(&self, limit: u32) -> Result<Vec<Group>, StoreError>;
    /// Set-union of `user` into the members. Fails with `NotFound` for an
    /// unknown group.
    async fn add_member(&self, id: GroupId, user: UserId) -> Result<(), StoreError>;
}

/// Identity provider contract.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Validates a bearer token and returns the principal it names.
    async fn verify(&self, token: &str) -> Result<Caller, AuthError>;
}
