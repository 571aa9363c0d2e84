//! # Domain Models
//!
//! These structs represent the core entities of Give. Field names are
//! serialized in camelCase because that is what the web client consumes.

pub mod comment;
pub mod group;
pub mod ids;
pub mod poll;
pub mod post;

pub use comment::Comment;
pub use group::Group;
pub use ids::{CommentId, GroupId, PostId, UserId};
pub use poll::{Poll, PollOption, VoteRejection, MAX_POLL_OPTIONS};
pub use post::{ExpiryOption, Post};

/// The authenticated principal behind a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: UserId,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
}

impl Caller {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: UserId::new(user_id),
            display_name: None,
            photo_url: None,
        }
    }
}
