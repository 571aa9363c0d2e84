//! # services
//!
//! Use cases of Give. Each service owns its ports as `Arc<dyn Trait>` and is
//! itself shared by the HTTP layer.

pub mod comments;
pub mod error;
pub mod groups;
pub mod posts;
pub mod projector;
pub mod vote;

pub use comments::{CommentService, NewComment};
pub use error::ServiceError;
pub use groups::GroupService;
pub use posts::{ListPosts, NewPost, PostService};
pub use projector::{PollTally, ProjectedOption};
pub use vote::{RetryPolicy, VoteError, VotePolicy, VoteService};
