use std::sync::Arc;

use domains::{CommentRepository, GroupRepository, IdentityVerifier, PostRepository, VoteStore};
use services::{CommentService, GroupService, PostService, VotePolicy, VoteService};

use crate::metrics::ApiMetrics;

/// Shared by every handler. Cloning copies `Arc`s only.
#[derive(Clone)]
pub struct AppState {
    pub votes: Arc<VoteService>,
    pub posts: Arc<PostService>,
    pub comments: Arc<CommentService>,
    pub groups: Arc<GroupService>,
    pub identity: Arc<dyn IdentityVerifier>,
    pub metrics: Arc<ApiMetrics>,
}

impl AppState {
    /// Wires every service over one store that implements all ports.
    pub fn new<S>(store: Arc<S>, identity: Arc<dyn IdentityVerifier>, policy: VotePolicy) -> Self
    where
        S: VoteStore + PostRepository + CommentRepository + GroupRepository + 'static,
    {
        let groups = Arc::new(GroupService::new(store.clone()));
        Self {
            votes: Arc::new(VoteService::new(store.clone(), policy)),
            posts: Arc::new(PostService::new(store.clone(), groups.clone())),
            comments: Arc::new(CommentService::new(store.clone(), store)),
            groups,
            identity,
            metrics: Arc::new(ApiMetrics::new()),
        }
    }
}
