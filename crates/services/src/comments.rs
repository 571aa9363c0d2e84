//! Comments on posts.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use domains::{Caller, Comment, CommentId, CommentRepository, PostId, PostRepository, StoreError};
use tracing::{info, warn};

use crate::error::{Result, ServiceError};

#[derive(Debug, Clone, Default)]
pub struct NewComment {
    pub content: String,
    pub author_display_name: Option<String>,
    pub author_photo_url: Option<String>,
}

pub struct CommentService {
    comments: Arc<dyn CommentRepository>,
    posts: Arc<dyn PostRepository>,
}

impl CommentService {
    pub fn new(comments: Arc<dyn CommentRepository>, posts: Arc<dyn PostRepository>) -> Self {
        Self { comments, posts }
    }

    pub async fn create_comment(
        &self,
        caller: &Caller,
        post_id: PostId,
        input: NewComment,
        now: DateTime<Utc>,
    ) -> Result<Comment> {
        let content = input.content.trim();
        if content.is_empty() {
            return Err(ServiceError::validation("Content is required"));
        }

        self.posts
            .get_post(post_id)
            .await
            .map_err(ServiceError::store("create comment"))?
            .ok_or(ServiceError::NotFound("Post not found"))?;

        let comment = Comment {
            id: CommentId::new(),
            post_id,
            author_id: caller.user_id.clone(),
            author_display_name: input.author_display_name.or_else(|| caller.display_name.clone()),
            author_photo_url: input.author_photo_url.or_else(|| caller.photo_url.clone()),
            content: content.to_string(),
            created_at: now,
            updated_at: now,
        };

        self.comments
            .insert_comment(comment.clone())
            .await
            .map_err(ServiceError::store("create comment"))?;
        self.posts
            .add_comment_ref(post_id, comment.id, now)
            .await
            .map_err(ServiceError::store("create comment"))?;

        info!(%post_id, comment_id = %comment.id, "comment created");
        Ok(comment)
    }

    /// Comments of a post, oldest first.
    ///
    /// Prefers the store's ordered query. Backends that cannot serve it
    /// report `QueryUnsupported`, in which case the comments are gathered
    /// through the post's `comment_refs` and sorted here.
    pub async fn list_comments(&self, post_id: PostId) -> Result<Vec<Comment>> {
        let post = self
            .posts
            .get_post(post_id)
            .await
            .map_err(ServiceError::store("fetch comments"))?
            .ok_or(ServiceError::NotFound("Post not found"))?;

        match self.comments.list_ordered(post_id).await {
            Ok(comments) => Ok(comments),
            Err(StoreError::QueryUnsupported(reason)) => {
                warn!(%post_id, %reason, "ordered comment query unavailable, falling back");
                let mut comments = if post.comment_refs.is_empty() {
                    self.comments.list_unordered(post_id).await
                } else {
                    self.comments.get_many(post.comment_refs).await
                }
                .map_err(ServiceError::store("fetch comments"))?;

                comments.sort_by_key(|c| c.created_at);
                Ok(comments)
            }
            Err(e) => Err(ServiceError::store("fetch comments")(e)),
        }
    }
}
