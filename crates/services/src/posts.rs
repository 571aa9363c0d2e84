//! Post creation and feed listing.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use domains::{
    Caller, ExpiryOption, GroupId, Poll, Post, PostId, PostQuery, PostRepository,
};
use tracing::info;

use crate::error::{Result, ServiceError};
use crate::groups::GroupService;

pub const DEFAULT_POST_LIMIT: u32 = 10;
pub const MAX_POST_LIMIT: u32 = 100;

/// Author-supplied fields of a new post.
#[derive(Debug, Clone, Default)]
pub struct NewPost {
    pub content: String,
    pub media_urls: Vec<String>,
    pub tags: Vec<String>,
    pub poll_labels: Vec<String>,
    pub group: Option<GroupId>,
    pub expiry: ExpiryOption,
    /// Overrides the display name carried by the token.
    pub author_display_name: Option<String>,
    pub author_photo_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListPosts {
    pub group: Option<GroupId>,
    pub limit: Option<u32>,
    pub exclude_expired: bool,
}

impl Default for ListPosts {
    fn default() -> Self {
        Self {
            group: None,
            limit: None,
            exclude_expired: true,
        }
    }
}

pub struct PostService {
    repo: Arc<dyn PostRepository>,
    groups: Arc<GroupService>,
}

impl PostService {
    pub fn new(repo: Arc<dyn PostRepository>, groups: Arc<GroupService>) -> Self {
        Self { repo, groups }
    }

    /// Creates a post together with its poll. The poll's options are fixed
    /// from here on.
    pub async fn create_post(
        &self,
        caller: &Caller,
        input: NewPost,
        now: DateTime<Utc>,
    ) -> Result<Post> {
        let content = input.content.trim();
        if content.is_empty() {
            return Err(ServiceError::validation("Content is required"));
        }

        if let Some(group_id) = input.group {
            self.groups.require_member(Some(caller), group_id).await?;
        }

        let post = Post {
            id: PostId::new(),
            author_id: caller.user_id.clone(),
            author_display_name: input.author_display_name.or_else(|| caller.display_name.clone()),
            author_photo_url: input.author_photo_url.or_else(|| caller.photo_url.clone()),
            content: content.to_string(),
            media_urls: input.media_urls,
            tags: input.tags,
            group: input.group,
            poll: Poll::from_labels(&input.poll_labels, input.expiry.expires_at(now)),
            expiry_option: input.expiry,
            comment_refs: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        self.repo
            .create_post(post.clone())
            .await
            .map_err(ServiceError::store("create post"))?;

        info!(
            post_id = %post.id,
            author = %post.author_id,
            poll_options = post.poll.options.len(),
            expiry = post.expiry_option.as_str(),
            "post created"
        );
        Ok(post)
    }

    /// Newest posts of the public feed or of one group.
    pub async fn list_posts(
        &self,
        caller: Option<&Caller>,
        query: ListPosts,
        now: DateTime<Utc>,
    ) -> Result<Vec<Post>> {
        if let Some(group_id) = query.group {
            self.groups.require_member(caller, group_id).await?;
        }

        let limit = query.limit.unwrap_or(DEFAULT_POST_LIMIT).clamp(1, MAX_POST_LIMIT);
        let mut posts = self
            .repo
            .list_posts(PostQuery {
                group: query.group,
                limit,
            })
            .await
            .map_err(ServiceError::store("fetch posts"))?;

        if query.exclude_expired {
            posts.retain(|p| !p.is_expired(now));
        }
        Ok(posts)
    }

    /// One post. A group post is subject to the same membership check as
    /// the group feed.
    pub async fn get_post(&self, caller: Option<&Caller>, id: PostId) -> Result<Post> {
        let post = self
            .repo
            .get_post(id)
            .await
            .map_err(ServiceError::store("fetch post"))?
            .ok_or(ServiceError::NotFound("Post not found"))?;

        if let Some(group_id) = post.group {
            self.groups.require_member(caller, group_id).await?;
        }
        Ok(post)
    }
}
