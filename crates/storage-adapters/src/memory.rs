//! # In-memory store
//!
//! `dashmap`-backed implementation of every repository port. Used for local
//! development and tests. Nothing survives a restart.
//!
//! A vote holds the post's shard write guard for the whole check-and-count,
//! which makes increments on one post linearizable. Guards are never held
//! across an `.await` or while touching another map.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use domains::{
    Comment, CommentId, CommentRepository, Group, GroupId, GroupRepository, IncrementRequest,
    Poll, PollOption, Post, PostId, PostQuery, PostRepository, StoreError, UserId, VoteStore,
};

struct PostEntry {
    post: Post,
    voted_by: HashSet<UserId>,
}

#[derive(Default)]
pub struct MemoryStore {
    posts: DashMap<PostId, PostEntry>,
    comments: DashMap<CommentId, Comment>,
    groups: DashMap<GroupId, Group>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VoteStore for MemoryStore {
    async fn load_poll(&self, post_id: PostId) -> Result<Option<Poll>, StoreError> {
        Ok(self.posts.get(&post_id).map(|e| e.post.poll.clone()))
    }

    async fn atomic_increment(
        &self,
        request: IncrementRequest,
    ) -> Result<Vec<PollOption>, StoreError> {
        let mut guard = self
            .posts
            .get_mut(&request.post_id)
            .ok_or(StoreError::NotFound)?;
        let entry = guard.value_mut();

        if !entry.post.poll.is_open(request.now) {
            return Err(StoreError::Expired);
        }
        if request.option_index >= entry.post.poll.options.len() {
            return Err(StoreError::OptionOutOfRange);
        }
        if let Some(voter) = request.voter {
            if !entry.voted_by.insert(voter) {
                return Err(StoreError::AlreadyVoted);
            }
        }

        let option = &mut entry.post.poll.options[request.option_index];
        option.votes = option.votes.saturating_add(request.amount);
        entry.post.updated_at = request.now;

        Ok(entry.post.poll.options.clone())
    }
}

#[async_trait]
impl PostRepository for MemoryStore {
    async fn create_post(&self, post: Post) -> Result<(), StoreError> {
        self.posts.insert(
            post.id,
            PostEntry {
                post,
                voted_by: HashSet::new(),
            },
        );
        Ok(())
    }

    async fn get_post(&self, id: PostId) -> Result<Option<Post>, StoreError> {
        Ok(self.posts.get(&id).map(|e| e.post.clone()))
    }

    async fn list_posts(&self, query: PostQuery) -> Result<Vec<Post>, StoreError> {
        let mut posts: Vec<Post> = self
            .posts
            .iter()
            .filter(|e| e.post.group == query.group)
            .map(|e| e.post.clone())
            .collect();

        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        posts.truncate(query.limit as usize);
        Ok(posts)
    }

    async fn add_comment_ref(
        &self,
        post_id: PostId,
        comment_id: CommentId,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut entry = self.posts.get_mut(&post_id).ok_or(StoreError::NotFound)?;
        if !entry.post.comment_refs.contains(&comment_id) {
            entry.post.comment_refs.push(comment_id);
        }
        entry.post.updated_at = at;
        Ok(())
    }
}

#[async_trait]
impl CommentRepository for MemoryStore {
    async fn insert_comment(&self, comment: Comment) -> Result<(), StoreError> {
        self.comments.insert(comment.id, comment);
        Ok(())
    }

    async fn list_ordered(&self, post_id: PostId) -> Result<Vec<Comment>, StoreError> {
        let mut comments = self.list_unordered(post_id).await?;
        comments.sort_by_key(|c| c.created_at);
        Ok(comments)
    }

    async fn list_unordered(&self, post_id: PostId) -> Result<Vec<Comment>, StoreError> {
        Ok(self
            .comments
            .iter()
            .filter(|c| c.post_id == post_id)
            .map(|c| c.value().clone())
            .collect())
    }

    async fn get_many(&self, ids: Vec<CommentId>) -> Result<Vec<Comment>, StoreError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.comments.get(id).map(|c| c.value().clone()))
            .collect())
    }
}

#[async_trait]
impl GroupRepository for MemoryStore {
    async fn create_group(&self, group: Group) -> Result<(), StoreError> {
        self.groups.insert(group.id, group);
        Ok(())
    }

    async fn get_group(&self, id: GroupId) -> Result<Option<Group>, StoreError> {
        Ok(self.groups.get(&id).map(|g| g.value().clone()))
    }

    async fn list_groups(&self, limit: u32) -> Result<Vec<Group>, StoreError> {
        let mut groups: Vec<Group> = self.groups.iter().map(|g| g.value().clone()).collect();
        groups.sort_by(|a, b| a.name.cmp(&b.name));
        groups.truncate(limit as usize);
        Ok(groups)
    }

    async fn add_member(&self, id: GroupId, user: UserId) -> Result<(), StoreError> {
        let mut group = self.groups.get_mut(&id).ok_or(StoreError::NotFound)?;
        group.members.insert(user);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use chrono::TimeDelta;
    use domains::ExpiryOption;
    use tokio_test::{assert_err, assert_ok};

    fn post_with_poll(labels: &[&str], expires_at: Option<DateTime<Utc>>) -> Post {
        let now = Utc::now();
        Post {
            id: PostId::new(),
            author_id: UserId::new("author"),
            author_display_name: None,
            author_photo_url: None,
            content: "vote!".into(),
            media_urls: vec![],
            tags: vec![],
            group: None,
            poll: Poll::from_labels(labels.iter().copied(), expires_at),
            expiry_option: ExpiryOption::Never,
            comment_refs: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    fn vote(post_id: PostId, option_index: usize, voter: Option<&str>) -> IncrementRequest {
        IncrementRequest {
            post_id,
            option_index,
            amount: 1,
            voter: voter.map(UserId::new),
            now: Utc::now(),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_increments_are_not_lost() {
        let store = Arc::new(MemoryStore::new());
        let post = post_with_poll(&["a", "b", "c"], None);
        let post_id = post.id;
        store.create_post(post).await.unwrap();

        let handles: Vec<_> = (0..200)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(
                    async move { store.atomic_increment(vote(post_id, i % 3, None)).await },
                )
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let poll = store.load_poll(post_id).await.unwrap().unwrap();
        assert_eq!(poll.total_votes(), 200);
        assert_eq!(poll.options[0].votes, 67);
    }

    #[tokio::test]
    async fn duplicate_voter_does_not_increment() {
        let store = MemoryStore::new();
        let post = post_with_poll(&["a", "b"], None);
        let post_id = post.id;
        store.create_post(post).await.unwrap();

        assert_ok!(store.atomic_increment(vote(post_id, 0, Some("u1"))).await);
        let err = assert_err!(store.atomic_increment(vote(post_id, 1, Some("u1"))).await);
        assert_eq!(err, StoreError::AlreadyVoted);

        let poll = store.load_poll(post_id).await.unwrap().unwrap();
        assert_eq!(poll.total_votes(), 1);
    }

    #[tokio::test]
    async fn rejected_increment_does_not_consume_voter() {
        let store = MemoryStore::new();
        let post = post_with_poll(&["a"], None);
        let post_id = post.id;
        store.create_post(post).await.unwrap();

        let err = assert_err!(store.atomic_increment(vote(post_id, 3, Some("u1"))).await);
        assert_eq!(err, StoreError::OptionOutOfRange);
        assert_ok!(store.atomic_increment(vote(post_id, 0, Some("u1"))).await);
    }

    #[tokio::test]
    async fn expiry_guard_runs_inside_the_write() {
        let store = MemoryStore::new();
        let post = post_with_poll(&["a"], Some(Utc::now() - TimeDelta::seconds(1)));
        let post_id = post.id;
        store.create_post(post).await.unwrap();

        let err = assert_err!(store.atomic_increment(vote(post_id, 0, None)).await);
        assert_eq!(err, StoreError::Expired);
        assert_eq!(
            store.load_poll(post_id).await.unwrap().unwrap().total_votes(),
            0
        );
    }

    #[tokio::test]
    async fn unknown_post_is_not_found() {
        let store = MemoryStore::new();
        let err = assert_err!(store.atomic_increment(vote(PostId::new(), 0, None)).await);
        assert_eq!(err, StoreError::NotFound);
    }

    #[tokio::test]
    async fn feed_is_newest_first_and_scoped_by_group() {
        let store = MemoryStore::new();
        let mut old = post_with_poll(&[], None);
        old.created_at -= TimeDelta::minutes(5);
        let new = post_with_poll(&[], None);
        let mut grouped = post_with_poll(&[], None);
        grouped.group = Some(GroupId::new());

        for p in [old.clone(), new.clone(), grouped.clone()] {
            store.create_post(p).await.unwrap();
        }

        let feed = store
            .list_posts(PostQuery { group: None, limit: 10 })
            .await
            .unwrap();
        assert_eq!(feed.iter().map(|p| p.id).collect::<Vec<_>>(), vec![new.id, old.id]);

        let feed = store
            .list_posts(PostQuery { group: None, limit: 1 })
            .await
            .unwrap();
        assert_eq!(feed.len(), 1);

        let scoped = store
            .list_posts(PostQuery { group: grouped.group, limit: 10 })
            .await
            .unwrap();
        assert_eq!(scoped, vec![grouped]);
    }

    #[tokio::test]
    async fn joining_is_idempotent() {
        let store = MemoryStore::new();
        let group = Group::new("Readers", UserId::new("u1"));
        let id = group.id;
        store.create_group(group).await.unwrap();

        store.add_member(id, UserId::new("u2")).await.unwrap();
        store.add_member(id, UserId::new("u2")).await.unwrap();

        let group = store.get_group(id).await.unwrap().unwrap();
        assert_eq!(group.members.len(), 2);
        assert_eq!(
            store.add_member(GroupId::new(), UserId::new("u2")).await,
            Err(StoreError::NotFound)
        );
    }
}
