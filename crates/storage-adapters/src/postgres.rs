//! # PostgreSQL store
//!
//! This module implements the data mapping between the relational model in
//! `migrations/` and the `domains` models.
//!
//! Poll counters live one row per option in `poll_options`, so a vote is an
//! additive `votes = votes + n` on a single row. The post row is locked
//! first, which serializes votes on the same poll and keeps the voter
//! insert, the expiry guard and the increment in one transaction.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domains::{
    Comment, CommentId, CommentRepository, ExpiryOption, Group, GroupId, GroupRepository,
    IncrementRequest, Poll, PollOption, Post, PostId, PostQuery, PostRepository, StoreError,
    UserId, VoteStore,
};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::info;
use uuid::Uuid;

const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";
const FOREIGN_KEY_VIOLATION: &str = "23503";

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await
            .map_err(map_err)?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        info!("database migrations applied");
        Ok(())
    }

    async fn options_for(
        &self,
        post_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<PollOption>>, StoreError> {
        let rows = sqlx::query(
            "SELECT post_id, label, votes FROM poll_options \
             WHERE post_id = ANY($1) ORDER BY post_id, idx",
        )
        .bind(post_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(map_err)?;

        let mut grouped: HashMap<Uuid, Vec<PollOption>> = HashMap::new();
        for row in rows {
            let post_id: Uuid = row.try_get("post_id").map_err(map_err)?;
            grouped.entry(post_id).or_default().push(option_from_row(&row)?);
        }
        Ok(grouped)
    }
}

/// Translates driver errors into port errors.
///
/// Pool exhaustion and I/O failures become `Unavailable` because a commit may
/// have been in flight.
fn map_err(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(err.to_string())
        }
        sqlx::Error::Database(db)
            if matches!(db.code().as_deref(), Some(SERIALIZATION_FAILURE | DEADLOCK_DETECTED)) =>
        {
            StoreError::Conflict
        }
        sqlx::Error::RowNotFound => StoreError::NotFound,
        _ => StoreError::Backend(err.to_string()),
    }
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some(FOREIGN_KEY_VIOLATION))
}

fn option_from_row(row: &PgRow) -> Result<PollOption, StoreError> {
    let votes: i64 = row.try_get("votes").map_err(map_err)?;
    Ok(PollOption {
        label: row.try_get("label").map_err(map_err)?,
        votes: u64::try_from(votes).unwrap_or_default(),
    })
}

fn post_from_row(row: &PgRow, options: Vec<PollOption>) -> Result<Post, StoreError> {
    let expiry: String = row.try_get("expiry_option").map_err(map_err)?;
    let group: Option<Uuid> = row.try_get("group_id").map_err(map_err)?;
    let refs: Vec<Uuid> = row.try_get("comment_refs").map_err(map_err)?;

    Ok(Post {
        id: PostId(row.try_get("id").map_err(map_err)?),
        author_id: UserId(row.try_get("author_id").map_err(map_err)?),
        author_display_name: row.try_get("author_display_name").map_err(map_err)?,
        author_photo_url: row.try_get("author_photo_url").map_err(map_err)?,
        content: row.try_get("content").map_err(map_err)?,
        media_urls: row.try_get("media_urls").map_err(map_err)?,
        tags: row.try_get("tags").map_err(map_err)?,
        group: group.map(GroupId),
        poll: Poll {
            options,
            expires_at: row.try_get("expires_at").map_err(map_err)?,
        },
        expiry_option: ExpiryOption::from_label(&expiry),
        comment_refs: refs.into_iter().map(CommentId).collect(),
        created_at: row.try_get("created_at").map_err(map_err)?,
        updated_at: row.try_get("updated_at").map_err(map_err)?,
    })
}

fn comment_from_row(row: &PgRow) -> Result<Comment, StoreError> {
    Ok(Comment {
        id: CommentId(row.try_get("id").map_err(map_err)?),
        post_id: PostId(row.try_get("post_id").map_err(map_err)?),
        author_id: UserId(row.try_get("author_id").map_err(map_err)?),
        author_display_name: row.try_get("author_display_name").map_err(map_err)?,
        author_photo_url: row.try_get("author_photo_url").map_err(map_err)?,
        content: row.try_get("content").map_err(map_err)?,
        created_at: row.try_get("created_at").map_err(map_err)?,
        updated_at: row.try_get("updated_at").map_err(map_err)?,
    })
}

fn group_from_row(row: &PgRow) -> Result<Group, StoreError> {
    let members: Vec<String> = row.try_get("members").map_err(map_err)?;
    Ok(Group {
        id: GroupId(row.try_get("id").map_err(map_err)?),
        name: row.try_get("name").map_err(map_err)?,
        members: members.into_iter().map(UserId).collect(),
    })
}

const POST_COLUMNS: &str = "id, author_id, author_display_name, author_photo_url, content, \
    media_urls, tags, group_id, expiry_option, expires_at, comment_refs, created_at, updated_at";

const COMMENT_COLUMNS: &str = "id, post_id, author_id, author_display_name, author_photo_url, \
    content, created_at, updated_at";

const GROUP_SELECT: &str = "SELECT g.id, g.name, \
    COALESCE(array_agg(m.user_id) FILTER (WHERE m.user_id IS NOT NULL), '{}') AS members \
    FROM groups g LEFT JOIN group_members m ON m.group_id = g.id";

#[async_trait]
impl VoteStore for PgStore {
    async fn load_poll(&self, post_id: PostId) -> Result<Option<Poll>, StoreError> {
        let expires_at: Option<Option<DateTime<Utc>>> =
            sqlx::query_scalar("SELECT expires_at FROM posts WHERE id = $1")
                .bind(post_id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(map_err)?;

        let Some(expires_at) = expires_at else {
            return Ok(None);
        };

        let options = self
            .options_for(&[post_id.as_uuid()])
            .await?
            .remove(&post_id.as_uuid())
            .unwrap_or_default();

        Ok(Some(Poll { options, expires_at }))
    }

    /// One transaction: lock the post, guard expiry, record the voter, add to
    /// one counter, read the result. Any early return drops `tx`, which rolls
    /// everything back.
    async fn atomic_increment(
        &self,
        request: IncrementRequest,
    ) -> Result<Vec<PollOption>, StoreError> {
        let index = i16::try_from(request.option_index).map_err(|_| StoreError::OptionOutOfRange)?;
        let amount = i64::try_from(request.amount).map_err(|e| StoreError::Backend(e.to_string()))?;
        let post_id = request.post_id.as_uuid();

        let mut tx = self.pool.begin().await.map_err(map_err)?;

        let expires_at: Option<Option<DateTime<Utc>>> = sqlx::query_scalar(
            "UPDATE posts SET updated_at = $2 WHERE id = $1 RETURNING expires_at",
        )
        .bind(post_id)
        .bind(request.now)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_err)?;

        match expires_at {
            None => return Err(StoreError::NotFound),
            Some(Some(at)) if request.now >= at => return Err(StoreError::Expired),
            Some(_) => {}
        }

        // Bounds first, so a bad index never consumes the voter's one vote.
        let in_range: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM poll_options WHERE post_id = $1 AND idx = $2)",
        )
        .bind(post_id)
        .bind(index)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_err)?;
        if !in_range {
            return Err(StoreError::OptionOutOfRange);
        }

        if let Some(voter) = &request.voter {
            let inserted = sqlx::query(
                "INSERT INTO poll_voters (post_id, voter_id, voted_at) VALUES ($1, $2, $3) \
                 ON CONFLICT (post_id, voter_id) DO NOTHING",
            )
            .bind(post_id)
            .bind(voter.as_str())
            .bind(request.now)
            .execute(&mut *tx)
            .await
            .map_err(map_err)?;

            if inserted.rows_affected() == 0 {
                return Err(StoreError::AlreadyVoted);
            }
        }

        sqlx::query("UPDATE poll_options SET votes = votes + $3 WHERE post_id = $1 AND idx = $2")
            .bind(post_id)
            .bind(index)
            .bind(amount)
            .execute(&mut *tx)
            .await
            .map_err(map_err)?;

        let options =
            sqlx::query("SELECT label, votes FROM poll_options WHERE post_id = $1 ORDER BY idx")
                .bind(post_id)
                .fetch_all(&mut *tx)
                .await
                .map_err(map_err)?
                .iter()
                .map(option_from_row)
                .collect::<Result<Vec<_>, _>>()?;

        tx.commit().await.map_err(map_err)?;
        Ok(options)
    }
}

#[async_trait]
impl PostRepository for PgStore {
    /// Inserts the post and its options atomically, so a post never exists
    /// with a partial poll.
    async fn create_post(&self, post: Post) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_err)?;

        let refs: Vec<Uuid> = post.comment_refs.iter().map(CommentId::as_uuid).collect();
        sqlx::query(
            "INSERT INTO posts (id, author_id, author_display_name, author_photo_url, content, \
             media_urls, tags, group_id, expiry_option, expires_at, comment_refs, created_at, \
             updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(post.id.as_uuid())
        .bind(post.author_id.as_str())
        .bind(&post.author_display_name)
        .bind(&post.author_photo_url)
        .bind(&post.content)
        .bind(&post.media_urls)
        .bind(&post.tags)
        .bind(post.group.map(|g| g.as_uuid()))
        .bind(post.expiry_option.as_str())
        .bind(post.poll.expires_at)
        .bind(&refs)
        .bind(post.created_at)
        .bind(post.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(map_err)?;

        for (idx, option) in post.poll.options.iter().enumerate() {
            let idx = i16::try_from(idx).map_err(|e| StoreError::Backend(e.to_string()))?;
            let votes =
                i64::try_from(option.votes).map_err(|e| StoreError::Backend(e.to_string()))?;
            sqlx::query(
                "INSERT INTO poll_options (post_id, idx, label, votes) VALUES ($1, $2, $3, $4)",
            )
            .bind(post.id.as_uuid())
            .bind(idx)
            .bind(&option.label)
            .bind(votes)
            .execute(&mut *tx)
            .await
            .map_err(map_err)?;
        }

        tx.commit().await.map_err(map_err)?;
        Ok(())
    }

    async fn get_post(&self, id: PostId) -> Result<Option<Post>, StoreError> {
        let row = sqlx::query(&format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let options = self
            .options_for(&[id.as_uuid()])
            .await?
            .remove(&id.as_uuid())
            .unwrap_or_default();
        post_from_row(&row, options).map(Some)
    }

    async fn list_posts(&self, query: PostQuery) -> Result<Vec<Post>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE group_id IS NOT DISTINCT FROM $1 \
             ORDER BY created_at DESC LIMIT $2"
        ))
        .bind(query.group.map(|g| g.as_uuid()))
        .bind(i64::from(query.limit))
        .fetch_all(&self.pool)
        .await
        .map_err(map_err)?;

        let ids = rows
            .iter()
            .map(|r| r.try_get::<Uuid, _>("id"))
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_err)?;
        let mut options = self.options_for(&ids).await?;

        rows.iter()
            .zip(ids)
            .map(|(row, id)| post_from_row(row, options.remove(&id).unwrap_or_default()))
            .collect()
    }

    async fn add_comment_ref(
        &self,
        post_id: PostId,
        comment_id: CommentId,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE posts SET comment_refs = CASE WHEN $2 = ANY(comment_refs) THEN comment_refs \
             ELSE array_append(comment_refs, $2) END, updated_at = $3 WHERE id = $1",
        )
        .bind(post_id.as_uuid())
        .bind(comment_id.as_uuid())
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl CommentRepository for PgStore {
    async fn insert_comment(&self, comment: Comment) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "INSERT INTO comments ({COMMENT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"
        ))
        .bind(comment.id.as_uuid())
        .bind(comment.post_id.as_uuid())
        .bind(comment.author_id.as_str())
        .bind(&comment.author_display_name)
        .bind(&comment.author_photo_url)
        .bind(&comment.content)
        .bind(comment.created_at)
        .bind(comment.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                StoreError::NotFound
            } else {
                map_err(e)
            }
        })?;
        Ok(())
    }

    async fn list_ordered(&self, post_id: PostId) -> Result<Vec<Comment>, StoreError> {
        sqlx::query(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE post_id = $1 ORDER BY created_at ASC"
        ))
        .bind(post_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(map_err)?
        .iter()
        .map(comment_from_row)
        .collect()
    }

    async fn list_unordered(&self, post_id: PostId) -> Result<Vec<Comment>, StoreError> {
        sqlx::query(&format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE post_id = $1"))
            .bind(post_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(map_err)?
            .iter()
            .map(comment_from_row)
            .collect()
    }

    async fn get_many(&self, ids: Vec<CommentId>) -> Result<Vec<Comment>, StoreError> {
        let ids: Vec<Uuid> = ids.iter().map(CommentId::as_uuid).collect();
        sqlx::query(&format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = ANY($1)"))
            .bind(&ids)
            .fetch_all(&self.pool)
            .await
            .map_err(map_err)?
            .iter()
            .map(comment_from_row)
            .collect()
    }
}

#[async_trait]
impl GroupRepository for PgStore {
    async fn create_group(&self, group: Group) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_err)?;

        sqlx::query("INSERT INTO groups (id, name) VALUES ($1, $2)")
            .bind(group.id.as_uuid())
            .bind(&group.name)
            .execute(&mut *tx)
            .await
            .map_err(map_err)?;

        for member in &group.members {
            sqlx::query("INSERT INTO group_members (group_id, user_id) VALUES ($1, $2)")
                .bind(group.id.as_uuid())
                .bind(member.as_str())
                .execute(&mut *tx)
                .await
                .map_err(map_err)?;
        }

        tx.commit().await.map_err(map_err)?;
        Ok(())
    }

    async fn get_group(&self, id: GroupId) -> Result<Option<Group>, StoreError> {
        let row = sqlx::query(&format!("{GROUP_SELECT} WHERE g.id = $1 GROUP BY g.id, g.name"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)?;
        row.as_ref().map(group_from_row).transpose()
    }

    async fn list_groups(&self, limit: u32) -> Result<Vec<Group>, StoreError> {
        sqlx::query(&format!("{GROUP_SELECT} GROUP BY g.id, g.name ORDER BY g.name LIMIT $1"))
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(map_err)?
            .iter()
            .map(group_from_row)
            .collect()
    }

    async fn add_member(&self, id: GroupId, user: UserId) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO group_members (group_id, user_id) VALUES ($1, $2) \
             ON CONFLICT (group_id, user_id) DO NOTHING",
        )
        .bind(id.as_uuid())
        .bind(user.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                StoreError::NotFound
            } else {
                map_err(e)
            }
        })?;
        Ok(())
    }
}
