use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use domains::{ExpiryOption, Post};
use serde::Deserialize;
use services::{ListPosts, NewPost};

use super::{parse_group, parse_post_id};
use crate::error::ApiError;
use crate::extractors::{AuthCaller, JsonBody, MaybeCaller};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PollOptionInput {
    pub label: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CreatePostRequest {
    pub content: Option<String>,
    pub media_urls: Vec<String>,
    pub tags: Vec<String>,
    pub polls: Vec<PollOptionInput>,
    #[serde(alias = "groupId")]
    pub group: Option<String>,
    pub expiry_option: Option<String>,
    pub author_display_name: Option<String>,
    #[serde(rename = "authorPhotoURL")]
    pub author_photo_url: Option<String>,
}

/// Query values arrive as strings; unparsable ones fall back to defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ListPostsQuery {
    pub limit_count: Option<String>,
    pub group_id: Option<String>,
    pub exclude_expired: Option<String>,
}

pub async fn create_post(
    State(state): State<AppState>,
    AuthCaller(caller): AuthCaller,
    JsonBody(req): JsonBody<CreatePostRequest>,
) -> Result<(StatusCode, Json<Post>), ApiError> {
    let input = NewPost {
        content: req.content.unwrap_or_default(),
        media_urls: req.media_urls,
        tags: req.tags,
        poll_labels: req.polls.into_iter().filter_map(|p| p.label).collect(),
        group: parse_group(req.group.as_deref())?,
        expiry: req
            .expiry_option
            .as_deref()
            .map(ExpiryOption::from_label)
            .unwrap_or_default(),
        author_display_name: req.author_display_name,
        author_photo_url: req.author_photo_url,
    };

    let post = state.posts.create_post(&caller, input, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn list_posts(
    State(state): State<AppState>,
    MaybeCaller(caller): MaybeCaller,
    Query(query): Query<ListPostsQuery>,
) -> Result<Json<Vec<Post>>, ApiError> {
    let list = ListPosts {
        group: parse_group(query.group_id.as_deref())?,
        limit: query.limit_count.and_then(|raw| raw.trim().parse().ok()),
        exclude_expired: query.exclude_expired.as_deref().map_or(true, |v| v == "true"),
    };

    let posts = state.posts.list_posts(caller.as_ref(), list, Utc::now()).await?;
    Ok(Json(posts))
}

pub async fn get_post(
    State(state): State<AppState>,
    MaybeCaller(caller): MaybeCaller,
    Path(post_id): Path<String>,
) -> Result<Json<Post>, ApiError> {
    let post_id = parse_post_id(&post_id)?;
    let post = state.posts.get_post(caller.as_ref(), post_id).await?;
    Ok(Json(post))
}
