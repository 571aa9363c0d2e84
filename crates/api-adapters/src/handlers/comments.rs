use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use domains::Comment;
use serde::Deserialize;
use services::NewComment;

use super::parse_post_id;
use crate::error::ApiError;
use crate::extractors::{AuthCaller, JsonBody};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateCommentRequest {
    pub content: Option<String>,
    pub author_display_name: Option<String>,
    #[serde(rename = "authorPhotoURL")]
    pub author_photo_url: Option<String>,
}

/// Oldest first.
pub async fn list_comments(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> Result<Json<Vec<Comment>>, ApiError> {
    let post_id = parse_post_id(&post_id)?;
    Ok(Json(state.comments.list_comments(post_id).await?))
}

pub async fn create_comment(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    AuthCaller(caller): AuthCaller,
    JsonBody(req): JsonBody<CreateCommentRequest>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    let post_id = parse_post_id(&post_id)?;
    let input = NewComment {
        content: req.content.unwrap_or_default(),
        author_display_name: req.author_display_name,
        author_photo_url: req.author_photo_url,
    };

    let comment = state
        .comments
        .create_comment(&caller, post_id, input, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}
