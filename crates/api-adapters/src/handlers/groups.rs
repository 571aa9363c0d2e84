use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use domains::Group;
use serde::Deserialize;
use serde_json::{json, Value};
use services::ServiceError;

use super::parse_group;
use crate::error::ApiError;
use crate::extractors::{AuthCaller, JsonBody};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateGroupRequest {
    /// The group name. Older clients send it as `content`.
    #[serde(alias = "name")]
    pub content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct JoinGroupRequest {
    #[serde(rename = "groupId", alias = "dId")]
    pub group_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ListGroupsQuery {
    pub limit_count: Option<String>,
}

pub async fn create_group(
    State(state): State<AppState>,
    AuthCaller(caller): AuthCaller,
    JsonBody(req): JsonBody<CreateGroupRequest>,
) -> Result<(StatusCode, Json<Group>), ApiError> {
    let name = req.content.unwrap_or_default();
    let group = state.groups.create_group(&caller, &name).await?;
    Ok((StatusCode::CREATED, Json(group)))
}

pub async fn list_groups(
    State(state): State<AppState>,
    Query(query): Query<ListGroupsQuery>,
) -> Result<Json<Vec<Group>>, ApiError> {
    let limit = query.limit_count.and_then(|raw| raw.trim().parse().ok());
    Ok(Json(state.groups.list_groups(limit).await?))
}

pub async fn join_group(
    State(state): State<AppState>,
    AuthCaller(caller): AuthCaller,
    JsonBody(req): JsonBody<JoinGroupRequest>,
) -> Result<Json<Value>, ApiError> {
    let group_id = parse_group(req.group_id.as_deref())?
        .ok_or(ServiceError::validation("groupId is required"))?;

    state.groups.join_group(&caller, group_id).await?;
    Ok(Json(json!({ "success": true })))
}
