pub mod comments;
pub mod groups;
pub mod health;
pub mod posts;
pub mod votes;

use domains::{GroupId, PostId};

use crate::error::ApiError;
use services::ServiceError;

/// Path ids that do not parse name nothing, so they are reported as missing.
pub(crate) fn parse_post_id(raw: &str) -> Result<PostId, ApiError> {
    raw.parse::<PostId>()
        .map_err(|_| ServiceError::NotFound("Post not found").into())
}

/// `"default"` and the empty string select the public feed.
pub(crate) fn parse_group(raw: Option<&str>) -> Result<Option<GroupId>, ApiError> {
    match raw.map(str::trim) {
        None | Some("") | Some("default") => Ok(None),
        Some(raw) => raw
            .parse::<GroupId>()
            .map(Some)
            .map_err(|_| ServiceError::NotFound("Group not found").into()),
    }
}
