//! `POST /polls/{pollId}/vote` and its `/posts/{postId}/vote` alias.

use std::time::Instant;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use domains::PostId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use services::{PollTally, VoteError};

use crate::error::ApiError;
use crate::extractors::MaybeCaller;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VoteRequest {
    #[serde(default)]
    option_index: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct VoteResponse {
    pub success: bool,
    #[serde(flatten)]
    pub tally: PollTally,
}

/// The body is read raw so that malformed JSON and a missing index share one
/// 400 message.
fn parse_option_index(body: &[u8]) -> Result<i64, ApiError> {
    let request: VoteRequest =
        serde_json::from_slice(body).map_err(|_| ApiError::BadRequest("optionIndex is required"))?;

    match request.option_index {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().and_then(integral))
            .ok_or_else(|| VoteError::InvalidOption.into()),
        _ => Err(ApiError::BadRequest("optionIndex is required")),
    }
}

/// `1.0` addresses option 1. Fractions and values beyond `i64` address none.
fn integral(f: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, which is out of range.
    let in_range = f >= i64::MIN as f64 && f < i64::MAX as f64;
    (f.fract() == 0.0 && in_range).then_some(f as i64)
}

pub async fn cast_vote(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    MaybeCaller(caller): MaybeCaller,
    body: Bytes,
) -> Result<Json<VoteResponse>, ApiError> {
    let started = Instant::now();
    let result = vote(&state, &post_id, caller.map(|c| c.user_id), &body).await;

    let outcome = match &result {
        Ok(_) => "accepted",
        Err(e) => e.outcome(),
    };
    state.metrics.observe_vote(outcome, started.elapsed());

    result.map(|tally| Json(VoteResponse { success: true, tally }))
}

async fn vote(
    state: &AppState,
    post_id: &str,
    voter: Option<domains::UserId>,
    body: &[u8],
) -> Result<PollTally, ApiError> {
    let option_index = parse_option_index(body)?;
    let post_id: PostId = post_id.parse().map_err(|_| VoteError::PollNotFound)?;

    state
        .votes
        .cast_vote(post_id, option_index, Utc::now(), voter)
        .await
        .map_err(|e| {
            let retry_safe = state.votes.is_retry_safe();
            ApiError::vote(e, retry_safe)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> Result<i64, ApiError> {
        parse_option_index(body.as_bytes())
    }

    #[test]
    fn accepts_integer_indices() {
        assert_eq!(parse(r#"{"optionIndex": 2}"#).unwrap(), 2);
        assert_eq!(parse(r#"{"optionIndex": -1}"#).unwrap(), -1);
    }

    #[test]
    fn missing_or_non_numeric_index_is_a_bad_request() {
        for body in ["{}", r#"{"optionIndex": null}"#, r#"{"optionIndex": "1"}"#, "not json", ""] {
            assert!(
                matches!(parse(body), Err(ApiError::BadRequest("optionIndex is required"))),
                "body {body:?}"
            );
        }
    }

    #[test]
    fn integral_floats_are_indices() {
        assert_eq!(parse(r#"{"optionIndex": 1.0}"#).unwrap(), 1);
        assert_eq!(parse(r#"{"optionIndex": -0.0}"#).unwrap(), 0);
        assert_eq!(parse(r#"{"optionIndex": 2e0}"#).unwrap(), 2);
    }

    #[test]
    fn huge_floats_are_invalid_options() {
        assert!(matches!(
            parse(r#"{"optionIndex": 1e300}"#),
            Err(ApiError::Vote {
                source: VoteError::InvalidOption,
                ..
            })
        ));
    }

    #[test]
    fn fractional_index_is_an_invalid_option() {
        assert!(matches!(
            parse(r#"{"optionIndex": 1.5}"#),
            Err(ApiError::Vote {
                source: VoteError::InvalidOption,
                ..
            })
        ));
    }
}
