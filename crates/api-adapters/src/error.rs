//! # ApiError
//!
//! Maps service failures onto HTTP status codes and `{ "error": ... }`
//! bodies. Store details are logged here and never serialized.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use services::{ServiceError, VoteError};
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(&'static str),

    #[error("Authentication required")]
    Unauthenticated,

    /// `retry_safe` tells the client whether repeating the call could count
    /// the vote twice.
    #[error("{source}")]
    Vote { source: VoteError, retry_safe: bool },

    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl ApiError {
    pub fn vote(source: VoteError, retry_safe: bool) -> Self {
        Self::Vote { source, retry_safe }
    }

    /// Metrics label for a failed vote request.
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::Unauthenticated => "unauthenticated",
            Self::Vote { source, .. } => source.outcome(),
            Self::Service(_) => "error",
        }
    }
}

impl From<VoteError> for ApiError {
    fn from(source: VoteError) -> Self {
        Self::vote(source, false)
    }
}

fn body(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(msg) => body(StatusCode::BAD_REQUEST, msg),
            Self::Unauthenticated => body(StatusCode::UNAUTHORIZED, "Authentication required"),
            Self::Vote { source, retry_safe } => vote_response(source, retry_safe),
            Self::Service(err) => service_response(err),
        }
    }
}

fn vote_response(err: VoteError, retry_safe: bool) -> Response {
    let status = match &err {
        VoteError::InvalidOption | VoteError::PollExpired => StatusCode::BAD_REQUEST,
        VoteError::VoterRequired => StatusCode::UNAUTHORIZED,
        VoteError::PollNotFound => StatusCode::NOT_FOUND,
        VoteError::AlreadyVoted => StatusCode::CONFLICT,
        VoteError::TransientFailure { .. } | VoteError::StoreUnreachable(_) => {
            // Nothing was committed.
            let body = json!({ "error": "Vote not recorded, please retry", "retrySafe": true });
            return (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response();
        }
        VoteError::OutcomeUnknown(_) => {
            let body = json!({ "error": "Vote outcome unknown", "retrySafe": retry_safe });
            return (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response();
        }
        VoteError::Store(_) => {
            return body(StatusCode::INTERNAL_SERVER_ERROR, "Failed to record vote");
        }
    };
    body(status, err.to_string())
}

fn service_response(err: ServiceError) -> Response {
    let status = match &err {
        ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
        ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::Unauthenticated => StatusCode::UNAUTHORIZED,
        ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
        ServiceError::Store { action, source } => {
            error!(action, error = %source, "store failure");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    body(status, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use domains::StoreError;
    use serde_json::Value;

    async fn render(err: ApiError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn vote_rejections_map_to_client_errors() {
        let cases = [
            (VoteError::InvalidOption, StatusCode::BAD_REQUEST, "Invalid poll option"),
            (VoteError::PollExpired, StatusCode::BAD_REQUEST, "Poll has expired"),
            (VoteError::PollNotFound, StatusCode::NOT_FOUND, "Post not found"),
            (VoteError::AlreadyVoted, StatusCode::CONFLICT, "Already voted"),
            (VoteError::VoterRequired, StatusCode::UNAUTHORIZED, "Authentication required"),
        ];
        for (err, status, message) in cases {
            let (got, body) = render(err.into()).await;
            assert_eq!(got, status);
            assert_eq!(body["error"], message);
        }
    }

    #[tokio::test]
    async fn unknown_outcome_reports_retry_safety() {
        let unknown = || VoteError::OutcomeUnknown("timeout".into());
        let (status, body) = render(ApiError::vote(unknown(), true)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["retrySafe"], true);

        let (_, body) = render(ApiError::vote(unknown(), false)).await;
        assert_eq!(body["retrySafe"], false);
    }

    #[tokio::test]
    async fn unreachable_store_is_always_retry_safe() {
        let err = VoteError::StoreUnreachable("refused".into());
        let (status, body) = render(ApiError::vote(err, false)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["retrySafe"], true);
        assert!(!body["error"].as_str().unwrap().contains("refused"));
    }

    #[tokio::test]
    async fn store_details_stay_out_of_bodies() {
        let err = VoteError::Store("relation \"posts\" is gone".into());
        let (status, body) = render(err.into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to record vote");

        let err = ServiceError::Store {
            action: "create post",
            source: StoreError::Backend("disk full".into()),
        };
        let (status, body) = render(err.into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to create post");
    }
}
