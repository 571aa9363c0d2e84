//! Request extractors whose rejections use the API's error bodies.

use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::Json;
use domains::{AuthError, Caller};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;

/// A verified caller. Rejects with 401 when the token is missing or invalid.
#[derive(Debug, Clone)]
pub struct AuthCaller(pub Caller);

/// A caller if the request carried a token. A token that is present but
/// fails verification still rejects with 401.
#[derive(Debug, Clone)]
pub struct MaybeCaller(pub Option<Caller>);

fn bearer(parts: &Parts) -> Result<Option<&str>, AuthError> {
    let Some(value) = parts.headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| AuthError::InvalidToken("non-ascii header".into()))?;
    match value.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(Some(token.trim())),
        _ => Err(AuthError::MissingToken),
    }
}

async fn verify(parts: &Parts, state: &AppState) -> Result<Option<Caller>, ApiError> {
    let token = match bearer(parts) {
        Ok(Some(token)) => token,
        Ok(None) => return Ok(None),
        Err(e) => {
            debug!(error = %e, "malformed authorization header");
            return Err(ApiError::Unauthenticated);
        }
    };

    state
        .identity
        .verify(token)
        .await
        .map(Some)
        .map_err(|_| ApiError::Unauthenticated)
}

impl FromRequestParts<AppState> for AuthCaller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        verify(parts, state)
            .await?
            .map(AuthCaller)
            .ok_or(ApiError::Unauthenticated)
    }
}

impl FromRequestParts<AppState> for MaybeCaller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        verify(parts, state).await.map(MaybeCaller)
    }
}

/// `axum::Json` with a `{ "error": ... }` rejection.
#[derive(Debug, Clone)]
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => {
                debug!(error = %rejection, "rejected request body");
                Err(ApiError::BadRequest("Invalid request body"))
            }
        }
    }
}
