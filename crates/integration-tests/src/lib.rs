//! Shared fixtures: an app over `MemoryStore` and a token issuer standing in
//! for the identity provider.

use std::sync::Arc;

use api_adapters::{router, AppState};
use auth_adapters::{Claims, JwtVerifier};
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{DateTime, Utc};
use domains::{ExpiryOption, Poll, Post, PostId, PostRepository, UserId};
use serde_json::Value;
use services::{VotePolicy, VoteService};
use storage_adapters::MemoryStore;
use tower::ServiceExt;

pub const SECRET: &[u8] = b"integration-secret";

pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub router: Router,
    jwt: JwtVerifier,
}

impl TestApp {
    pub fn new(policy: VotePolicy) -> Self {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(
            store.clone(),
            Arc::new(JwtVerifier::new(SECRET, None, None)),
            policy,
        );
        Self {
            store,
            router: router(state),
            jwt: JwtVerifier::new(SECRET, None, None),
        }
    }

    pub fn token(&self, sub: &str) -> String {
        let claims = Claims {
            sub: sub.into(),
            exp: (Utc::now().timestamp() + 3600) as u64,
            iss: None,
            aud: None,
            name: Some(format!("{sub} display")),
            picture: None,
        };
        self.jwt.issue(&claims).expect("signing test token")
    }

    /// Sends one request, returning the status and the JSON body (`Null`
    /// when the body is empty).
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        if body.is_some() {
            request = request.header(header::CONTENT_TYPE, "application/json");
        }
        let request = request
            .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
            .expect("building request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("reading body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }
}

/// Inserts a public post carrying a poll with `labels`.
pub async fn seed_poll(
    store: &dyn PostRepository,
    labels: &[&str],
    expires_at: Option<DateTime<Utc>>,
) -> PostId {
    let now = Utc::now();
    let post = Post {
        id: PostId::new(),
        author_id: UserId::new("seed"),
        author_display_name: None,
        author_photo_url: None,
        content: "Which one?".into(),
        media_urls: Vec::new(),
        tags: Vec::new(),
        group: None,
        poll: Poll::from_labels(labels, expires_at),
        expiry_option: ExpiryOption::Never,
        comment_refs: Vec::new(),
        created_at: now,
        updated_at: now,
    };
    let id = post.id;
    store.create_post(post).await.expect("seeding post");
    id
}

/// A vote service over `store` with the given policy.
pub fn vote_service(store: Arc<MemoryStore>, policy: VotePolicy) -> VoteService {
    VoteService::new(store, policy)
}
