use axum::http::{Method, StatusCode};
use chrono::{TimeDelta, Utc};
use integration_tests::{seed_poll, TestApp};
use serde_json::json;
use services::VotePolicy;

fn vote_uri(post_id: impl std::fmt::Display) -> String {
    format!("/polls/{post_id}/vote")
}

#[tokio::test]
async fn accepted_vote_returns_the_tally() {
    let app = TestApp::new(VotePolicy::default());
    let post_id = seed_poll(app.store.as_ref(), &["Tea", "Coffee"], None).await;
    let token = app.token("ada");

    let (status, body) = app
        .send(Method::POST, &vote_uri(post_id), Some(&token), Some(r#"{"optionIndex": 1}"#))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "success": true,
            "options": [
                { "label": "Tea", "votes": 0, "percentage": 0 },
                { "label": "Coffee", "votes": 1, "percentage": 100 },
            ],
            "totalVotes": 1,
        })
    );
}

#[tokio::test]
async fn posts_alias_reaches_the_same_poll() {
    let app = TestApp::new(VotePolicy::default());
    let post_id = seed_poll(app.store.as_ref(), &["A", "B"], None).await;

    let token = app.token("u1");
    app.send(Method::POST, &vote_uri(post_id), Some(&token), Some(r#"{"optionIndex": 0}"#))
        .await;
    let (status, body) = app
        .send(
            Method::POST,
            &format!("/posts/{post_id}/vote"),
            Some(&app.token("u2")),
            Some(r#"{"optionIndex": 0}"#),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalVotes"], 2);
}

#[tokio::test]
async fn malformed_requests_are_rejected() {
    let app = TestApp::new(VotePolicy::default());
    let post_id = seed_poll(app.store.as_ref(), &["A", "B"], None).await;
    let token = app.token("ada");

    let uri = vote_uri(post_id);
    for body in ["{}", r#"{"optionIndex": "0"}"#, "{not json"] {
        let (status, json) = app.send(Method::POST, &uri, Some(&token), Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body {body}");
        assert_eq!(json["error"], "optionIndex is required");
    }

    for body in [r#"{"optionIndex": -1}"#, r#"{"optionIndex": 2}"#, r#"{"optionIndex": 0.5}"#] {
        let (status, json) = app.send(Method::POST, &uri, Some(&token), Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body {body}");
        assert_eq!(json["error"], "Invalid poll option");
    }
}

#[tokio::test]
async fn expired_poll_is_rejected() {
    let app = TestApp::new(VotePolicy::default());
    let closed_at = Utc::now() - TimeDelta::minutes(1);
    let post_id = seed_poll(app.store.as_ref(), &["A", "B"], Some(closed_at)).await;

    let token = app.token("ada");
    let (status, body) = app
        .send(Method::POST, &vote_uri(post_id), Some(&token), Some(r#"{"optionIndex": 0}"#))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Poll has expired");
}

#[tokio::test]
async fn unknown_and_unparsable_posts_are_not_found() {
    let app = TestApp::new(VotePolicy::default());
    let token = app.token("ada");

    for id in [uuid::Uuid::new_v4().to_string(), "not-a-post".to_string()] {
        let (status, body) = app
            .send(Method::POST, &vote_uri(&id), Some(&token), Some(r#"{"optionIndex": 0}"#))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND, "id {id}");
        assert_eq!(body["error"], "Post not found");
    }
}

#[tokio::test]
async fn second_vote_by_the_same_user_conflicts() {
    let app = TestApp::new(VotePolicy::default());
    let post_id = seed_poll(app.store.as_ref(), &["A", "B"], None).await;
    let token = app.token("ada");

    let (first, _) = app
        .send(Method::POST, &vote_uri(post_id), Some(&token), Some(r#"{"optionIndex": 0}"#))
        .await;
    let (second, body) = app
        .send(Method::POST, &vote_uri(post_id), Some(&token), Some(r#"{"optionIndex": 1}"#))
        .await;

    assert_eq!(first, StatusCode::OK);
    assert_eq!(second, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Already voted");
}

#[tokio::test]
async fn unique_voting_requires_a_token() {
    let app = TestApp::new(VotePolicy::default());
    let post_id = seed_poll(app.store.as_ref(), &["A", "B"], None).await;

    let (status, body) = app
        .send(Method::POST, &vote_uri(post_id), None, Some(r#"{"optionIndex": 0}"#))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Authentication required");

    let (status, _) = app
        .send(Method::POST, &vote_uri(post_id), Some("forged"), Some(r#"{"optionIndex": 0}"#))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn anonymous_voting_when_uniqueness_is_off() {
    let app = TestApp::new(VotePolicy {
        unique_voters: false,
        ..VotePolicy::default()
    });
    let post_id = seed_poll(app.store.as_ref(), &["A", "B"], None).await;

    for _ in 0..3 {
        let (status, _) = app
            .send(Method::POST, &vote_uri(post_id), None, Some(r#"{"optionIndex": 1}"#))
            .await;
        assert_eq!(status, StatusCode::OK);
    }
    let (_, body) = app
        .send(Method::POST, &vote_uri(post_id), None, Some(r#"{"optionIndex": 0}"#))
        .await;
    assert_eq!(body["totalVotes"], 4);
    assert_eq!(body["options"][1]["percentage"], 75);
    assert_eq!(body["options"][0]["percentage"], 25);
}

#[tokio::test]
async fn integral_float_index_counts_as_that_option() {
    let app = TestApp::new(VotePolicy::default());
    let post_id = seed_poll(app.store.as_ref(), &["A", "B"], None).await;

    let (status, body) = app
        .send(
            Method::POST,
            &vote_uri(post_id),
            Some(&app.token("ada")),
            Some(r#"{"optionIndex": 1.0}"#),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["options"][1]["votes"], 1);
}
