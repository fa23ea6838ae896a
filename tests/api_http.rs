// tests/api_http.rs
//
// HTTP-level tests for the public Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - POST /download (CSV attachment, error mapping)
// - POST /scrape   (SSE frames: progress then done / error)

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::Value as Json;
use tower::ServiceExt as _; // for `oneshot`

use reddit_sentiment_exporter::api::{self, AppState};
use reddit_sentiment_exporter::config::AppConfig;
use reddit_sentiment_exporter::error::{Result, ScrapeError};
use reddit_sentiment_exporter::reddit::{PostSource, PostStream, RawPost, RedditCredentials};
use reddit_sentiment_exporter::sentiment::SentimentClassifier;

const BODY_LIMIT: usize = 4 * 1024 * 1024;

fn make_post(i: usize) -> RawPost {
    RawPost {
        id: Some(format!("p{i}")),
        title: Some(format!("Post number {i}")),
        selftext: "I love this place".to_string(),
        url: format!("https://example.test/{i}"),
        permalink: format!("/r/test/comments/p{i}"),
        score: i as i64,
        upvote_ratio: 0.9,
        num_comments: 1,
        created_utc: Some(1_700_000_000.0),
        author: Some("alice".to_string()),
        subreddit: "test".to_string(),
        is_original_content: false,
        is_self: true,
        stickied: false,
    }
}

struct StaticSource {
    posts: Vec<RawPost>,
    auth_fails: bool,
}

#[async_trait]
impl PostSource for StaticSource {
    async fn open(
        &self,
        _creds: &RedditCredentials,
        _subreddit: &str,
    ) -> Result<Box<dyn PostStream>> {
        if self.auth_fails {
            return Err(ScrapeError::Auth("invalid_grant".into()));
        }
        Ok(Box::new(StaticStream {
            posts: self.posts.clone().into(),
        }))
    }
}

struct StaticStream {
    posts: VecDeque<RawPost>,
}

#[async_trait]
impl PostStream for StaticStream {
    async fn next(&mut self) -> Result<Option<RawPost>> {
        Ok(self.posts.pop_front())
    }
}

fn test_router(posts: Vec<RawPost>, auth_fails: bool) -> Router {
    let config = AppConfig {
        bind_addr: "127.0.0.1:0".into(),
        pool_size: 10,
        progress_every: 10,
        user_agent: "test".into(),
    };
    let state = AppState::new(
        Arc::new(StaticSource { posts, auth_fails }),
        Arc::new(SentimentClassifier::new()),
        config,
    );
    api::router(state)
}

fn form_body(max_posts: usize, sentiment: bool) -> Body {
    Body::from(format!(
        "client_id=id&client_secret=secret&username=user&password=pass\
         &subreddit=test&max_posts={max_posts}\
         &include_sentiment={sentiment}&include_sentiment_score={sentiment}"
    ))
}

fn form_request(uri: &str, max_posts: usize, sentiment: bool) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(form_body(max_posts, sentiment))
        .expect("build request")
}

#[tokio::test]
async fn health_returns_200_and_ok_body() {
    let app = test_router(vec![], false);

    let req = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .expect("build GET /health");

    let resp = app.oneshot(req).await.expect("oneshot /health");
    assert_eq!(resp.status(), StatusCode::OK);

    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    assert_eq!(bytes.as_ref(), b"ok");
}

#[tokio::test]
async fn download_returns_csv_attachment_with_rows() {
    let app = test_router((0..5).map(make_post).collect(), false);

    let resp = app
        .oneshot(form_request("/download", 5, true))
        .await
        .expect("oneshot /download");
    assert_eq!(resp.status(), StatusCode::OK);

    let disposition = resp
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .expect("content-disposition set")
        .to_string();
    assert!(disposition.contains("test_posts_"), "got {disposition}");
    assert!(disposition.ends_with(".csv\""), "got {disposition}");

    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    let text = String::from_utf8(bytes.to_vec()).expect("utf8");
    let mut lines = text.lines();
    assert!(lines
        .next()
        .expect("header line")
        .starts_with("post_id,title,text,"));
    assert_eq!(lines.count(), 5, "one row per post");
    assert!(text.contains("Positive"), "sentiment column populated");
}

#[tokio::test]
async fn download_maps_auth_failure_to_401_with_kind() {
    let app = test_router(vec![], true);

    let resp = app
        .oneshot(form_request("/download", 5, false))
        .await
        .expect("oneshot /download");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    let json: Json = serde_json::from_slice(&bytes).expect("error body is json");
    assert_eq!(json["kind"], "auth");
    assert!(json["error"].as_str().expect("message").contains("authenticate"));
}

#[tokio::test]
async fn download_of_empty_subreddit_is_404_empty_result() {
    let app = test_router(vec![], false);

    let resp = app
        .oneshot(form_request("/download", 5, false))
        .await
        .expect("oneshot /download");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    let json: Json = serde_json::from_slice(&bytes).expect("error body is json");
    assert_eq!(json["kind"], "empty_result");
}

#[tokio::test]
async fn scrape_streams_progress_then_done() {
    let app = test_router((0..25).map(make_post).collect(), false);

    let resp = app
        .oneshot(form_request("/scrape", 25, false))
        .await
        .expect("oneshot /scrape");
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .expect("content type")
        .starts_with("text/event-stream"));

    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("stream terminates");
    let text = String::from_utf8(bytes.to_vec()).expect("utf8");

    assert!(text.contains(r#"{"kind":"progress","percent":40"#), "got {text}");
    assert!(text.contains(r#"{"kind":"progress","percent":100"#), "got {text}");
    assert!(text.contains(r#"{"kind":"done"}"#), "got {text}");
}

#[tokio::test]
async fn scrape_reports_terminal_error_as_a_frame() {
    let app = test_router(vec![], true);

    let resp = app
        .oneshot(form_request("/scrape", 10, false))
        .await
        .expect("oneshot /scrape");
    assert_eq!(resp.status(), StatusCode::OK, "errors arrive in-stream");

    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("stream terminates");
    let text = String::from_utf8(bytes.to_vec()).expect("utf8");
    assert!(text.contains(r#""kind":"error""#), "got {text}");
    assert!(!text.contains(r#""kind":"done""#), "got {text}");
}
