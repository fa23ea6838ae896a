// src/api.rs
// HTTP surface: a streaming scrape endpoint (SSE progress frames) and a
// blocking download endpoint returning the CSV as an attachment. Credentials
// arrive per request; the server holds no Reddit secrets.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Form, State},
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::Stream;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tracing::error;

use crate::batch::{
    run_batch, BatchRequest, ChannelSink, NormalizeWorker, NullSink, ProgressEvent,
};
use crate::config::{AppConfig, DEFAULT_MAX_POSTS};
use crate::error::ScrapeError;
use crate::export::{encode_csv, export_filename};
use crate::reddit::{PostSource, RedditApi, RedditCredentials};
use crate::sentiment::SentimentClassifier;

#[derive(Clone)]
pub struct AppState {
    pub source: Arc<dyn PostSource>,
    pub classifier: Arc<SentimentClassifier>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(
        source: Arc<dyn PostSource>,
        classifier: Arc<SentimentClassifier>,
        config: AppConfig,
    ) -> Self {
        Self {
            source,
            classifier,
            config: Arc::new(config),
        }
    }

    /// State wired to the real Reddit API.
    pub fn production(config: AppConfig) -> Self {
        let source = Arc::new(RedditApi::new(config.user_agent.clone()));
        Self::new(source, Arc::new(SentimentClassifier::new()), config)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/scrape", post(scrape))
        .route("/download", post(download))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Form payload shared by both endpoints. Checkbox-style flags arrive as
/// "true"/"false" strings from the page.
#[derive(Debug, Deserialize)]
pub struct ScrapeForm {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    pub subreddit: String,
    pub max_posts: Option<usize>,
    #[serde(default)]
    pub include_sentiment: bool,
    #[serde(default)]
    pub include_sentiment_score: bool,
}

impl ScrapeForm {
    fn into_request(self) -> BatchRequest {
        let credentials = RedditCredentials {
            client_id: self.client_id,
            client_secret: self.client_secret,
            username: self.username,
            password: self.password,
        };
        BatchRequest::new(
            credentials,
            self.subreddit,
            self.max_posts.unwrap_or(DEFAULT_MAX_POSTS),
            self.include_sentiment,
            self.include_sentiment_score,
        )
    }
}

/// Streaming variant: progress frames while the batch runs, then a terminal
/// `done` or `error` frame. Disconnecting mid-run cancels the batch.
async fn scrape(
    State(state): State<AppState>,
    Form(form): Form<ScrapeForm>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let (tx, mut rx) = mpsc::unbounded_channel::<ProgressEvent>();

    tokio::spawn(async move {
        let request = form.into_request();
        let worker = Arc::new(NormalizeWorker::for_request(
            state.classifier.clone(),
            &request,
        ));
        let mut sink = ChannelSink::new(tx.clone());
        let terminal = match run_batch(
            state.source.as_ref(),
            worker,
            &request,
            &state.config,
            &mut sink,
        )
        .await
        {
            Ok(_rows) => ProgressEvent::Done,
            Err(e) => {
                error!(kind = e.kind(), error = %e, "scrape batch failed");
                ProgressEvent::Error {
                    message: e.to_string(),
                }
            }
        };
        let _ = tx.send(terminal);
    });

    let stream = async_stream::stream! {
        while let Some(ev) = rx.recv().await {
            let frame = Event::default().json_data(&ev).unwrap_or_else(|_| {
                Event::default().data(r#"{"kind":"error","message":"frame serialization failed"}"#)
            });
            yield Ok(frame);
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Blocking variant: runs the whole batch, then returns the CSV bytes as a
/// file attachment named `{subreddit}_posts_{timestamp}.csv`.
async fn download(State(state): State<AppState>, Form(form): Form<ScrapeForm>) -> Response {
    let request = form.into_request();
    let subreddit = request.subreddit.clone();
    let worker = Arc::new(NormalizeWorker::for_request(
        state.classifier.clone(),
        &request,
    ));

    let rows = match run_batch(
        state.source.as_ref(),
        worker,
        &request,
        &state.config,
        &mut NullSink,
    )
    .await
    {
        Ok(rows) => rows,
        Err(e) => return error_response(e),
    };

    let bytes = match encode_csv(&rows) {
        Ok(bytes) => bytes,
        Err(e) => return error_response(e),
    };

    let filename = export_filename(&subreddit, chrono::Utc::now());
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        bytes,
    )
        .into_response()
}

fn error_response(err: ScrapeError) -> Response {
    let status = match err {
        ScrapeError::Auth(_) => StatusCode::UNAUTHORIZED,
        ScrapeError::NotFound(_) => StatusCode::NOT_FOUND,
        ScrapeError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
        ScrapeError::EmptyResult => StatusCode::NOT_FOUND,
        ScrapeError::Cancelled | ScrapeError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let body = json!({ "error": err.to_string(), "kind": err.kind() });
    (status, Json(body)).into_response()
}
