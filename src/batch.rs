// src/batch.rs
// Concurrent fetch-and-annotate pipeline. One coordinating task drives
// source iteration and submission; a bounded pool of workers normalizes
// posts in parallel. Results are reassembled by submission sequence number,
// never by completion order.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use serde::Serialize;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::config::{clamp_max_posts, AppConfig};
use crate::error::{Result, ScrapeError};
use crate::normalize::{normalize, PostRow};
use crate::reddit::{PostSource, RawPost, RedditCredentials};
use crate::sentiment::SentimentClassifier;

/// Delay before the single retry of a transient `open` failure.
const OPEN_RETRY_DELAY: Duration = Duration::from_secs(2);

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("batch_runs_total", "Batches started.");
        describe_counter!(
            "batch_posts_submitted_total",
            "Posts handed to the worker pool."
        );
        describe_counter!(
            "batch_posts_dropped_total",
            "Posts dropped during normalization."
        );
        describe_counter!("batch_failures_total", "Batches that ended in an error.");
    });
}

/// Immutable description of one scrape+annotate+export run.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub credentials: RedditCredentials,
    pub subreddit: String,
    pub max_posts: usize,
    pub enrich: bool,
    pub with_polarity: bool,
}

impl BatchRequest {
    /// `max_posts` is clamped to the hard ceiling at construction time.
    pub fn new(
        credentials: RedditCredentials,
        subreddit: impl Into<String>,
        max_posts: usize,
        enrich: bool,
        with_polarity: bool,
    ) -> Self {
        Self {
            credentials,
            subreddit: subreddit.into(),
            max_posts: clamp_max_posts(max_posts),
            enrich,
            with_polarity,
        }
    }
}

/// Discrete frames pushed to the consumer while a batch runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProgressEvent {
    Progress { percent: f64 },
    Done,
    Error { message: String },
}

/// How progress frames reach the caller. One interface, several backends:
/// a push channel for streaming responses, a null sink for the blocking
/// path, a collecting sink for tests.
pub trait ProgressSink: Send {
    fn send(&mut self, event: ProgressEvent);
    /// True once the consumer is gone; the runner stops submitting work.
    fn is_closed(&self) -> bool;
}

/// Push backend over a tokio mpsc channel (feeds the SSE response).
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<ProgressEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelSink {
    fn send(&mut self, event: ProgressEvent) {
        // A send after disconnect is dropped; is_closed handles the rest.
        let _ = self.tx.send(event);
    }

    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Synchronous backend: progress is discarded, only the terminal result
/// matters (the /download path).
pub struct NullSink;

impl ProgressSink for NullSink {
    fn send(&mut self, _event: ProgressEvent) {}
    fn is_closed(&self) -> bool {
        false
    }
}

/// Buffers every event in memory; used by tests to assert cadence.
#[derive(Default)]
pub struct CollectSink {
    pub events: Vec<ProgressEvent>,
}

impl ProgressSink for CollectSink {
    fn send(&mut self, event: ProgressEvent) {
        self.events.push(event);
    }
    fn is_closed(&self) -> bool {
        false
    }
}

/// Unit of work executed inside the pool. A seam so tests can inject
/// artificial delays and verify ordering.
#[async_trait]
pub trait RecordWorker: Send + Sync + 'static {
    async fn process(&self, raw: RawPost) -> Option<PostRow>;
}

/// Production worker: normalization plus optional sentiment enrichment.
pub struct NormalizeWorker {
    classifier: Arc<SentimentClassifier>,
    enrich: bool,
    with_polarity: bool,
}

impl NormalizeWorker {
    pub fn new(classifier: Arc<SentimentClassifier>, enrich: bool, with_polarity: bool) -> Self {
        Self {
            classifier,
            enrich,
            with_polarity,
        }
    }

    pub fn for_request(classifier: Arc<SentimentClassifier>, request: &BatchRequest) -> Self {
        Self::new(classifier, request.enrich, request.with_polarity)
    }
}

#[async_trait]
impl RecordWorker for NormalizeWorker {
    async fn process(&self, raw: RawPost) -> Option<PostRow> {
        normalize(raw, &self.classifier, self.enrich, self.with_polarity)
    }
}

/// Run one batch to completion. Emits progress every `progress_every`
/// submissions plus a final 100%; returns the surviving rows in submission
/// order, or the first batch-level error.
pub async fn run_batch(
    source: &dyn PostSource,
    worker: Arc<dyn RecordWorker>,
    request: &BatchRequest,
    config: &AppConfig,
    sink: &mut dyn ProgressSink,
) -> Result<Vec<PostRow>> {
    ensure_metrics_described();
    counter!("batch_runs_total").increment(1);

    match drive_batch(source, worker, request, config, sink).await {
        Ok(rows) => Ok(rows),
        Err(e) => {
            counter!("batch_failures_total", "kind" => e.kind()).increment(1);
            Err(e)
        }
    }
}

async fn drive_batch(
    source: &dyn PostSource,
    worker: Arc<dyn RecordWorker>,
    request: &BatchRequest,
    config: &AppConfig,
    sink: &mut dyn ProgressSink,
) -> Result<Vec<PostRow>> {
    info!(subreddit = %request.subreddit, max_posts = request.max_posts, "opening batch");

    // Opening: auth + existence probe, one retry on a transient failure.
    let mut stream = match source.open(&request.credentials, &request.subreddit).await {
        Ok(s) => s,
        Err(e) if e.is_transient() => {
            warn!(error = %e, "open failed, retrying once");
            tokio::time::sleep(OPEN_RETRY_DELAY).await;
            source.open(&request.credentials, &request.subreddit).await?
        }
        Err(e) => return Err(e),
    };

    // Fetching: single-threaded submission, strictly ordered. The semaphore
    // bounds in-flight workers; acquiring a permit here paces submission.
    let total = request.max_posts;
    let pool = Arc::new(Semaphore::new(config.pool_size));
    let mut tasks: JoinSet<(usize, Option<PostRow>)> = JoinSet::new();
    let mut submitted = 0usize;

    while submitted < total {
        if sink.is_closed() {
            info!(submitted, "consumer disconnected, cancelling batch");
            tasks.abort_all();
            return Err(ScrapeError::Cancelled);
        }

        let raw = match stream.next().await {
            Ok(Some(raw)) => raw,
            Ok(None) => break,
            Err(e) => {
                tasks.abort_all();
                return Err(e);
            }
        };

        let permit = pool
            .clone()
            .acquire_owned()
            .await
            .expect("worker pool semaphore closed");
        let worker = worker.clone();
        let seq = submitted;
        tasks.spawn(async move {
            let _permit = permit;
            (seq, worker.process(raw).await)
        });

        submitted += 1;
        if submitted % config.progress_every == 0 {
            let percent = (submitted as f64 / total as f64) * 100.0;
            sink.send(ProgressEvent::Progress { percent });
        }
    }
    counter!("batch_posts_submitted_total").increment(submitted as u64);

    // Draining: wait for every outstanding worker, slot results by sequence.
    let mut slots: Vec<Option<PostRow>> = (0..submitted).map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((seq, row)) => slots[seq] = row,
            Err(e) if e.is_cancelled() => {}
            Err(e) => warn!(error = %e, "worker task failed, post dropped"),
        }
    }

    let rows: Vec<PostRow> = slots.into_iter().flatten().collect();
    let dropped = submitted - rows.len();
    if dropped > 0 {
        counter!("batch_posts_dropped_total").increment(dropped as u64);
    }
    info!(submitted, kept = rows.len(), dropped, "batch drained");

    if rows.is_empty() {
        return Err(ScrapeError::EmptyResult);
    }

    sink.send(ProgressEvent::Progress { percent: 100.0 });
    Ok(rows)
}
