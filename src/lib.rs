// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod api;
pub mod batch;
pub mod config;
pub mod error;
pub mod export;
pub mod metrics;
pub mod normalize;
pub mod reddit;
pub mod sentiment;

// ---- Re-exports for stable public API ----
pub use crate::api::{router, AppState};
pub use crate::batch::{run_batch, BatchRequest, ProgressEvent, ProgressSink};
pub use crate::error::ScrapeError;
pub use crate::normalize::PostRow;
pub use crate::sentiment::{Sentiment, SentimentClassifier, SentimentLabel};
