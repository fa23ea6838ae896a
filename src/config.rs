// src/config.rs
// Env-driven runtime configuration with hardcoded defaults. Credentials are
// NOT config: they arrive per request in the scrape/download body.

/// Hard ceiling on posts per batch, regardless of what the request asks for.
pub const MAX_POSTS_CEILING: usize = 1000;

/// Default number of posts when the request omits `max_posts`.
pub const DEFAULT_MAX_POSTS: usize = 100;

/// Identifier of the classifier backing the sentiment annotator. Kept for
/// parity with the upstream column docs; there is exactly one backend.
pub const CLASSIFIER_ID: &str = "lexicon/twitter-sentiment-base";

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Bind address for the HTTP server.
    pub bind_addr: String,
    /// Size of the per-batch worker pool.
    pub pool_size: usize,
    /// Emit a progress event every N submitted posts.
    pub progress_every: usize,
    /// User agent sent with every Reddit API call.
    pub user_agent: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
            pool_size: 10,
            progress_every: 10,
            user_agent: "rust:reddit-sentiment-exporter:v0.1".to_string(),
        }
    }
}

impl AppConfig {
    /// Load from environment, falling back to defaults field by field.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or(d.bind_addr),
            pool_size: env_usize("SCRAPER_POOL_SIZE").unwrap_or(d.pool_size).max(1),
            progress_every: env_usize("SCRAPER_PROGRESS_EVERY")
                .unwrap_or(d.progress_every)
                .max(1),
            user_agent: std::env::var("SCRAPER_USER_AGENT").unwrap_or(d.user_agent),
        }
    }
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Clamp a requested post count to the hard ceiling (and at least 1).
pub fn clamp_max_posts(requested: usize) -> usize {
    requested.clamp(1, MAX_POSTS_CEILING)
}
