// src/reddit.rs
// Reddit data API adapter: OAuth password-grant auth, subreddit existence
// probe, and cursor-paginated iteration over /new. All network calls happen
// on the coordinating task; the worker pool never touches the network.

use std::collections::VecDeque;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{Result, ScrapeError};

const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
const API_BASE: &str = "https://oauth.reddit.com";

/// Listing page size; Reddit caps this at 100.
const PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, Deserialize)]
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
}

/// One post as returned by the listing endpoint. Fields the API may omit
/// (deleted author, missing selftext) are optional or defaulted; the
/// normalizer decides what is mandatory.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RawPost {
    pub id: Option<String>,
    pub title: Option<String>,
    #[serde(default)]
    pub selftext: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub permalink: String,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub upvote_ratio: f64,
    #[serde(default)]
    pub num_comments: u64,
    pub created_utc: Option<f64>,
    pub author: Option<String>,
    #[serde(default)]
    pub subreddit: String,
    #[serde(default)]
    pub is_original_content: bool,
    #[serde(default)]
    pub is_self: bool,
    #[serde(default)]
    pub stickied: bool,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Thing>,
    after: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Thing {
    data: RawPost,
}

/// Seam between the batch runner and the Reddit API, so tests can substitute
/// an in-memory source.
#[async_trait]
pub trait PostSource: Send + Sync {
    /// Authenticate and verify the subreddit exists. Fails with `Auth`,
    /// `NotFound`, or `UpstreamUnavailable` before any post is fetched.
    async fn open(&self, creds: &RedditCredentials, subreddit: &str)
        -> Result<Box<dyn PostStream>>;
}

/// Lazy, finite, non-restartable sequence of raw posts.
#[async_trait]
pub trait PostStream: Send {
    async fn next(&mut self) -> Result<Option<RawPost>>;
}

/// Production source talking to the real Reddit API.
pub struct RedditApi {
    user_agent: String,
}

impl RedditApi {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
        }
    }

    async fn fetch_token(
        &self,
        client: &reqwest::Client,
        creds: &RedditCredentials,
    ) -> Result<String> {
        let resp = client
            .post(TOKEN_URL)
            .basic_auth(&creds.client_id, Some(&creds.client_secret))
            .form(&[
                ("grant_type", "password"),
                ("username", creds.username.as_str()),
                ("password", creds.password.as_str()),
            ])
            .send()
            .await?;

        let status = resp.status();
        if status.is_server_error() {
            return Err(ScrapeError::UpstreamUnavailable(format!(
                "token endpoint returned {status}"
            )));
        }
        if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(ScrapeError::Auth(format!("token endpoint returned {status}")));
        }

        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| ScrapeError::Auth(format!("unreadable token response: {e}")))?;
        if let Some(err) = token.error {
            // Reddit reports bad username/password as 200 + {"error":"invalid_grant"}.
            return Err(ScrapeError::Auth(err));
        }
        token
            .access_token
            .ok_or_else(|| ScrapeError::Auth("token response missing access_token".into()))
    }

    async fn probe_subreddit(
        &self,
        client: &reqwest::Client,
        token: &str,
        subreddit: &str,
    ) -> Result<()> {
        let url = format!("{API_BASE}/r/{subreddit}/about.json");
        let resp = client.get(&url).bearer_auth(token).send().await?;

        let status = resp.status();
        if status.is_server_error() {
            return Err(ScrapeError::UpstreamUnavailable(format!(
                "about probe returned {status}"
            )));
        }
        if status == reqwest::StatusCode::NOT_FOUND
            || status == reqwest::StatusCode::FORBIDDEN
            || resp.url().path().starts_with("/subreddits/search")
        {
            // Nonexistent names redirect to search on the html host and 404
            // on the oauth host; private/banned come back 403.
            return Err(ScrapeError::NotFound(subreddit.to_string()));
        }
        if !status.is_success() {
            return Err(ScrapeError::UpstreamUnavailable(format!(
                "about probe returned {status}"
            )));
        }
        debug!(subreddit, "subreddit probe ok");
        Ok(())
    }
}

#[async_trait]
impl PostSource for RedditApi {
    async fn open(
        &self,
        creds: &RedditCredentials,
        subreddit: &str,
    ) -> Result<Box<dyn PostStream>> {
        let client = reqwest::Client::builder()
            .user_agent(self.user_agent.clone())
            .build()?;

        let token = self.fetch_token(&client, creds).await?;
        self.probe_subreddit(&client, &token, subreddit).await?;

        Ok(Box::new(RedditPostStream {
            client,
            token,
            subreddit: subreddit.to_string(),
            after: None,
            buf: VecDeque::new(),
            exhausted: false,
        }))
    }
}

/// Pulls /r/{sub}/new one page at a time, handing out posts singly.
struct RedditPostStream {
    client: reqwest::Client,
    token: String,
    subreddit: String,
    after: Option<String>,
    buf: VecDeque<RawPost>,
    exhausted: bool,
}

impl RedditPostStream {
    async fn fetch_page(&mut self) -> Result<()> {
        let mut url = format!(
            "{API_BASE}/r/{}/new.json?limit={PAGE_SIZE}&raw_json=1",
            self.subreddit
        );
        if let Some(after) = &self.after {
            url.push_str("&after=");
            url.push_str(after);
        }

        let resp = self.client.get(&url).bearer_auth(&self.token).send().await?;
        let status = resp.status();
        if !status.is_success() {
            warn!(subreddit = %self.subreddit, %status, "listing fetch failed");
            return Err(ScrapeError::UpstreamUnavailable(format!(
                "listing returned {status}"
            )));
        }

        let listing: Listing = resp
            .json()
            .await
            .map_err(|e| ScrapeError::UpstreamUnavailable(format!("bad listing body: {e}")))?;

        self.after = listing.data.after;
        if self.after.is_none() {
            self.exhausted = true;
        }
        let page_len = listing.data.children.len();
        if page_len == 0 {
            self.exhausted = true;
        }
        self.buf
            .extend(listing.data.children.into_iter().map(|t| t.data));
        debug!(subreddit = %self.subreddit, page_len, "fetched listing page");
        Ok(())
    }
}

#[async_trait]
impl PostStream for RedditPostStream {
    async fn next(&mut self) -> Result<Option<RawPost>> {
        if self.buf.is_empty() && !self.exhausted {
            self.fetch_page().await?;
        }
        Ok(self.buf.pop_front())
    }
}
