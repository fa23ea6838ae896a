// src/normalize.rs
// Maps one raw Reddit post into the canonical export row. A post either
// normalizes completely or is dropped; no partially populated rows.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::reddit::RawPost;
use crate::sentiment::{Sentiment, SentimentClassifier};

/// Placeholder author for deleted/suspended accounts.
const DELETED_AUTHOR: &str = "[deleted]";

/// Canonical output row. Field order here is the export column order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostRow {
    pub post_id: String,
    pub title: String,
    pub text: String,
    pub url: String,
    pub permalink: String,
    pub score: i64,
    pub upvote_ratio: f64,
    pub num_comments: u64,
    pub created_utc: DateTime<Utc>,
    pub author: String,
    pub subreddit: String,
    pub is_original_content: bool,
    pub is_self: bool,
    pub stickied: bool,
    pub sentiment: Option<Sentiment>,
}

/// Normalize one post. Returns `None` (and logs) when a mandatory field is
/// missing or malformed; the batch runner simply omits such posts.
pub fn normalize(
    raw: RawPost,
    classifier: &SentimentClassifier,
    enrich: bool,
    with_polarity: bool,
) -> Option<PostRow> {
    let post_id = match raw.id {
        Some(id) if !id.is_empty() => id,
        _ => {
            warn!("dropping post without id");
            return None;
        }
    };
    let title = match raw.title {
        Some(t) => clean_text(&t),
        None => {
            warn!(post_id = %post_id, "dropping post without title");
            return None;
        }
    };
    let created_utc = match raw.created_utc.and_then(epoch_to_datetime) {
        Some(ts) => ts,
        None => {
            warn!(post_id = %post_id, "dropping post with invalid created_utc");
            return None;
        }
    };

    let text = clean_text(&raw.selftext);
    let author = match raw.author {
        Some(a) if !a.is_empty() => a,
        _ => DELETED_AUTHOR.to_string(),
    };

    let sentiment = enrich.then(|| {
        let joined = format!("{title} {text}");
        if with_polarity {
            classifier.classify_scored(&joined)
        } else {
            classifier.classify(&joined)
        }
    });

    Some(PostRow {
        post_id,
        title,
        text,
        url: raw.url,
        permalink: raw.permalink,
        score: raw.score,
        upvote_ratio: raw.upvote_ratio,
        num_comments: raw.num_comments,
        created_utc,
        author,
        subreddit: raw.subreddit,
        is_original_content: raw.is_original_content,
        is_self: raw.is_self,
        stickied: raw.stickied,
        sentiment,
    })
}

fn epoch_to_datetime(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    DateTime::<Utc>::from_timestamp(secs as i64, 0)
}

/// Decode HTML entities and collapse whitespace. Reddit selftext arrives
/// entity-escaped unless raw_json is honored; run the cleanup either way.
pub fn clean_text(s: &str) -> String {
    let decoded = html_escape::decode_html_entities(s);

    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    re_ws.replace_all(decoded.trim(), " ").to_string()
}
