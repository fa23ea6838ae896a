// src/export.rs
// CSV encoding of the final result set. All-or-nothing: any writer error
// aborts the export, no partial bytes are handed out.

use chrono::{DateTime, Utc};

use crate::error::{Result, ScrapeError};
use crate::normalize::PostRow;

/// Export column order. Sentiment columns are always present; they stay
/// empty when enrichment was off, so the schema never shifts between runs.
pub const CSV_HEADER: [&str; 17] = [
    "post_id",
    "title",
    "text",
    "url",
    "permalink",
    "score",
    "upvote_ratio",
    "num_comments",
    "created_utc",
    "author",
    "subreddit",
    "is_original_content",
    "is_self",
    "stickied",
    "sentiment",
    "sentiment_confidence",
    "sentiment_score",
];

/// Timestamp format in the export, matching the upstream tool's output.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Serialize rows to UTF-8 CSV bytes, header first, rows in the order given.
pub fn encode_csv(rows: &[PostRow]) -> Result<Vec<u8>> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(CSV_HEADER)?;

    for row in rows {
        let (sentiment, confidence, polarity) = match &row.sentiment {
            Some(s) => (
                s.label.as_str().to_string(),
                s.confidence.to_string(),
                s.polarity.map(|p| p.to_string()).unwrap_or_default(),
            ),
            None => (String::new(), String::new(), String::new()),
        };

        let score = row.score.to_string();
        let upvote_ratio = row.upvote_ratio.to_string();
        let num_comments = row.num_comments.to_string();
        let created_utc = row.created_utc.format(TIMESTAMP_FORMAT).to_string();
        let is_oc = row.is_original_content.to_string();
        let is_self = row.is_self.to_string();
        let stickied = row.stickied.to_string();

        let record: [&str; 17] = [
            &row.post_id,
            &row.title,
            &row.text,
            &row.url,
            &row.permalink,
            &score,
            &upvote_ratio,
            &num_comments,
            &created_utc,
            &row.author,
            &row.subreddit,
            &is_oc,
            &is_self,
            &stickied,
            &sentiment,
            &confidence,
            &polarity,
        ];
        wtr.write_record(record)?;
    }

    wtr.into_inner()
        .map_err(|e| ScrapeError::Export(e.to_string()))
}

/// `{subreddit}_posts_{YYYYMMDD_HHMMSS}.csv`
pub fn export_filename(subreddit: &str, now: DateTime<Utc>) -> String {
    format!("{subreddit}_posts_{}.csv", now.format("%Y%m%d_%H%M%S"))
}
