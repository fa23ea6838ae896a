// tests/normalize_rows.rs
//
// Row-level contract: all-or-nothing normalization, enrichment merging,
// and idempotence for fixed inputs and flags.

use reddit_sentiment_exporter::normalize::normalize;
use reddit_sentiment_exporter::reddit::RawPost;
use reddit_sentiment_exporter::sentiment::{SentimentClassifier, SentimentLabel};

fn raw() -> RawPost {
    RawPost {
        id: Some("abc123".to_string()),
        title: Some("Store closing early again".to_string()),
        selftext: "Management is terrible and I am exhausted.".to_string(),
        url: "https://example.test/abc123".to_string(),
        permalink: "/r/retail/comments/abc123".to_string(),
        score: 42,
        upvote_ratio: 0.93,
        num_comments: 17,
        created_utc: Some(1_700_000_000.0),
        author: Some("tired_clerk".to_string()),
        subreddit: "retail".to_string(),
        is_original_content: true,
        is_self: true,
        stickied: false,
    }
}

#[test]
fn normalization_is_idempotent_for_fixed_flags() {
    let c = SentimentClassifier::new();
    let a = normalize(raw(), &c, true, true).expect("normalizes");
    let b = normalize(raw(), &c, true, true).expect("normalizes");
    assert_eq!(a, b);
}

#[test]
fn enrichment_classifies_title_and_body_together() {
    let c = SentimentClassifier::new();
    let row = normalize(raw(), &c, true, true).expect("normalizes");
    let s = row.sentiment.expect("enrichment requested");
    assert_eq!(s.label, SentimentLabel::Negative);
    assert!(s.polarity.expect("polarity requested") < 0.0);

    // Same text through the classifier directly must agree.
    let direct = c.classify_scored(&format!("{} {}", row.title, row.text));
    assert_eq!(s.label, direct.label);
}

#[test]
fn sentiment_is_absent_when_enrichment_is_off() {
    let c = SentimentClassifier::new();
    let row = normalize(raw(), &c, false, false).expect("normalizes");
    assert!(row.sentiment.is_none());
}

#[test]
fn mandatory_field_failures_drop_the_whole_record() {
    let c = SentimentClassifier::new();

    let mut no_id = raw();
    no_id.id = Some(String::new());
    assert!(normalize(no_id, &c, false, false).is_none());

    let mut no_title = raw();
    no_title.title = None;
    assert!(normalize(no_title, &c, false, false).is_none());

    let mut bad_ts = raw();
    bad_ts.created_utc = Some(f64::NAN);
    assert!(normalize(bad_ts, &c, false, false).is_none());
}

#[test]
fn epoch_seconds_convert_to_utc_timestamp() {
    let c = SentimentClassifier::new();
    let row = normalize(raw(), &c, false, false).expect("normalizes");
    assert_eq!(
        row.created_utc.format("%Y-%m-%d %H:%M:%S").to_string(),
        "2023-11-14 22:13:20"
    );
}
