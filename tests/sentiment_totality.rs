// tests/sentiment_totality.rs
//
// The classifier has a total contract: every input (empty, huge, junk)
// yields a label and a confidence in [0,1], never a panic.

use reddit_sentiment_exporter::sentiment::{SentimentClassifier, SentimentLabel, MAX_TOKENS};

fn assert_valid(c: &SentimentClassifier, text: &str) {
    let s = c.classify_scored(text);
    assert!(
        (0.0..=1.0).contains(&s.confidence),
        "confidence out of range for {text:?}: {}",
        s.confidence
    );
    let polarity = s.polarity.expect("polarity requested");
    assert!(
        (-1.0..=1.0).contains(&polarity),
        "polarity out of range for {text:?}: {polarity}"
    );
}

#[test]
fn classify_is_total_over_edge_inputs() {
    let c = SentimentClassifier::new();
    for text in [
        "",
        "   \t\n  ",
        "!!!???...",
        "word",
        "ľúbozvučné slová čľup",
        "\u{0000}\u{FFFF}",
    ] {
        assert_valid(&c, text);
    }
}

#[test]
fn empty_and_non_text_input_is_unknown_with_zero_confidence() {
    let c = SentimentClassifier::new();
    for text in ["", "   ", "?!...---"] {
        let s = c.classify(text);
        assert_eq!(s.label, SentimentLabel::Unknown);
        assert_eq!(s.confidence, 0.0);
    }
}

#[test]
fn input_beyond_the_token_window_is_truncated_not_rejected() {
    let c = SentimentClassifier::new();
    // Positive head, overwhelmingly negative tail beyond the window: head
    // truncation means the tail must not influence the label.
    let mut text = "great awesome excellent ".repeat(MAX_TOKENS / 3);
    text.push_str(&"terrible ".repeat(MAX_TOKENS * 4));
    let s = c.classify(&text);
    assert_eq!(s.label, SentimentLabel::Positive);
    assert!((0.0..=1.0).contains(&s.confidence));
}

#[test]
fn classification_is_deterministic() {
    let c = SentimentClassifier::new();
    let text = "The new schedule is terrible and management refuses to listen";
    let a = c.classify_scored(text);
    let b = c.classify_scored(text);
    assert_eq!(a.label, b.label);
    assert_eq!(a.confidence, b.confidence);
    assert_eq!(a.polarity, b.polarity);
}

#[test]
fn polarity_is_absent_unless_requested() {
    let c = SentimentClassifier::new();
    assert_eq!(c.classify("love this").polarity, None);
    assert!(c.classify_scored("love this").polarity.is_some());
}
