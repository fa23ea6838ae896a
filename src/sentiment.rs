// src/sentiment.rs
// Lexicon-backed sentiment classifier with a total, non-throwing contract:
// every input maps to a label + confidence, optionally a signed polarity.
// The lexicon is embedded and parsed once; inference is read-only, so
// concurrent calls from the worker pool need no synchronization.

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;

static LEXICON: Lazy<HashMap<String, i32>> = Lazy::new(|| {
    let raw = include_str!("../sentiment_lexicon.json");
    serde_json::from_str::<HashMap<String, i32>>(raw).expect("valid sentiment lexicon")
});

/// Hard cap on tokens fed to scoring; longer input is head-truncated.
pub const MAX_TOKENS: usize = 512;

/// Baseline logit for the Neutral class; text with no lexicon hits softmaxes
/// to Neutral with moderate confidence rather than a coin flip.
const NEUTRAL_BIAS: f64 = 1.0;

/// Lexicon weights are integer steps; this scales them into logit space.
const WEIGHT_SCALE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SentimentLabel {
    Negative,
    Neutral,
    Positive,
    Unknown,
}

impl SentimentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Negative => "Negative",
            SentimentLabel::Neutral => "Neutral",
            SentimentLabel::Positive => "Positive",
            SentimentLabel::Unknown => "Unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sentiment {
    pub label: SentimentLabel,
    pub confidence: f64,
    /// P(Positive) - P(Negative), in [-1, 1]. Present only when requested.
    pub polarity: Option<f64>,
}

impl Sentiment {
    fn unknown(with_polarity: bool) -> Self {
        Self {
            label: SentimentLabel::Unknown,
            confidence: 0.0,
            polarity: with_polarity.then_some(0.0),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SentimentClassifier;

impl Default for SentimentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl SentimentClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Force the embedded lexicon to parse now. Called once at startup so a
    /// malformed lexicon fails the boot, not the first request.
    pub fn warm_up(&self) -> usize {
        LEXICON.len()
    }

    /// Label + confidence only.
    pub fn classify(&self, text: &str) -> Sentiment {
        self.classify_inner(text, false)
    }

    /// Label + confidence + signed polarity.
    pub fn classify_scored(&self, text: &str) -> Sentiment {
        self.classify_inner(text, true)
    }

    fn classify_inner(&self, text: &str, with_polarity: bool) -> Sentiment {
        let tokens: Vec<String> = tokenize(text).take(MAX_TOKENS).collect();
        if tokens.is_empty() {
            return Sentiment::unknown(with_polarity);
        }

        let mut pos_mass = 0.0f64;
        let mut neg_mass = 0.0f64;
        for i in 0..tokens.len() {
            let base = *LEXICON.get(tokens[i].as_str()).unwrap_or(&0);
            if base == 0 {
                continue;
            }
            // Invert the sign when a negator appears within the last 3 tokens.
            let negated = (1..=3).any(|k| i >= k && is_negator(tokens[i - k].as_str()));
            let adj = if negated { -base } else { base };
            if adj > 0 {
                pos_mass += f64::from(adj);
            } else {
                neg_mass += f64::from(-adj);
            }
        }

        let [p_neg, p_neu, p_pos] = softmax([
            neg_mass * WEIGHT_SCALE,
            NEUTRAL_BIAS,
            pos_mass * WEIGHT_SCALE,
        ]);

        let (label, confidence) = if p_pos >= p_neg && p_pos >= p_neu {
            (SentimentLabel::Positive, p_pos)
        } else if p_neg >= p_pos && p_neg >= p_neu {
            (SentimentLabel::Negative, p_neg)
        } else {
            (SentimentLabel::Neutral, p_neu)
        };

        if !confidence.is_finite() {
            return Sentiment::unknown(with_polarity);
        }

        Sentiment {
            label,
            confidence,
            polarity: with_polarity.then(|| (p_pos - p_neg).clamp(-1.0, 1.0)),
        }
    }
}

fn softmax(logits: [f64; 3]) -> [f64; 3] {
    let max = logits.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exp = logits.map(|l| (l - max).exp());
    let sum: f64 = exp.iter().sum();
    [exp[0] / sum, exp[1] / sum, exp[2] / sum]
}

/// Alphanumeric tokens, lower-cased.
fn tokenize(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_ascii_lowercase())
}

fn is_negator(tok: &str) -> bool {
    matches!(
        tok,
        "not" | "no" | "never" | "isn" | "wasn" | "aren" | "don" | "doesn" | "didn" | "cannot"
            | "without"
    )
}
