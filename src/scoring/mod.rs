//! Guards for scoring-model output.
//!
//! Nothing here fails: malformed input resolves to a [`Validated::Fallback`]
//! carrying the reason, and every result type has a safe default.

pub mod dominance;
pub mod frame_mog;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub use dominance::{
    clamp_and_sanitize_dominance, generate_fallback_dominance, leaderboard, matches_labels, sanitize_dominance,
    user_rank_of, validate_dominance, DominancePerson, DominanceResult, LeaderboardEntry,
};
pub use frame_mog::{
    clamp_and_sanitize_frame_mog, derive_score_breakdown, metric_label, normalize_frame_mog_record,
    photography_fallback, sanitize_frame_mog, validate_frame_mog, FrameMogDraft, FrameMogResult, ScoreBreakdown,
    ScoreKey,
};

/// Why model output was replaced by a default.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FallbackReason {
    #[error("model output is not valid JSON")]
    UnparseableOutput,

    #[error("expected a JSON object")]
    NotAnObject,

    #[error("expected at least 2 people, got {0}")]
    TooFewPeople(usize),

    #[error("person at index {0} has no label or score")]
    InvalidPerson(usize),

    #[error("duplicate label {0:?}")]
    DuplicateLabel(String),

    #[error("missing or invalid field {0:?}")]
    InvalidField(&'static str),

    #[error("score breakdown must have exactly the six metric keys")]
    InvalidBreakdown,

    #[error("expected 3 to 6 insights, got {0}")]
    InsightCount(usize),

    #[error("labels do not match the detected people")]
    LabelMismatch,
}

/// Outcome of validating untrusted model output.
#[derive(Debug, Clone, PartialEq)]
pub enum Validated<T> {
    Valid(T),
    Fallback(FallbackReason),
}

/// Types with a fixed, well-formed value to use when input is rejected.
pub trait SafeDefault {
    fn safe_default() -> Self;
}

impl<T> Validated<T> {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Validated::Fallback(_))
    }

    pub fn reason(&self) -> Option<&FallbackReason> {
        match self {
            Validated::Valid(_) => None,
            Validated::Fallback(reason) => Some(reason),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Validated<U> {
        match self {
            Validated::Valid(v) => Validated::Valid(f(v)),
            Validated::Fallback(reason) => Validated::Fallback(reason),
        }
    }

    pub fn and_then<U>(self, f: impl FnOnce(T) -> Validated<U>) -> Validated<U> {
        match self {
            Validated::Valid(v) => f(v),
            Validated::Fallback(reason) => Validated::Fallback(reason),
        }
    }

    /// The value, or whatever `fallback` builds from the reason.
    pub fn unwrap_or_else(self, fallback: impl FnOnce(&FallbackReason) -> T) -> T {
        match self {
            Validated::Valid(v) => v,
            Validated::Fallback(reason) => fallback(&reason),
        }
    }
}

impl<T: SafeDefault> Validated<T> {
    pub fn into_value(self) -> T {
        self.unwrap_or_else(|_| T::safe_default())
    }
}

/// Strip markdown fences and keep the outermost `{...}` of model text.
pub fn extract_json(raw: &str) -> String {
    let cleaned = raw.replace("```json\n", "").replace("```json", "").replace("\n```", "").replace("```", "");
    let cleaned = cleaned.trim();
    match (cleaned.find('{'), cleaned.rfind('}')) {
        (Some(first), Some(last)) if last > first => cleaned[first..=last].to_string(),
        _ => cleaned.to_string(),
    }
}

pub fn parse_model_output(raw: &str) -> Option<Value> {
    serde_json::from_str(&extract_json(raw)).ok()
}

/// `Math.round` semantics: halves go up.
pub(crate) fn round_half_up(v: f64) -> f64 {
    (v + 0.5).floor()
}

/// Round and clamp to an integer score in `[0, 100]`; non-finite input is 50.
pub(crate) fn clamp_score(v: f64) -> u8 {
    if !v.is_finite() {
        return 50;
    }
    round_half_up(v).clamp(0.0, 100.0) as u8
}
