use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{clamp_score, round_half_up, FallbackReason, SafeDefault, Validated};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DominancePerson {
    pub label: String,
    pub dominance_score: u8,
}

impl DominancePerson {
    pub fn new(label: impl Into<String>, dominance_score: u8) -> Self {
        Self { label: label.into(), dominance_score }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DominanceResult {
    pub people: Vec<DominancePerson>,
    pub user_label: Option<String>,
    /// 1-based, highest score first.
    pub user_rank: Option<usize>,
    pub total_people: usize,
}

impl SafeDefault for DominanceResult {
    fn safe_default() -> Self {
        let people: Vec<DominancePerson> = [62, 59, 57, 54, 51]
            .into_iter()
            .enumerate()
            .map(|(i, score)| DominancePerson::new(crate::detect::person_label(i), score))
            .collect();
        DominanceResult {
            total_people: people.len(),
            people,
            user_label: None,
            user_rank: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub label: String,
    pub dominance_score: u8,
    pub is_you: bool,
}

fn non_empty_trimmed(value: Option<&Value>) -> Option<String> {
    let s = value?.as_str()?.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn clamp_rank(rank: f64, total: usize) -> Option<usize> {
    if !rank.is_finite() || total == 0 {
        return None;
    }
    Some(round_half_up(rank).clamp(1.0, total as f64) as usize)
}

/// Structural check of scorer output.
///
/// Needs at least two people, each with a non-blank label and a numeric
/// score, and labels unique after trimming. Scores are clamped to integers in
/// `[0, 100]`, `total_people` is recomputed, and `user_rank` is clamped into
/// `[1, total_people]`.
pub fn validate_dominance(input: &Value) -> Validated<DominanceResult> {
    let Some(obj) = input.as_object() else {
        return Validated::Fallback(FallbackReason::NotAnObject);
    };
    let Some(raw_people) = obj.get("people").and_then(Value::as_array) else {
        return Validated::Fallback(FallbackReason::InvalidField("people"));
    };
    if raw_people.len() < 2 {
        return Validated::Fallback(FallbackReason::TooFewPeople(raw_people.len()));
    }

    let mut people = Vec::with_capacity(raw_people.len());
    for (i, item) in raw_people.iter().enumerate() {
        let label = non_empty_trimmed(item.get("label"));
        let score = item.get("dominance_score").and_then(Value::as_f64);
        match (label, score) {
            (Some(label), Some(score)) => people.push(DominancePerson::new(label, clamp_score(score))),
            _ => return Validated::Fallback(FallbackReason::InvalidPerson(i)),
        }
    }

    let mut seen = HashSet::new();
    for p in &people {
        if !seen.insert(p.label.as_str()) {
            return Validated::Fallback(FallbackReason::DuplicateLabel(p.label.clone()));
        }
    }

    let total_people = people.len();
    let user_rank = obj
        .get("user_rank")
        .and_then(Value::as_f64)
        .and_then(|r| clamp_rank(r, total_people));

    Validated::Valid(DominanceResult {
        people,
        user_label: non_empty_trimmed(obj.get("user_label")),
        user_rank,
        total_people,
    })
}

/// When every score is the same, walk them down from the common score so
/// the ranking follows list order.
fn spread_identical_scores(people: &mut [DominancePerson]) {
    let Some(first) = people.first() else {
        return;
    };
    let base = i64::from(first.dominance_score);
    if people.iter().any(|p| i64::from(p.dominance_score) != base) {
        return;
    }
    let n = people.len() as i64;
    let step = ((100 - base) / n.max(1)).clamp(1, 4);
    for (i, p) in people.iter_mut().enumerate() {
        p.dominance_score = (base - i as i64 * step).clamp(0, 100) as u8;
    }
}

/// Clamp scores, break uniform scoring, and make the counters consistent.
pub fn sanitize_dominance(mut result: DominanceResult) -> DominanceResult {
    for p in &mut result.people {
        p.dominance_score = p.dominance_score.min(100);
    }
    spread_identical_scores(&mut result.people);
    result.total_people = result.people.len();
    result.user_rank = result.user_rank.and_then(|r| clamp_rank(r as f64, result.total_people));
    result.user_label = result
        .user_label
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty());
    result
}

pub fn clamp_and_sanitize_dominance(input: &Value) -> Validated<DominanceResult> {
    validate_dominance(input).map(sanitize_dominance)
}

/// 64-bit FNV-1a.
fn fnv1a(bytes: impl IntoIterator<Item = u8>) -> u64 {
    bytes.into_iter().fold(0xcbf2_9ce4_8422_2325, |hash, b| {
        (hash ^ u64::from(b)).wrapping_mul(0x0000_0100_0000_01b3)
    })
}

/// Stand-in ranking for when the scorer is unavailable.
///
/// Scores are in `[40, 80]` and depend only on the analysis id and label, so
/// the same analysis always gets the same ranking. People are sorted by
/// descending score.
pub fn generate_fallback_dominance<S: AsRef<str>>(analysis_id: &str, labels: &[S]) -> DominanceResult {
    let mut people: Vec<DominancePerson> = labels
        .iter()
        .map(|label| {
            let label = label.as_ref();
            let hash = fnv1a(analysis_id.bytes().chain(label.bytes()));
            DominancePerson::new(label, 40 + (hash % 41) as u8)
        })
        .collect();
    people.sort_by(|a, b| b.dominance_score.cmp(&a.dominance_score));
    DominanceResult {
        total_people: people.len(),
        people,
        user_label: None,
        user_rank: None,
    }
}

fn same_label(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

fn ranked(people: &[DominancePerson]) -> Vec<&DominancePerson> {
    let mut sorted: Vec<&DominancePerson> = people.iter().collect();
    sorted.sort_by(|a, b| b.dominance_score.cmp(&a.dominance_score));
    sorted
}

/// 1-based rank of `label` by descending score, ties in list order.
pub fn user_rank_of(people: &[DominancePerson], label: &str) -> Option<usize> {
    if label.trim().is_empty() {
        return None;
    }
    ranked(people)
        .iter()
        .position(|p| same_label(&p.label, label))
        .map(|i| i + 1)
}

/// Same number of people and every expected label present.
pub fn matches_labels<S: AsRef<str>>(result: &DominanceResult, labels: &[S]) -> bool {
    if result.people.len() != labels.len() {
        return false;
    }
    let got: HashSet<&str> = result.people.iter().map(|p| p.label.trim()).collect();
    labels.iter().all(|l| got.contains(l.as_ref().trim()))
}

pub fn leaderboard(result: &DominanceResult, selected_label: Option<&str>) -> Vec<LeaderboardEntry> {
    ranked(&result.people)
        .into_iter()
        .enumerate()
        .map(|(i, p)| LeaderboardEntry {
            rank: i + 1,
            label: p.label.clone(),
            dominance_score: p.dominance_score,
            is_you: selected_label.is_some_and(|s| same_label(&p.label, s)),
        })
        .collect()
}
