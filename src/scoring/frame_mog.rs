use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{clamp_score, round_half_up, FallbackReason, SafeDefault, Validated};

const MIN_INSIGHTS: usize = 3;
const MAX_INSIGHTS: usize = 6;
/// Overall may differ from the breakdown mean by this much before it is replaced.
const MAX_OVERALL_DRIFT: f64 = 12.0;

const DEFAULT_INSIGHTS: [&str; 3] = [
    "Analysis unavailable.",
    "Please try again.",
    "Upload a clear photo for best results.",
];
const DEFAULT_TOP_MOVE: &str = "Retake with improved framing.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreKey {
    Frame,
    Posture,
    Presence,
    Composition,
    Expression,
    Style,
}

impl ScoreKey {
    pub const ALL: [ScoreKey; 6] = [
        ScoreKey::Frame,
        ScoreKey::Posture,
        ScoreKey::Presence,
        ScoreKey::Composition,
        ScoreKey::Expression,
        ScoreKey::Style,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreKey::Frame => "frame",
            ScoreKey::Posture => "posture",
            ScoreKey::Presence => "presence",
            ScoreKey::Composition => "composition",
            ScoreKey::Expression => "expression",
            ScoreKey::Style => "style",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown<T = u8> {
    pub frame: T,
    pub posture: T,
    pub presence: T,
    pub composition: T,
    pub expression: T,
    pub style: T,
}

impl<T: Copy> ScoreBreakdown<T> {
    pub fn from_fn(mut f: impl FnMut(ScoreKey) -> T) -> Self {
        ScoreBreakdown {
            frame: f(ScoreKey::Frame),
            posture: f(ScoreKey::Posture),
            presence: f(ScoreKey::Presence),
            composition: f(ScoreKey::Composition),
            expression: f(ScoreKey::Expression),
            style: f(ScoreKey::Style),
        }
    }

    pub fn get(&self, key: ScoreKey) -> T {
        match key {
            ScoreKey::Frame => self.frame,
            ScoreKey::Posture => self.posture,
            ScoreKey::Presence => self.presence,
            ScoreKey::Composition => self.composition,
            ScoreKey::Expression => self.expression,
            ScoreKey::Style => self.style,
        }
    }

    pub fn map<U: Copy>(&self, mut f: impl FnMut(T) -> U) -> ScoreBreakdown<U> {
        ScoreBreakdown::from_fn(|k| f(self.get(k)))
    }
}

impl ScoreBreakdown<u8> {
    pub fn mean(&self) -> f64 {
        ScoreKey::ALL.iter().map(|k| f64::from(self.get(*k))).sum::<f64>() / ScoreKey::ALL.len() as f64
    }
}

/// Structurally valid scorer output, numbers not yet clamped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameMogDraft {
    pub photo_type: String,
    pub overall_score: f64,
    pub potential_score: f64,
    pub score_breakdown: ScoreBreakdown<f64>,
    pub insights: Vec<String>,
    pub top_1_move: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameMogResult {
    pub photo_type: String,
    pub overall_score: u8,
    pub potential_score: u8,
    pub score_breakdown: ScoreBreakdown,
    pub insights: Vec<String>,
    pub top_1_move: String,
}

impl SafeDefault for FrameMogResult {
    fn safe_default() -> Self {
        FrameMogResult {
            photo_type: "unknown".to_string(),
            overall_score: 50,
            potential_score: 50,
            score_breakdown: ScoreBreakdown::from_fn(|_| 50),
            insights: DEFAULT_INSIGHTS.iter().map(|s| s.to_string()).collect(),
            top_1_move: DEFAULT_TOP_MOVE.to_string(),
        }
    }
}

impl From<FrameMogResult> for FrameMogDraft {
    fn from(r: FrameMogResult) -> Self {
        FrameMogDraft {
            photo_type: r.photo_type,
            overall_score: f64::from(r.overall_score),
            potential_score: f64::from(r.potential_score),
            score_breakdown: r.score_breakdown.map(f64::from),
            insights: r.insights,
            top_1_move: r.top_1_move,
        }
    }
}

/// Result for photos the scorer could not use: low score, photography advice.
pub fn photography_fallback() -> FrameMogResult {
    FrameMogResult {
        photo_type: "unknown".to_string(),
        overall_score: 25,
        potential_score: 50,
        score_breakdown: ScoreBreakdown::from_fn(|_| 25),
        insights: vec![
            "Image quality limits analysis. Use sharper focus and better lighting.".to_string(),
            "Retake with the subject clearly visible and well-lit.".to_string(),
            "Ensure the lens captures a readable face or full-frame subject.".to_string(),
        ],
        top_1_move: "Retake with clearer focus and good lighting.".to_string(),
    }
}

fn breakdown_from(value: Option<&Value>) -> Option<ScoreBreakdown<f64>> {
    let obj = value?.as_object()?;
    if obj.len() != ScoreKey::ALL.len() {
        return None;
    }
    let mut values = [0.0; 6];
    for (slot, key) in values.iter_mut().zip(ScoreKey::ALL) {
        *slot = obj.get(key.as_str())?.as_f64()?;
    }
    let [frame, posture, presence, composition, expression, style] = values;
    Some(ScoreBreakdown { frame, posture, presence, composition, expression, style })
}

fn string_field(obj: &Map<String, Value>, name: &'static str) -> Result<String, FallbackReason> {
    obj.get(name)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(FallbackReason::InvalidField(name))
}

fn number_field(obj: &Map<String, Value>, name: &'static str) -> Result<f64, FallbackReason> {
    obj.get(name).and_then(Value::as_f64).ok_or(FallbackReason::InvalidField(name))
}

fn insights_from(value: Option<&Value>) -> Result<Vec<String>, FallbackReason> {
    let items = value
        .and_then(Value::as_array)
        .ok_or(FallbackReason::InvalidField("insights"))?;
    if !(MIN_INSIGHTS..=MAX_INSIGHTS).contains(&items.len()) {
        return Err(FallbackReason::InsightCount(items.len()));
    }
    items
        .iter()
        .map(|v| v.as_str().map(str::to_string))
        .collect::<Option<Vec<_>>>()
        .ok_or(FallbackReason::InvalidField("insights"))
}

fn draft_from(input: &Value) -> Result<FrameMogDraft, FallbackReason> {
    let obj = input.as_object().ok_or(FallbackReason::NotAnObject)?;
    Ok(FrameMogDraft {
        photo_type: string_field(obj, "photo_type")?,
        overall_score: number_field(obj, "overall_score")?,
        potential_score: number_field(obj, "potential_score")?,
        score_breakdown: breakdown_from(obj.get("score_breakdown")).ok_or(FallbackReason::InvalidBreakdown)?,
        insights: insights_from(obj.get("insights"))?,
        top_1_move: string_field(obj, "top_1_move")?,
    })
}

/// Structural check: exactly the six numeric metrics, 3 to 6 string insights,
/// string `photo_type` and `top_1_move`, numeric overall and potential scores.
pub fn validate_frame_mog(input: &Value) -> Validated<FrameMogDraft> {
    match draft_from(input) {
        Ok(draft) => Validated::Valid(draft),
        Err(reason) => Validated::Fallback(reason),
    }
}

/// Clamp to `[0, 100]` without rounding; non-finite input is 50.
fn clamp_unit(v: f64) -> f64 {
    if v.is_finite() {
        v.clamp(0.0, 100.0)
    } else {
        50.0
    }
}

fn fit_insights(mut insights: Vec<String>) -> Vec<String> {
    insights.truncate(MAX_INSIGHTS);
    let missing = MIN_INSIGHTS.saturating_sub(insights.len());
    insights.extend(DEFAULT_INSIGHTS.iter().take(missing).map(|s| s.to_string()));
    insights
}

/// Make scores internally consistent.
///
/// Metrics become integers in `[0, 100]`. An overall score more than 12
/// points away from the rounded metric mean is replaced by that mean; the
/// distance is measured before overall is rounded. Potential is at least
/// overall and at most 30 above it (35 when overall is below 50). Insights
/// are cut to 6 or padded to 3.
pub fn sanitize_frame_mog(draft: FrameMogDraft) -> FrameMogResult {
    let score_breakdown = draft.score_breakdown.map(clamp_score);
    let mean = round_half_up(score_breakdown.mean());

    let mut overall = clamp_unit(draft.overall_score);
    if (overall - mean).abs() > MAX_OVERALL_DRIFT {
        overall = mean;
    }

    let max_gap = if overall < 50.0 { 35.0 } else { 30.0 };
    let potential = clamp_unit(draft.potential_score).clamp(overall, (overall + max_gap).min(100.0));

    // Rounding is monotone and the gap is whole, so both bounds survive it.
    let (overall, potential) = (clamp_score(overall), clamp_score(potential));

    FrameMogResult {
        photo_type: draft.photo_type,
        overall_score: overall,
        potential_score: potential,
        score_breakdown,
        insights: fit_insights(draft.insights),
        top_1_move: draft.top_1_move,
    }
}

pub fn clamp_and_sanitize_frame_mog(input: &Value) -> Validated<FrameMogResult> {
    validate_frame_mog(input).map(sanitize_frame_mog)
}

/// Six metrics around a single overall score, for records that only have one.
pub fn derive_score_breakdown(overall: f64) -> ScoreBreakdown {
    const OFFSETS: [i64; 6] = [0, 1, -1, 2, -2, 0];
    let base = i64::from(clamp_score(overall));
    let step = ((100 - base) / 6).clamp(1, 8);
    let mut offsets = OFFSETS.into_iter();
    ScoreBreakdown::from_fn(|_| {
        let offset = offsets.next().unwrap_or(0);
        (base + offset * step).clamp(0, 100) as u8
    })
}

fn trimmed(value: Option<&Value>) -> Option<String> {
    let s = value?.as_str()?.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn legacy_insights(summary: &Value) -> Vec<String> {
    let texts = |list: &str, field: &str| -> Vec<String> {
        summary
            .get(list)
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(|item| trimmed(item.get(field))).collect())
            .unwrap_or_default()
    };
    let context: Vec<String> = summary
        .get("photo_context")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(|item| trimmed(Some(item))).collect())
        .unwrap_or_default();

    let mut out = texts("frame_leaks", "fix");
    out.extend(texts("doing_right", "amplify"));
    out.extend(context);
    out
}

fn impact_rank(impact: Option<&Value>) -> u8 {
    match impact.and_then(Value::as_str) {
        Some("HIGH") => 3,
        Some("MEDIUM") => 2,
        Some("LOW") => 1,
        _ => 0,
    }
}

/// Highest-impact fix or amplify, then most points; earlier items win ties.
fn legacy_top_move(summary: &Value) -> String {
    let mut best: Option<(u8, f64, String)> = None;
    for (list, field) in [("frame_leaks", "fix"), ("doing_right", "amplify")] {
        let Some(items) = summary.get(list).and_then(Value::as_array) else {
            continue;
        };
        for item in items {
            let Some(text) = trimmed(item.get(field)) else {
                continue;
            };
            let rank = impact_rank(item.get("impact"));
            let points = item.get("points").and_then(Value::as_f64).unwrap_or(0.0);
            let better = match &best {
                None => true,
                Some((r, p, _)) => rank > *r || (rank == *r && points > *p),
            };
            if better {
                best = Some((rank, points, text));
            }
        }
    }
    best.map(|(_, _, text)| text).unwrap_or_else(|| DEFAULT_TOP_MOVE.to_string())
}

/// Read a stored analysis record in either shape.
///
/// Records with `result_v2` are validated and sanitized; older records with
/// only `current_score` and an `ai_summary` get a synthetic result built
/// from those fields.
pub fn normalize_frame_mog_record(record: &Value) -> FrameMogResult {
    if !record.is_object() {
        return sanitize_frame_mog(FrameMogResult::safe_default().into());
    }
    if let Some(v2) = record.get("result_v2").filter(|v| !v.is_null()) {
        return clamp_and_sanitize_frame_mog(v2).into_value();
    }

    let current = record
        .get("current_score")
        .and_then(Value::as_f64)
        .map(clamp_score)
        .unwrap_or(50);
    let summary = record.get("ai_summary").cloned().unwrap_or(Value::Null);

    sanitize_frame_mog(FrameMogDraft {
        photo_type: "unknown".to_string(),
        overall_score: f64::from(current),
        potential_score: f64::from(current.saturating_add(15).min(95)),
        score_breakdown: derive_score_breakdown(f64::from(current)).map(f64::from),
        insights: legacy_insights(&summary),
        top_1_move: legacy_top_move(&summary),
    })
}

/// Display name of a metric for the given photo type.
pub fn metric_label(photo_type: &str, key: ScoreKey) -> &'static str {
    use ScoreKey::*;
    match (photo_type, key) {
        ("shirtless_gym", Frame) => "V-Taper",
        ("shirtless_gym", Posture) => "Shoulder Set",
        ("shirtless_gym", Presence) => "Tension Control",
        ("shirtless_gym", Composition) => "Lighting/Angle",
        ("shirtless_gym", Expression) => "Face Relaxation",
        ("shirtless_gym", Style) => "Grooming (Minimal)",

        ("fashion_group", Frame) => "Silhouette",
        ("fashion_group", Posture) => "Stance",
        ("fashion_group", Presence) => "Aura",
        ("fashion_group", Composition) => "Camera Position",
        ("fashion_group", Expression) => "Face/Smile",
        ("fashion_group", Style) => "Fit + Cohesion",

        ("frat_group", Frame) => "Space Claim",
        ("frat_group", Posture) => "Spine Stack",
        ("frat_group", Presence) => "Alpha Signal",
        ("frat_group", Composition) => "Center Control",
        ("frat_group", Expression) => "Nonchalance",
        ("frat_group", Style) => "Uniformity (or Standout)",

        ("solo_fit", Frame) => "Proportions",
        ("solo_fit", Posture) => "Alignment",
        ("solo_fit", Presence) => "Confidence",
        ("solo_fit", Composition) => "Framing",
        ("solo_fit", Expression) => "Eyes/Jaw",
        ("solo_fit", Style) => "Outfit Fit",

        ("formal_event", Frame) => "Suit Structure",
        ("formal_event", Posture) => "Tall Stack",
        ("formal_event", Presence) => "Composure",
        ("formal_event", Composition) => "Elegance",
        ("formal_event", Expression) => "Warmth",
        ("formal_event", Style) => "Polish",

        ("selfie", Frame) => "Angle Discipline",
        ("selfie", Posture) => "Neck/Chin",
        ("selfie", Presence) => "Intent",
        ("selfie", Composition) => "Crop/Background",
        ("selfie", Expression) => "Eyes",
        ("selfie", Style) => "Grooming",

        (_, Frame) => "Frame",
        (_, Posture) => "Posture",
        (_, Presence) => "Presence",
        (_, Composition) => "Composition",
        (_, Expression) => "Expression",
        (_, Style) => "Style",
    }
}
