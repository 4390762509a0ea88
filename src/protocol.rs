use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::detect::DetectedPerson;
use crate::scoring::{self, metric_label, FallbackReason, LeaderboardEntry, ScoreKey};
use crate::store::AnalysisRecord;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectRequest {
    /// Detector output as JSON, `{ "faces": [...] }`.
    #[serde(default)]
    pub faces: Option<Value>,
    /// Detector output as model text, possibly fenced.
    #[serde(default)]
    pub raw: Option<String>,
    #[serde(default)]
    pub threshold: Option<f64>,
}

impl DetectRequest {
    pub fn detector_output(&self) -> Option<Value> {
        match (&self.faces, &self.raw) {
            (Some(value), _) => Some(value.clone()),
            (None, Some(raw)) => scoring::parse_model_output(raw),
            (None, None) => None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectRequest {
    #[serde(alias = "selectedLabel")]
    pub label: String,
    /// Calibration answers; stored only when this is an object.
    #[serde(default)]
    pub answers: Option<Value>,
    #[serde(default)]
    pub version: Option<String>,
}

/// Scorer output, either already parsed or as the model's text.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScorerRequest {
    #[serde(default)]
    pub output: Option<Value>,
    #[serde(default)]
    pub raw: Option<String>,
}

impl ScorerRequest {
    pub fn model_output(&self) -> Result<Value, FallbackReason> {
        if let Some(value) = &self.output {
            return Ok(value.clone());
        }
        self.raw
            .as_deref()
            .and_then(scoring::parse_model_output)
            .ok_or(FallbackReason::UnparseableOutput)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThumbnailRequest {
    pub label: String,
    /// Base64 image bytes.
    pub image: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAnalysisResponse {
    pub analysis_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectResponse {
    pub analysis_id: String,
    pub people: Vec<DetectedPerson>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThumbnailResponse {
    pub label: String,
    pub path: String,
    /// Base64 JPEG.
    pub thumbnail: String,
}

/// A stored analysis with the derived views a client renders.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisView {
    #[serde(flatten)]
    pub record: AnalysisRecord,
    pub leaderboard: Vec<LeaderboardEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric_labels: Option<BTreeMap<&'static str, &'static str>>,
}

impl From<AnalysisRecord> for AnalysisView {
    fn from(record: AnalysisRecord) -> Self {
        let leaderboard = record
            .dominance
            .as_ref()
            .map(|d| scoring::leaderboard(&d.result, record.selected_label.as_deref()))
            .unwrap_or_default();
        let metric_labels = record.frame_mog.as_ref().map(|f| {
            ScoreKey::ALL
                .iter()
                .map(|key| (key.as_str(), metric_label(&f.result.photo_type, *key)))
                .collect()
        });
        Self { record, leaderboard, metric_labels }
    }
}
