use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tokio::sync::RwLock;

use crate::detect::{DetectedPerson, RawFace};
use crate::scoring::{DominanceResult, FallbackReason, FrameMogResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnalysisStatus {
    Created,
    Selecting,
    Complete,
    Failed,
}

/// Where a stored score came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreSource {
    Model,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Scored<T> {
    pub result: T,
    pub source: ScoreSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<FallbackReason>,
}

impl<T> Scored<T> {
    pub fn model(result: T) -> Self {
        Self { result, source: ScoreSource::Model, fallback_reason: None }
    }

    pub fn fallback(result: T, reason: FallbackReason) -> Self {
        Self { result, source: ScoreSource::Fallback, fallback_reason: Some(reason) }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    pub id: String,
    pub status: AnalysisStatus,
    pub created_at: String,
    pub faces: Vec<RawFace>,
    pub people: Vec<DetectedPerson>,
    pub dominance: Option<Scored<DominanceResult>>,
    pub selected_label: Option<String>,
    pub frame_mog: Option<Scored<FrameMogResult>>,
    pub calibration: Option<Calibration>,
    /// Why the last step failed; cleared when a later step succeeds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Answers the user gave about themselves when picking their face.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Calibration {
    pub answers: Value,
    pub version: String,
}

impl AnalysisRecord {
    pub fn new(id: String) -> Self {
        Self {
            id,
            status: AnalysisStatus::Created,
            created_at: OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default(),
            faces: Vec::new(),
            people: Vec::new(),
            dominance: None,
            selected_label: None,
            frame_mog: None,
            calibration: None,
            error_message: None,
        }
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = AnalysisStatus::Failed;
        self.error_message = Some(message.into());
    }

    pub fn labels(&self) -> Vec<&str> {
        self.people.iter().map(|p| p.label.as_str()).collect()
    }

    pub fn person(&self, label: &str) -> Option<&DetectedPerson> {
        let label = label.trim();
        self.people.iter().find(|p| p.label == label)
    }
}

/// Analyses kept in process memory, keyed by id.
///
/// Nothing is evicted: records live until the process exits.
#[derive(Clone, Default)]
pub struct AnalysisStore {
    records: Arc<RwLock<HashMap<String, AnalysisRecord>>>,
}

impl AnalysisStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self) -> AnalysisRecord {
        let record = AnalysisRecord::new(uuid::Uuid::new_v4().to_string());
        let mut records = self.records.write().await;
        records.insert(record.id.clone(), record.clone());
        record
    }

    pub async fn get(&self, id: &str) -> Option<AnalysisRecord> {
        self.records.read().await.get(id).cloned()
    }

    /// Run `f` on the record under the write lock. None if the id is unknown.
    pub async fn update<R>(&self, id: &str, f: impl FnOnce(&mut AnalysisRecord) -> R) -> Option<R> {
        let mut records = self.records.write().await;
        records.get_mut(id).map(f)
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
