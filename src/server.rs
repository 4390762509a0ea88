use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::Value;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::detect::{
    crop::crop_face_thumbnail, dedupe_faces, label_to_path, parse_detector_output, sort_by_position_and_assign_labels,
    LabelCandidate,
};
use crate::error::ApiError;
use crate::protocol::{
    AnalysisView, CreateAnalysisResponse, DetectRequest, DetectResponse, HealthResponse, ScorerRequest, SelectRequest,
    ThumbnailRequest, ThumbnailResponse,
};
use crate::scoring::{
    clamp_and_sanitize_dominance, clamp_and_sanitize_frame_mog, generate_fallback_dominance, matches_labels,
    photography_fallback, user_rank_of, DominanceResult, FallbackReason, SafeDefault, Validated,
};
use crate::store::{AnalysisRecord, AnalysisStatus, AnalysisStore, Calibration, Scored};

const CALIBRATION_VERSION: &str = "cal_v1";

#[derive(Clone)]
pub struct AppState {
    pub store: AnalysisStore,
    pub config: PipelineConfig,
}

impl AppState {
    pub fn new(config: PipelineConfig) -> Self {
        Self { store: AnalysisStore::new(), config }
    }

    async fn record(&self, id: &str) -> Result<AnalysisRecord, ApiError> {
        self.store
            .get(id)
            .await
            .ok_or_else(|| ApiError::AnalysisNotFound(id.to_string()))
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/config", get(config))
        .route("/analysis", post(create_analysis))
        .route("/analysis/:id", get(get_analysis))
        .route("/analysis/:id/detect", post(detect))
        .route("/analysis/:id/select", post(select))
        .route("/analysis/:id/dominance", post(dominance))
        .route("/analysis/:id/frame-mog", post(frame_mog))
        .route("/analysis/:id/thumbnail", post(thumbnail))
        .layer(
            CorsLayer::new()
                .allow_methods(Any)
                .allow_origin(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn config(State(state): State<AppState>) -> Json<PipelineConfig> {
    Json(state.config.clone())
}

async fn create_analysis(State(state): State<AppState>) -> (StatusCode, Json<CreateAnalysisResponse>) {
    let record = state.store.create().await;
    info!("event" = "analysis.created", analysis_id = %record.id);
    (
        StatusCode::CREATED,
        Json(CreateAnalysisResponse { analysis_id: record.id }),
    )
}

async fn get_analysis(Path(id): Path<String>, State(state): State<AppState>) -> Result<Json<AnalysisView>, ApiError> {
    Ok(Json(state.record(&id).await?.into()))
}

/// Parse, deduplicate and label detector output.
///
/// Labels are assigned once per analysis; later calls return the stored
/// people unchanged.
async fn detect(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(req): Json<DetectRequest>,
) -> Result<Json<DetectResponse>, ApiError> {
    let threshold = match req.threshold {
        Some(t) if !(0.0..=1.0).contains(&t) => {
            return Err(ApiError::BadRequest(format!("threshold must be within [0, 1], got {t}")));
        }
        Some(t) => t,
        None => state.config.dedupe_threshold,
    };

    let existing = state.record(&id).await?;
    if !existing.people.is_empty() {
        info!("event" = "detect.reused", analysis_id = %id, people = existing.people.len());
        return Ok(Json(DetectResponse { analysis_id: id, people: existing.people }));
    }

    let raw = req
        .detector_output()
        .map(|value| parse_detector_output(&value))
        .unwrap_or_default();
    let faces = dedupe_faces(&raw, threshold);
    if faces.is_empty() {
        const NO_FACES: &str = "no faces detected";
        warn!("event" = "detect.empty", analysis_id = %id, raw = raw.len());
        state
            .store
            .update(&id, |r| {
                if r.people.is_empty() {
                    r.fail(NO_FACES);
                }
            })
            .await;
        return Err(ApiError::BadRequest(NO_FACES.to_string()));
    }

    let candidates: Vec<LabelCandidate> = faces
        .iter()
        .enumerate()
        .map(|(i, face)| LabelCandidate {
            id: format!("face-{i}"),
            bbox: face.bbox,
            confidence: None,
        })
        .collect();
    let labeled = sort_by_position_and_assign_labels(&candidates);
    let (raw_count, kept) = (raw.len(), faces.len());

    let people = state
        .store
        .update(&id, |r| {
            // A concurrent detect may have labeled the analysis first.
            if r.people.is_empty() {
                r.faces = faces;
                r.people = labeled;
                r.status = AnalysisStatus::Selecting;
                r.error_message = None;
            }
            r.people.clone()
        })
        .await
        .ok_or_else(|| ApiError::AnalysisNotFound(id.clone()))?;

    info!("event" = "detect.deduped", analysis_id = %id, raw = raw_count, kept, threshold);
    Ok(Json(DetectResponse { analysis_id: id, people }))
}

async fn select(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(req): Json<SelectRequest>,
) -> Result<Json<AnalysisView>, ApiError> {
    let label = req.label.trim().to_string();
    let record = state
        .store
        .update(&id, |r| {
            let Some(person) = r.person(&label) else {
                return Err(ApiError::PersonNotFound(label.clone()));
            };
            let label = person.label.clone();
            if let Some(scored) = r.dominance.as_mut() {
                scored.result.user_rank = user_rank_of(&scored.result.people, &label);
                scored.result.user_label = Some(label.clone());
            }
            r.selected_label = Some(label);
            if let Some(answers) = req.answers.filter(Value::is_object) {
                r.calibration = Some(Calibration {
                    answers,
                    version: req.version.unwrap_or_else(|| CALIBRATION_VERSION.to_string()),
                });
            }
            Ok(r.clone())
        })
        .await
        .ok_or_else(|| ApiError::AnalysisNotFound(id.clone()))??;

    info!("event" = "analysis.selected", analysis_id = %id, %label);
    Ok(Json(record.into()))
}

fn rank_people(record: &AnalysisRecord, req: &ScorerRequest, min_ranked_people: usize) -> Scored<DominanceResult> {
    let labels = record.labels();
    let validated = req.model_output().map_or_else(Validated::Fallback, |value| {
        clamp_and_sanitize_dominance(&value).and_then(|result| {
            if matches_labels(&result, &labels) {
                Validated::Valid(result)
            } else {
                Validated::Fallback(FallbackReason::LabelMismatch)
            }
        })
    });

    let mut scored = match validated {
        Validated::Valid(result) => Scored::model(result),
        Validated::Fallback(reason) => {
            warn!("event" = "dominance.fallback", analysis_id = %record.id, %reason, people = labels.len());
            let result = if labels.len() >= min_ranked_people {
                generate_fallback_dominance(&record.id, &labels)
            } else {
                DominanceResult::safe_default()
            };
            Scored::fallback(result, reason)
        }
    };

    let result = &mut scored.result;
    if result.user_label.is_none() {
        result.user_label = record.selected_label.clone();
    }
    if result.user_rank.is_none() {
        result.user_rank = result
            .user_label
            .as_deref()
            .and_then(|label| user_rank_of(&result.people, label));
    }
    scored
}

async fn dominance(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(req): Json<ScorerRequest>,
) -> Result<Json<AnalysisView>, ApiError> {
    let record = state.record(&id).await?;
    let scored = rank_people(&record, &req, state.config.min_ranked_people);
    let source = scored.source;

    let record = state
        .store
        .update(&id, |r| {
            r.dominance = Some(scored);
            r.clone()
        })
        .await
        .ok_or_else(|| ApiError::AnalysisNotFound(id.clone()))?;

    info!("event" = "dominance.scored", analysis_id = %id, ?source);
    Ok(Json(record.into()))
}

async fn frame_mog(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(req): Json<ScorerRequest>,
) -> Result<Json<AnalysisView>, ApiError> {
    let record = state.record(&id).await?;
    if record.selected_label.is_none() {
        return Err(ApiError::Conflict("select a person before scoring the photo".to_string()));
    }

    let scored = match req
        .model_output()
        .map_or_else(Validated::Fallback, |value| clamp_and_sanitize_frame_mog(&value))
    {
        Validated::Valid(result) => Scored::model(result),
        Validated::Fallback(reason) => {
            warn!("event" = "frame_mog.fallback", analysis_id = %id, %reason);
            Scored::fallback(photography_fallback(), reason)
        }
    };
    let (overall, source) = (scored.result.overall_score, scored.source);

    let record = state
        .store
        .update(&id, |r| {
            r.frame_mog = Some(scored);
            r.status = AnalysisStatus::Complete;
            r.clone()
        })
        .await
        .ok_or_else(|| ApiError::AnalysisNotFound(id.clone()))?;

    info!("event" = "frame_mog.scored", analysis_id = %id, overall, ?source);
    Ok(Json(record.into()))
}

async fn thumbnail(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(req): Json<ThumbnailRequest>,
) -> Result<Json<ThumbnailResponse>, ApiError> {
    let record = state.record(&id).await?;
    let person = record
        .person(&req.label)
        .ok_or_else(|| ApiError::PersonNotFound(req.label.clone()))?;

    // Accept data URLs as well as bare base64.
    let encoded = req
        .image
        .split_once("base64,")
        .map_or(req.image.as_str(), |(_, data)| data)
        .trim();
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|err| ApiError::BadRequest(format!("image is not valid base64: {err}")))?;

    let jpeg = crop_face_thumbnail(&bytes, &person.bbox, &state.config.thumbnail)?;
    let path = format!("phase1/{}/{}.jpg", record.id, label_to_path(&person.label));
    info!("event" = "thumbnail.cropped", analysis_id = %id, %path, bytes = jpeg.len());

    Ok(Json(ThumbnailResponse {
        label: person.label.clone(),
        path,
        thumbnail: STANDARD.encode(jpeg),
    }))
}
