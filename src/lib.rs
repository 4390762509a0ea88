//! Group-photo pipeline: turn noisy face detections into stable, labeled
//! people, and guard scoring-model output so callers always get a
//! well-formed result.

pub mod config;
pub mod detect;
pub mod error;
pub mod protocol;
pub mod scoring;
pub mod server;
pub mod store;

pub use config::{PipelineConfig, ServerConfig, ThumbnailConfig};
pub use detect::{dedupe_faces, iou, parse_detector_output, sort_by_position_and_assign_labels, NormalizedBox, RawFace};
pub use scoring::{FallbackReason, SafeDefault, Validated};
