pub mod crop;
pub mod dedupe;
pub mod labels;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use dedupe::dedupe_faces;
pub use labels::{label_to_path, person_label, sort_by_position_and_assign_labels, DetectedPerson, LabelCandidate};

/// Smallest width/height a clamped box may be given before it is cut at the image edge.
pub const MIN_BOX_EXTENT: f64 = 0.02;

/// How far a detector may drift past the top/left edge before the box is discarded.
pub const EDGE_TOLERANCE: f64 = 0.05;

/// A rectangle in fractions of the image size, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedBox {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl NormalizedBox {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    pub fn area(&self) -> f64 {
        self.w.max(0.0) * self.h.max(0.0)
    }

    pub fn center_x(&self) -> f64 {
        self.x + self.w / 2.0
    }

    pub fn center_y(&self) -> f64 {
        self.y + self.h / 2.0
    }

    /// Detector output is usable only with finite fields, positive extent and
    /// a top-left corner no further than [`EDGE_TOLERANCE`] outside the image.
    pub fn is_plausible(&self) -> bool {
        let finite = [self.x, self.y, self.w, self.h].iter().all(|v| v.is_finite());
        finite
            && self.w > 0.0
            && self.h > 0.0
            && self.x >= -EDGE_TOLERANCE
            && self.y >= -EDGE_TOLERANCE
    }

    /// Pull the box inside the unit square.
    ///
    /// The origin is clamped to `[0, 1]`, the extent to `[MIN_BOX_EXTENT, 1]`,
    /// and the extent is then cut so the box never runs past the right or
    /// bottom edge. Clamping an already clamped box is a no-op.
    pub fn clamped(&self) -> NormalizedBox {
        let x = self.x.clamp(0.0, 1.0);
        let y = self.y.clamp(0.0, 1.0);
        let w = self.w.clamp(MIN_BOX_EXTENT, 1.0);
        let h = self.h.clamp(MIN_BOX_EXTENT, 1.0);
        NormalizedBox {
            x,
            y,
            w: w.min(1.0 - x),
            h: h.min(1.0 - y),
        }
    }

    fn from_value(value: &Value) -> Option<NormalizedBox> {
        let field = |name: &str| value.get(name).and_then(Value::as_f64);
        Some(NormalizedBox {
            x: field("x")?,
            y: field("y")?,
            w: field("w")?,
            h: field("h")?,
        })
    }
}

/// Intersection over union of two axis-aligned boxes.
///
/// Works on raw coordinates without assuming normalization. Disjoint,
/// touching and zero-area boxes give `0.0`; the result is always in `[0, 1]`.
pub fn iou(a: &NormalizedBox, b: &NormalizedBox) -> f64 {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = (a.x + a.w).min(b.x + b.w);
    let y2 = (a.y + a.h).min(b.y + b.h);
    if !(x2 > x1 && y2 > y1) {
        return 0.0;
    }
    let inter = (x2 - x1) * (y2 - y1);
    let union = a.area() + b.area() - inter;
    if union > 0.0 {
        (inter / union).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// One face as proposed by the external vision detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawFace {
    /// Ordering hint from the detector, not authoritative.
    pub left_to_right_index: i64,
    #[serde(rename = "box")]
    pub bbox: NormalizedBox,
}

impl RawFace {
    pub fn new(left_to_right_index: i64, bbox: NormalizedBox) -> Self {
        Self { left_to_right_index, bbox }
    }
}

/// Reads `{ "faces": [...] }` detector output.
///
/// Entries without a numeric `x`, `y`, `w` and `h` are dropped; a missing
/// index becomes 0. Anything that is not an object with a `faces` array
/// yields no faces.
pub fn parse_detector_output(value: &Value) -> Vec<RawFace> {
    let Some(faces) = value.get("faces").and_then(Value::as_array) else {
        return Vec::new();
    };
    faces
        .iter()
        .filter_map(|face| {
            let bbox = NormalizedBox::from_value(face.get("box")?)?;
            let left_to_right_index = face
                .get("left_to_right_index")
                .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
                .unwrap_or(0);
            Some(RawFace { left_to_right_index, bbox })
        })
        .collect()
}
