use tracing::debug;

use super::{iou, RawFace};

/// Collapse duplicate detections of the same face.
///
/// Implausible boxes are dropped and the rest clamped. Faces are then merged
/// greedily in detector index order: a face overlapping an already kept face
/// by more than `threshold` IoU replaces it when its box is strictly larger,
/// otherwise it is dropped. Survivors are ordered by horizontal center and
/// renumbered `0..N`.
///
/// The merge is repeated until a pass removes nothing, because replacing a
/// kept face with a larger one can make it overlap a neighbour. This makes
/// the function idempotent for a fixed threshold.
pub fn dedupe_faces(faces: &[RawFace], threshold: f64) -> Vec<RawFace> {
    let mut current: Vec<RawFace> = faces
        .iter()
        .filter(|f| f.bbox.is_plausible())
        .map(|f| RawFace::new(f.left_to_right_index, f.bbox.clamped()))
        .filter(|f| f.bbox.area() > 0.0)
        .collect();

    let dropped = faces.len() - current.len();
    if dropped > 0 {
        debug!("event" = "dedupe.discarded", dropped, total = faces.len());
    }

    loop {
        let before = current.len();
        current = merge_pass(current, threshold);
        if current.len() == before {
            return current;
        }
    }
}

fn merge_pass(mut faces: Vec<RawFace>, threshold: f64) -> Vec<RawFace> {
    faces.sort_by_key(|f| f.left_to_right_index);

    let mut kept: Vec<RawFace> = Vec::with_capacity(faces.len());
    for face in faces {
        match kept.iter().position(|k| iou(&face.bbox, &k.bbox) > threshold) {
            None => kept.push(face),
            Some(i) => {
                if face.bbox.area() > kept[i].bbox.area() {
                    kept[i] = face;
                }
            }
        }
    }

    kept.sort_by(|a, b| a.bbox.center_x().total_cmp(&b.bbox.center_x()));
    kept.into_iter()
        .enumerate()
        .map(|(i, f)| RawFace::new(i as i64, f.bbox))
        .collect()
}
