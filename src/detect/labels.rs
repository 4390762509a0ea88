use serde::{Deserialize, Serialize};

use super::NormalizedBox;

/// Input to labeling: a detected box with an opaque id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelCandidate {
    pub id: String,
    #[serde(rename = "box")]
    pub bbox: NormalizedBox,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// A person in an analysis, addressed by its label everywhere downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedPerson {
    pub id: String,
    pub label: String,
    #[serde(rename = "box")]
    pub bbox: NormalizedBox,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// `Person A` .. `Person Z`, `Person AA`, `Person AB`, ...
///
/// Bijective base 26, the same scheme spreadsheets use for column names.
pub fn person_label(index: usize) -> String {
    let mut letters = Vec::new();
    let mut n = index as u64;
    loop {
        letters.push(b'A' + (n % 26) as u8);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    letters.reverse();
    format!("Person {}", String::from_utf8_lossy(&letters))
}

/// "Person A" -> "Person_A", for storage keys.
pub fn label_to_path(label: &str) -> String {
    label.split_whitespace().collect::<Vec<_>>().join("_")
}

/// Orders people left to right (top to bottom on equal centers) and labels them.
///
/// The sort is stable, so the same boxes in the same input order always get
/// the same labels.
pub fn sort_by_position_and_assign_labels(items: &[LabelCandidate]) -> Vec<DetectedPerson> {
    let mut sorted: Vec<&LabelCandidate> = items.iter().collect();
    sorted.sort_by(|a, b| {
        a.bbox
            .center_x()
            .total_cmp(&b.bbox.center_x())
            .then_with(|| a.bbox.center_y().total_cmp(&b.bbox.center_y()))
    });
    sorted
        .into_iter()
        .enumerate()
        .map(|(i, item)| DetectedPerson {
            id: item.id.clone(),
            label: person_label(i),
            bbox: item.bbox,
            confidence: item.confidence,
        })
        .collect()
}
