use tracing::debug;

use crate::core::confidence::by_confidence_desc;
use crate::core::model::Equipment;

/// Greedy non-maximum suppression.
///
/// Boxes of different categories never suppress each other. A box is dropped
/// when its IoU with an already-kept box reaches `iou_threshold`.
pub fn suppress(detections: &[Equipment], iou_threshold: f64) -> Vec<Equipment> {
    let mut order: Vec<usize> = (0..detections.len()).collect();
    // Stable sort keeps input order among equal confidences.
    order.sort_by(|&a, &b| by_confidence_desc(detections[a].confidence, detections[b].confidence));

    let mut keep: Vec<&Equipment> = Vec::with_capacity(detections.len());
    for idx in order {
        let candidate = &detections[idx];
        if candidate.bbox.is_degenerate() {
            continue;
        }
        let overlapped = keep.iter().any(|kept| {
            kept.category == candidate.category && kept.bbox.iou(&candidate.bbox) >= iou_threshold
        });
        if !overlapped {
            keep.push(candidate);
        }
    }

    debug!("nms kept {} of {} detections", keep.len(), detections.len());
    keep.into_iter().cloned().collect()
}
