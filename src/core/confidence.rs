/// Maps any incoming confidence onto `[0, 1]`; NaN and infinities become `0`.
pub fn sanitize_confidence(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

pub fn passes_threshold(confidence: f64, min_confidence: f64) -> bool {
    sanitize_confidence(confidence) >= sanitize_confidence(min_confidence)
}

/// Orders by confidence descending, NaN-safe.
pub fn by_confidence_desc(a: f64, b: f64) -> std::cmp::Ordering {
    sanitize_confidence(b).total_cmp(&sanitize_confidence(a))
}
