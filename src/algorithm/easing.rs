//! Progress math shared by the scrub engine.

/// Converts an accumulated input distance into a fraction of one traversal,
/// clamped to `[0, 1]` however far the accumulator has run.
pub fn raw_progress(accumulator: f64, scroll_distance: f64) -> f64 {
    if !accumulator.is_finite() || scroll_distance <= 0.0 {
        return if accumulator > 0.0 { 1.0 } else { 0.0 };
    }
    (accumulator / scroll_distance).clamp(0.0, 1.0)
}

/// Cubic ease-out: fast start, decelerating towards 1.
pub fn ease_out_cubic(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    1.0 - (1.0 - t).powi(3)
}

pub fn eased_progress(raw: f64, enable_easing: bool) -> f64 {
    if enable_easing {
        ease_out_cubic(raw)
    } else {
        raw.clamp(0.0, 1.0)
    }
}

pub fn target_time(progress: f64, duration: f64) -> f64 {
    (progress * duration).max(0.0)
}
