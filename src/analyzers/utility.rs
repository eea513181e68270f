use geo::{Distance, Haversine, Point};

/// Great-circle distance in kilometres between two `(lat, lng)` points.
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    Haversine::distance(Point::new(lng1, lat1), Point::new(lng2, lat2)) / 1_000.0
}

/// Percentage change from `from` to `to`. Returns 0.0 when `from` is not positive.
pub fn pct_change(from: f64, to: f64) -> f64 {
    if from > 0.0 {
        (to - from) / from * 100.0
    } else {
        0.0
    }
}

/// Shortens a label to at most 40 characters, marking the cut with `...`.
pub fn shorten_label(label: &str) -> String {
    if label.chars().count() > 40 {
        let head: String = label.chars().take(37).collect();
        format!("{head}...")
    } else {
        label.to_string()
    }
}
