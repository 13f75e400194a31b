use lanetap::analytics::SessionSummary;

/// `(level, mean reaction ms)` for every level that had a timed hit.
pub fn reaction_points(summaries: &[SessionSummary]) -> Vec<(f64, f64)> {
    summaries
        .iter()
        .enumerate()
        .filter_map(|(i, s)| s.mean_reaction_millis.map(|ms| ((i + 1) as f64, ms)))
        .collect()
}

/// Compute X (levels) and Y (milliseconds) bounds for the results chart
pub fn compute_chart_params(points: &[(f64, f64)], level_count: usize) -> (f64, f64) {
    let highest = points.iter().map(|&(_, ms)| ms).fold(0.0, f64::max);
    let levels = points
        .last()
        .map(|p| p.0)
        .unwrap_or(level_count as f64)
        .max(level_count as f64)
        .max(1.0);

    (levels, highest.ceil())
}

/// Format a simple numeric label consistently
pub fn format_label(val: f64) -> String {
    if (val - val.round()).abs() < f64::EPSILON {
        format!("{}", val.round())
    } else {
        format!("{val:.2}")
    }
}
