//! Assertions for stitched sample sequences.
//!
//! The `TIM` column is compared in its zero-padded `HHMM` form, which is how
//! station time-of-day values are usually read.

/// Tolerance used when none is given
pub const DEFAULT_EPSILON: f32 = 1e-6;

fn within(actual: f32, expected: f32, epsilon: f32) -> bool {
    (actual - expected).abs() <= epsilon || (actual.is_nan() && expected.is_nan())
}

/// # Panics
///
/// Panics if `actual` differs from `expected` by more than `epsilon`.
pub fn assert_approx_eq(actual: f32, expected: f32, epsilon: Option<f32>) {
    let epsilon = epsilon.unwrap_or(DEFAULT_EPSILON);
    assert!(
        within(actual, expected, epsilon),
        "{} is not within {} of {}",
        actual,
        epsilon,
        expected
    );
}

/// Element-wise [`assert_approx_eq`] that also reports the first bad index
pub fn assert_array_approx_eq(actual: &[f32], expected: &[f32], epsilon: Option<f32>) {
    let epsilon = epsilon.unwrap_or(DEFAULT_EPSILON);
    assert_eq!(actual.len(), expected.len(), "sample counts differ");
    if let Some(i) = (0..actual.len()).find(|&i| !within(actual[i], expected[i], epsilon)) {
        panic!(
            "samples differ at index {}: {} vs {} (epsilon {})\nactual:   {:?}\nexpected: {:?}",
            i, actual[i], expected[i], epsilon, actual, expected
        );
    }
}

/// Render `TIM` samples as zero-padded `HHMM` strings
pub fn format_times(samples: &[f32]) -> Vec<String> {
    samples
        .iter()
        .map(|v| format!("{:04}", v.round() as i32))
        .collect()
}

pub fn assert_times(samples: &[f32], expected: &[&str]) {
    pretty_assertions::assert_eq!(format_times(samples), expected);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approx_helpers() {
        assert_approx_eq(68.0, 68.00001, Some(1e-3));
        assert_array_approx_eq(&[1.0, f32::NAN], &[1.0, f32::NAN], None);
    }

    #[test]
    #[should_panic(expected = "index 1")]
    fn test_array_mismatch_reports_index() {
        assert_array_approx_eq(&[1.0, 2.0], &[1.0, 3.0], None);
    }

    #[test]
    fn test_format_times() {
        assert_eq!(format_times(&[0.0, 10.0, 2350.0]), vec!["0000", "0010", "2350"]);
    }
}
