use crate::util::round_to;

/// Centered moving average over a series with gaps.
///
/// Position `i` averages the present values in `i - window/2 ..= i + window/2`,
/// clipped to the series bounds. No present value in range gives `None`.
/// Results are rounded to 2 decimals.
pub fn centered_moving_average(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    let half = window / 2;
    (0..values.len())
        .map(|i| {
            let start = i.saturating_sub(half);
            let end = (i + half).min(values.len() - 1);
            let present: Vec<f64> = values[start..=end]
                .iter()
                .filter_map(|v| v.filter(|x| x.is_finite()))
                .collect();
            if present.is_empty() {
                None
            } else {
                round_to(present.iter().sum::<f64>() / present.len() as f64, 2)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_series_is_fixed_point() {
        for window in [5, 7] {
            let values = vec![Some(4.25); 12];
            assert_eq!(centered_moving_average(&values, window), values);
        }
    }

    #[test]
    fn test_window_shrinks_at_edges() {
        let values = vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(5.0)];
        let smoothed = centered_moving_average(&values, 5);
        // i=0 averages 1,2,3; i=2 averages all five; i=4 averages 3,4,5.
        assert_eq!(smoothed, vec![Some(2.0), Some(2.5), Some(3.0), Some(3.5), Some(4.0)]);
    }

    #[test]
    fn test_gaps_are_skipped_and_empty_windows_are_none() {
        let values = vec![None, None, None, None, Some(6.0), None];
        let smoothed = centered_moving_average(&values, 5);
        assert_eq!(smoothed, vec![None, None, Some(6.0), Some(6.0), Some(6.0), Some(6.0)]);
    }

    #[test]
    fn test_rounded_to_two_decimals() {
        let values = vec![Some(1.0), Some(1.0), Some(2.0)];
        assert_eq!(centered_moving_average(&values, 7), vec![Some(1.33); 3]);
    }

    #[test]
    fn test_empty_input() {
        assert!(centered_moving_average(&[], 5).is_empty());
    }
}
