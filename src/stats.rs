//! Statistical aggregation over groups of congestion readings.
//!
//! Every aggregate returns `Option<f64>`: `None` is "no data" and must reach
//! the payload as `null`, never as `0` or `NaN`.

use crate::types::CongestionRecord;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use tracing::error;

/// Which population a series summarizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// All locations pooled together.
    Pooled,
    /// One location on its own.
    SingleLocation,
}

impl Scope {
    pub const ALL: [Scope; 2] = [Scope::Pooled, Scope::SingleLocation];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregator {
    /// Volume-weighted mean over records with a positive weight.
    WeightedMean,
    /// Plain median over present values; weights are ignored.
    Median,
}

/// Aggregator per scope.
pub static POLICY: Lazy<HashMap<Scope, Aggregator>> = Lazy::new(|| {
    HashMap::from([
        (Scope::Pooled, Aggregator::WeightedMean),
        (Scope::SingleLocation, Aggregator::Median),
    ])
});

pub fn aggregator_for(scope: Scope) -> Aggregator {
    match POLICY.get(&scope) {
        Some(a) => *a,
        None => {
            debug_assert!(false, "no aggregator registered for {:?}", scope);
            error!(?scope, "No aggregator registered; falling back to median");
            Aggregator::Median
        }
    }
}

/// The two measured channels of a congestion reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Congestion,
    Delay,
}

impl Channel {
    pub fn value(self, r: &CongestionRecord) -> Option<f64> {
        match self {
            Channel::Congestion => r.congestion_index,
            Channel::Delay => r.delay,
        }
    }
}

impl Aggregator {
    pub fn apply(self, group: &[&CongestionRecord], channel: Channel) -> Option<f64> {
        match self {
            Aggregator::WeightedMean => {
                weighted_mean(group.iter().map(|r| (channel.value(r), r.volume)))
            }
            Aggregator::Median => median(group.iter().filter_map(|r| channel.value(r)).collect()),
        }
    }
}

/// `sum(v * w) / sum(w)` over the pairs where both are present and `w > 0`.
pub fn weighted_mean<I>(pairs: I) -> Option<f64>
where
    I: IntoIterator<Item = (Option<f64>, Option<f64>)>,
{
    let mut num = 0.0;
    let mut den = 0.0;
    for (value, weight) in pairs {
        if let (Some(v), Some(w)) = (value, weight) {
            if w > 0.0 && v.is_finite() && w.is_finite() {
                num += v * w;
                den += w;
            }
        }
    }
    if den > 0.0 {
        Some(num / den)
    } else {
        None
    }
}

pub fn median(mut v: Vec<f64>) -> Option<f64> {
    // We accept `Vec<f64>` by value so the function can sort in-place
    // without cloning at the call site.
    v.retain(|x| x.is_finite());
    if v.is_empty() {
        return None;
    }
    v.sort_by(|a, b| a.total_cmp(b));
    let mid = v.len() / 2;
    if v.len() % 2 == 1 {
        Some(v[mid])
    } else {
        Some((v[mid - 1] + v[mid]) / 2.0)
    }
}

/// Arithmetic mean; `None` for an empty slice.
pub fn mean(v: &[f64]) -> Option<f64> {
    if v.is_empty() {
        return None;
    }
    Some(v.iter().sum::<f64>() / v.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TimeBucket;
    use chrono::NaiveDate;

    fn weighted(group: &[&CongestionRecord], channel: Channel) -> Option<f64> {
        Aggregator::WeightedMean.apply(group, channel)
    }

    fn reading(ci: Option<f64>, delay: Option<f64>, volume: Option<f64>) -> CongestionRecord {
        CongestionRecord {
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            clock_time: Some("07:00".to_string()),
            location: Some("Bridge".to_string()),
            bucket: TimeBucket::Morning,
            congestion_index: ci,
            delay,
            volume,
        }
    }

    #[test]
    fn test_weighted_mean_basic() {
        let a = reading(Some(1.0), Some(2.0), Some(100.0));
        let b = reading(Some(3.0), Some(4.0), Some(300.0));
        let group = vec![&a, &b];
        assert_eq!(weighted(&group, Channel::Congestion), Some(2.5));
        assert_eq!(weighted(&group, Channel::Delay), Some(3.5));
    }

    #[test]
    fn test_weighted_mean_skips_ineligible_records() {
        let a = reading(Some(1.0), None, Some(100.0));
        let b = reading(Some(50.0), Some(9.0), Some(0.0));
        let c = reading(None, Some(5.0), Some(10.0));
        let d = reading(Some(70.0), Some(7.0), None);
        let group = vec![&a, &b, &c, &d];
        assert_eq!(weighted(&group, Channel::Congestion), Some(1.0));
        assert_eq!(weighted(&group, Channel::Delay), Some(5.0));
    }

    #[test]
    fn test_weighted_mean_no_eligible_is_none() {
        let a = reading(Some(1.0), Some(1.0), Some(0.0));
        let b = reading(Some(2.0), Some(2.0), Some(-5.0));
        let c = reading(None, None, Some(10.0));
        let group = vec![&a, &b, &c];
        assert_eq!(weighted(&group, Channel::Congestion), None);
        assert_eq!(weighted(&group, Channel::Delay), None);
        assert_eq!(weighted(&[], Channel::Congestion), None);
    }

    #[test]
    fn test_median_ignores_weights_and_missing() {
        let a = reading(Some(1.0), None, Some(0.0));
        let b = reading(Some(10.0), None, None);
        let c = reading(None, None, Some(5.0));
        let d = reading(Some(4.0), None, Some(1.0));
        let group = vec![&a, &b, &c, &d];
        assert_eq!(Aggregator::Median.apply(&group, Channel::Congestion), Some(4.0));
        assert_eq!(Aggregator::Median.apply(&group, Channel::Delay), None);
    }

    #[test]
    fn test_median_even_count() {
        assert_eq!(median(vec![4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(vec![]), None);
    }

    #[test]
    fn test_policy_table() {
        for scope in Scope::ALL {
            assert!(POLICY.contains_key(&scope), "{:?} has no aggregator", scope);
        }
        assert_eq!(aggregator_for(Scope::Pooled), Aggregator::WeightedMean);
        assert_eq!(aggregator_for(Scope::SingleLocation), Aggregator::Median);
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[1.0, 2.0, 6.0]), Some(3.0));
        assert_eq!(mean(&[]), None);
    }
}
