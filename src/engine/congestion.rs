//! Congestion and delay chart over date or clock time.

use crate::config::Settings;
use crate::engine::chart::{palette_color, ChartSpec, Trace};
use crate::engine::filter::Selection;
use crate::engine::smoothing::centered_moving_average;
use crate::payload::{clock_key, clock_raw_key, series_key, CongestionPayload, ALL_LOCATIONS};
use crate::stats::mean;
use crate::types::TimeBucket;
use crate::util::{iso_date, round_opt};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CongestionMetric {
    #[default]
    Congestion,
    Delay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Axis {
    #[default]
    Date,
    ClockTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CongestionFilter {
    pub locations: Selection,
    pub metric: CongestionMetric,
    pub axis: Axis,
    pub bucket: TimeBucket,
    /// Inclusive lower bound on the date.
    pub start_date: Option<NaiveDate>,
}

impl CongestionFilter {
    /// Filter with the start date seeded from the first date that has data
    /// for the chosen metric.
    pub fn with_default_start(
        locations: Selection,
        metric: CongestionMetric,
        axis: Axis,
        bucket: TimeBucket,
        payload: &CongestionPayload,
    ) -> Self {
        let first = match metric {
            CongestionMetric::Congestion => payload.first_congestion_date.as_deref(),
            CongestionMetric::Delay => payload.first_delay_date.as_deref(),
        };
        CongestionFilter {
            locations,
            metric,
            axis,
            bucket,
            start_date: first.and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()),
        }
    }
}

/// Locations drawn for a selection: the pooled series when unconstrained.
fn shown_locations(selection: &Selection) -> Vec<&str> {
    match selection.explicit() {
        None => vec![ALL_LOCATIONS],
        Some(v) => v,
    }
}

fn pick(metric: CongestionMetric, congestion: Option<f64>, delay: Option<f64>) -> Option<f64> {
    match metric {
        CongestionMetric::Congestion => congestion,
        CongestionMetric::Delay => delay,
    }
}

pub fn congestion_chart(
    filter: &CongestionFilter,
    payload: &CongestionPayload,
    settings: &Settings,
) -> ChartSpec {
    let shown = shown_locations(&filter.locations);
    let traces = match filter.axis {
        Axis::Date => date_traces(filter, &shown, payload, settings),
        Axis::ClockTime => clock_traces(filter, &shown, payload),
    };

    let metric_title = match filter.metric {
        CongestionMetric::Congestion => "Congestion",
        CongestionMetric::Delay => "Bus delay",
    };
    let where_ = if filter.locations.is_unconstrained() {
        "all locations".to_string()
    } else {
        shown.join(", ")
    };
    ChartSpec {
        title: format!(
            "{} - {} ({})",
            metric_title,
            where_,
            filter.bucket.label().to_lowercase()
        ),
        x_title: match filter.axis {
            Axis::Date => "Date".to_string(),
            Axis::ClockTime => "Clock time".to_string(),
        },
        y_title: match filter.metric {
            CongestionMetric::Congestion => "Congestion (min/km)".to_string(),
            CongestionMetric::Delay => "Delay (min)".to_string(),
        },
        traces,
        show_legend: !filter.locations.is_unconstrained() && shown.len() > 1,
    }
}

fn date_traces(
    filter: &CongestionFilter,
    shown: &[&str],
    payload: &CongestionPayload,
    settings: &Settings,
) -> Vec<Trace> {
    let start = filter.start_date.map(iso_date);
    let in_range = |iso: &str| start.as_deref().map_or(true, |s| iso >= s);

    // Per location: ISO date -> (display date, value).
    let mut per_location: Vec<(&str, HashMap<&str, (&str, Option<f64>)>)> = Vec::new();
    let mut all_dates: BTreeSet<&str> = BTreeSet::new();
    for &loc in shown {
        let Some(series) = payload.by_date.get(&series_key(loc, filter.bucket)) else {
            continue;
        };
        let mut points = HashMap::new();
        for i in 0..series.len() {
            let iso = series.dates_iso[i].as_str();
            if !in_range(iso) {
                continue;
            }
            all_dates.insert(iso);
            let value = pick(filter.metric, series.congestion[i], series.delay[i]);
            points.insert(iso, (series.dates[i].as_str(), value));
        }
        per_location.push((loc, points));
    }

    // Display label from the first shown series that has the date.
    let x: Vec<String> = all_dates
        .iter()
        .map(|iso| {
            per_location
                .iter()
                .find_map(|(_, points)| points.get(iso).map(|(d, _)| d.to_string()))
                .unwrap_or_else(|| iso.to_string())
        })
        .collect();

    let mut traces = Vec::new();
    for (idx, (loc, points)) in per_location.iter().enumerate() {
        let y: Vec<Option<f64>> = all_dates
            .iter()
            .map(|iso| points.get(iso).and_then(|(_, v)| *v))
            .collect();
        let trend = centered_moving_average(&y, settings.date_window);
        let color = palette_color(idx);
        traces.push(Trace::markers(loc, x.clone(), y, color));
        traces.push(Trace::line(loc, x.clone(), trend, color));
    }
    traces
}

fn clock_traces(filter: &CongestionFilter, shown: &[&str], payload: &CongestionPayload) -> Vec<Trace> {
    let profiles: Vec<(&str, BTreeMap<String, Option<f64>>)> = shown
        .iter()
        .filter_map(|loc| clock_profile(filter, loc, payload).map(|p| (*loc, p)))
        .collect();

    let clocks: BTreeSet<&String> = profiles.iter().flat_map(|(_, p)| p.keys()).collect();
    let x: Vec<String> = clocks.iter().map(|c| c.to_string()).collect();

    profiles
        .iter()
        .enumerate()
        .map(|(idx, (loc, profile))| {
            let y = x.iter().map(|c| profile.get(c).copied().flatten()).collect();
            Trace::bar(loc, x.clone(), y, palette_color(idx))
        })
        .collect()
}

/// Value per clock time for one location.
///
/// While the start date excludes no reading the precomputed clock series is
/// exact and used as is. Otherwise the raw view is re-aggregated: records
/// dated on or after the start are grouped by clock time and their present
/// values averaged.
pub fn clock_profile(
    filter: &CongestionFilter,
    location: &str,
    payload: &CongestionPayload,
) -> Option<BTreeMap<String, Option<f64>>> {
    let raw = payload.clock_raw.get(&clock_raw_key(location, filter.bucket));
    let start = filter.start_date.map(iso_date);
    let cut = match (&start, raw) {
        (Some(start), Some(raw)) if raw.records.iter().any(|r| r.date_iso < *start) => {
            Some((start, raw))
        }
        _ => None,
    };

    let Some((start, raw)) = cut else {
        let series = payload.by_clock.get(&clock_key(location, filter.bucket))?;
        return Some(
            series
                .clock_times
                .iter()
                .enumerate()
                .map(|(i, c)| {
                    (
                        c.clone(),
                        pick(filter.metric, series.congestion[i], series.delay[i]),
                    )
                })
                .collect(),
        );
    };

    let mut grouped: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for r in raw.records.iter().filter(|r| r.date_iso >= *start) {
        let values = grouped.entry(r.clock_time.clone()).or_default();
        if let Some(v) = pick(filter.metric, r.congestion, r.delay) {
            values.push(v);
        }
    }
    Some(
        grouped
            .into_iter()
            .map(|(clock, values)| (clock, round_opt(mean(&values), 3)))
            .collect(),
    )
}
