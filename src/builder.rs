//! Batch aggregation: turns the loaded extracts into the payload.
//!
//! For congestion the builder precomputes three views per (location, bucket):
//! a date series, a clock-time series and the raw per-(date, clock time)
//! list that the engine re-aggregates once a start date is known. Flow
//! records are passed through untouched; every flow filter combination is
//! recombined on demand instead of being precomputed.

use crate::config::{BuildConfig, Settings};
use crate::html::render_dashboard;
use crate::loader::{load_all, Datasets, LoadReport};
use crate::output::{json_bytes, write_file};
use crate::payload::{
    clock_key, clock_raw_key, series_key, ClockSeries, CongestionPayload, DateSeries,
    FlowPayload, Payload, RawClockRecord, RawClockView, TripModePayload, TripModeSeries,
    ALL_LOCATIONS,
};
use crate::stats::{aggregator_for, Aggregator, Channel, Scope};
use crate::types::{
    CongestionRecord, FlowRecord, Mode, SeriesCountRow, TimeBucket, TripModeRecord,
};
use crate::util::{display_date, iso_date, quarter_sort_key, round_opt};
use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

const CONGESTION_DECIMALS: i32 = 3;
const TRIP_MODE_DECIMALS: i32 = 2;

#[derive(Debug)]
pub struct BuildOutcome {
    pub payload: Payload,
    pub reports: [(&'static str, LoadReport); 3],
    pub html_bytes: usize,
}

/// Load every extract, aggregate, and write the page plus the optional
/// payload copy. Nothing is written until all inputs are loaded and the
/// outputs are fully rendered.
pub fn build_dashboard(config: &BuildConfig) -> Result<BuildOutcome> {
    let data = load_all(
        &config.congestion_path,
        &config.trip_modes_path,
        &config.flows_path,
    )?;
    let payload = build_payload(&data, &config.settings);
    let html = render_dashboard(&payload, &config.title)?;
    let json = match &config.payload_path {
        Some(_) => Some(json_bytes(&payload).context("cannot serialize payload")?),
        None => None,
    };

    write_file(&config.output_path, html.as_bytes())?;
    if let (Some(path), Some(json)) = (&config.payload_path, json) {
        write_file(path, &json)?;
    }

    Ok(BuildOutcome {
        payload,
        reports: data.reports,
        html_bytes: html.len(),
    })
}

pub fn build_payload(data: &Datasets, settings: &Settings) -> Payload {
    let congestion = build_congestion(&data.congestion);
    let trip_modes = build_trip_modes(&data.trip_modes);
    let flows = build_flows(&data.flows);
    info!(
        date_series = congestion.by_date.len(),
        routes = trip_modes.routes.len(),
        flow_records = flows.records.len(),
        quarters = flows.quarters.len(),
        "Payload aggregated"
    );
    Payload {
        generated_at: Utc::now().to_rfc3339(),
        settings: settings.clone(),
        congestion,
        trip_modes,
        flows,
    }
}

pub fn build_congestion(records: &[CongestionRecord]) -> CongestionPayload {
    let mut payload = CongestionPayload::default();
    let mut locations: BTreeSet<String> = BTreeSet::new();

    for bucket in TimeBucket::ALL {
        let in_bucket: Vec<&CongestionRecord> =
            records.iter().filter(|r| r.bucket == bucket).collect();
        if in_bucket.is_empty() {
            continue;
        }

        insert_views(&mut payload, ALL_LOCATIONS, bucket, Scope::Pooled, &in_bucket);

        let mut by_location: BTreeMap<&str, Vec<&CongestionRecord>> = BTreeMap::new();
        for r in &in_bucket {
            if let Some(loc) = r.location.as_deref() {
                by_location.entry(loc).or_default().push(r);
            }
        }
        for (loc, group) in by_location {
            if loc == ALL_LOCATIONS {
                warn!(location = loc, bucket = %bucket, "Location name is reserved for the pooled series; skipped");
                continue;
            }
            locations.insert(loc.to_string());
            insert_views(&mut payload, loc, bucket, Scope::SingleLocation, &group);
        }
    }

    let (first_congestion, first_delay) = first_available_dates(&payload.by_date);
    payload.first_congestion_date = first_congestion;
    payload.first_delay_date = first_delay;
    payload.locations = locations.into_iter().collect();
    payload
}

fn insert_views(
    payload: &mut CongestionPayload,
    location: &str,
    bucket: TimeBucket,
    scope: Scope,
    group: &[&CongestionRecord],
) {
    let agg = aggregator_for(scope);
    payload
        .by_date
        .insert(series_key(location, bucket), date_series(group, agg));
    payload
        .by_clock
        .insert(clock_key(location, bucket), clock_series(group, agg));
    payload
        .clock_raw
        .insert(clock_raw_key(location, bucket), raw_clock_view(group, agg));
    debug!(location, bucket = %bucket, records = group.len(), ?agg, "Congestion views built");
}

fn aggregate_pair(group: &[&CongestionRecord], agg: Aggregator) -> (Option<f64>, Option<f64>) {
    (
        round_opt(agg.apply(group, Channel::Congestion), CONGESTION_DECIMALS),
        round_opt(agg.apply(group, Channel::Delay), CONGESTION_DECIMALS),
    )
}

/// One point per date, ascending.
pub fn date_series(group: &[&CongestionRecord], agg: Aggregator) -> DateSeries {
    let mut by_date: BTreeMap<NaiveDate, Vec<&CongestionRecord>> = BTreeMap::new();
    for r in group {
        by_date.entry(r.date).or_default().push(r);
    }

    let mut series = DateSeries::default();
    for (date, rows) in by_date {
        let (congestion, delay) = aggregate_pair(&rows, agg);
        series.dates.push(display_date(date));
        series.dates_iso.push(iso_date(date));
        series.congestion.push(congestion);
        series.delay.push(delay);
    }
    series
}

/// One point per clock time across every date, ascending by the clock
/// string. Readings without a clock time only feed the date series.
pub fn clock_series(group: &[&CongestionRecord], agg: Aggregator) -> ClockSeries {
    let mut by_clock: BTreeMap<&str, Vec<&CongestionRecord>> = BTreeMap::new();
    for r in group {
        if let Some(clock) = r.clock_time.as_deref() {
            by_clock.entry(clock).or_default().push(r);
        }
    }

    let mut series = ClockSeries::default();
    for (clock, rows) in by_clock {
        let (congestion, delay) = aggregate_pair(&rows, agg);
        series.clock_times.push(clock.to_string());
        series.congestion.push(congestion);
        series.delay.push(delay);
    }
    series
}

pub fn raw_clock_view(group: &[&CongestionRecord], agg: Aggregator) -> RawClockView {
    let mut by_slot: BTreeMap<(NaiveDate, &str), Vec<&CongestionRecord>> = BTreeMap::new();
    for r in group {
        if let Some(clock) = r.clock_time.as_deref() {
            by_slot.entry((r.date, clock)).or_default().push(r);
        }
    }

    let records = by_slot
        .into_iter()
        .map(|((date, clock), rows)| {
            let (congestion, delay) = aggregate_pair(&rows, agg);
            RawClockRecord {
                date_iso: iso_date(date),
                clock_time: clock.to_string(),
                congestion,
                delay,
            }
        })
        .collect();
    RawClockView { records }
}

/// Earliest ISO date with a congestion value and with a delay value, over
/// every date series. Only the date matters, so any series holding it wins.
pub fn first_available_dates(
    by_date: &BTreeMap<String, DateSeries>,
) -> (Option<String>, Option<String>) {
    fn earliest(series: &DateSeries, values: &[Option<f64>]) -> Option<String> {
        series
            .dates_iso
            .iter()
            .zip(values)
            .find(|(_, v)| v.is_some())
            .map(|(d, _)| d.clone())
    }

    let mut first_congestion: Option<String> = None;
    let mut first_delay: Option<String> = None;
    for series in by_date.values() {
        if let Some(d) = earliest(series, &series.congestion) {
            if first_congestion.as_ref().map_or(true, |f| d < *f) {
                first_congestion = Some(d);
            }
        }
        if let Some(d) = earliest(series, &series.delay) {
            if first_delay.as_ref().map_or(true, |f| d < *f) {
                first_delay = Some(d);
            }
        }
    }
    (first_congestion, first_delay)
}

/// Per-route quarterly series. Records arrive sorted by quarter key from the
/// loader; counts keep their nulls.
pub fn build_trip_modes(records: &[TripModeRecord]) -> TripModePayload {
    let mut ordered: Vec<&TripModeRecord> = records.iter().collect();
    ordered.sort_by_key(|r| r.quarter_key);

    let mut series: BTreeMap<String, TripModeSeries> = BTreeMap::new();
    for r in ordered {
        let s = series.entry(r.route.clone()).or_default();
        s.quarters.push(r.quarter.clone());
        for mode in Mode::ALL {
            let value = round_opt(r.counts.get(mode), TRIP_MODE_DECIMALS);
            match mode {
                Mode::Car => s.car.push(value),
                Mode::Bus => s.bus.push(value),
                Mode::Bicycle => s.bicycle.push(value),
                Mode::Walk => s.walk.push(value),
            }
        }
    }

    TripModePayload {
        routes: series.keys().cloned().collect(),
        series,
    }
}

/// Flow records plus the distinct values that populate the filter controls.
pub fn build_flows(records: &[FlowRecord]) -> FlowPayload {
    let origins: BTreeSet<&str> = records.iter().map(|r| r.origin.as_str()).collect();
    let destinations: BTreeSet<&str> = records.iter().map(|r| r.destination.as_str()).collect();
    let times: BTreeSet<&str> = records.iter().map(|r| r.time_of_day.as_str()).collect();
    let day_types: BTreeSet<&str> = records.iter().map(|r| r.day_type.as_str()).collect();
    let quarters: BTreeSet<(u32, &str)> = records
        .iter()
        .filter_map(|r| quarter_sort_key(&r.quarter).map(|k| (k, r.quarter.as_str())))
        .collect();

    FlowPayload {
        records: records.to_vec(),
        origins: origins.into_iter().map(String::from).collect(),
        destinations: destinations.into_iter().map(String::from).collect(),
        times_of_day: times.into_iter().map(String::from).collect(),
        day_types: day_types.into_iter().map(String::from).collect(),
        quarters: quarters.into_iter().map(|(_, q)| q.to_string()).collect(),
    }
}

/// Console overview of what the congestion views contain.
pub fn series_counts(payload: &CongestionPayload) -> Vec<SeriesCountRow> {
    TimeBucket::ALL
        .iter()
        .map(|bucket| {
            let suffix = format!("_{}", bucket.label());
            let clock_suffix = format!("_{}_clock", bucket.label());
            let raw_suffix = format!("_{}_clock_raw", bucket.label());
            SeriesCountRow {
                bucket: bucket.label().to_string(),
                date_series: payload.by_date.keys().filter(|k| k.ends_with(&suffix)).count(),
                clock_series: payload
                    .by_clock
                    .keys()
                    .filter(|k| k.ends_with(&clock_suffix))
                    .count(),
                raw_records: payload
                    .clock_raw
                    .iter()
                    .filter(|(k, _)| k.ends_with(&raw_suffix))
                    .map(|(_, v)| v.records.len())
                    .sum(),
            }
        })
        .collect()
}
