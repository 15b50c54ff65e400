//! The JSON boundary between the batch builder and the recombination engine.
//!
//! Everything here is produced once by [`crate::builder`] and only read
//! afterwards.

use crate::config::Settings;
use crate::types::{FlowRecord, Mode, TimeBucket};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Label of the pooled pseudo-location.
pub const ALL_LOCATIONS: &str = "All locations";

/// Key of the date-indexed series for a location and bucket.
pub fn series_key(location: &str, bucket: TimeBucket) -> String {
    format!("{}_{}", location, bucket.label())
}

/// Key of the precomputed clock-time series.
pub fn clock_key(location: &str, bucket: TimeBucket) -> String {
    format!("{}_{}_clock", location, bucket.label())
}

/// Key of the raw per-(date, clock time) view.
pub fn clock_raw_key(location: &str, bucket: TimeBucket) -> String {
    format!("{}_{}_clock_raw", location, bucket.label())
}

/// One point per date. All four lists are index-aligned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DateSeries {
    pub dates: Vec<String>,
    pub dates_iso: Vec<String>,
    pub congestion: Vec<Option<f64>>,
    pub delay: Vec<Option<f64>>,
}

impl DateSeries {
    pub fn len(&self) -> usize {
        self.dates_iso.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates_iso.is_empty()
    }

    pub fn is_aligned(&self) -> bool {
        let n = self.dates_iso.len();
        self.dates.len() == n && self.congestion.len() == n && self.delay.len() == n
    }
}

/// One point per clock time, collapsed across every date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClockSeries {
    pub clock_times: Vec<String>,
    pub congestion: Vec<Option<f64>>,
    pub delay: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawClockRecord {
    pub date_iso: String,
    pub clock_time: String,
    pub congestion: Option<f64>,
    pub delay: Option<f64>,
}

/// Per-(date, clock time) aggregates, kept apart per date so the clock
/// profile can be recomputed after a date-range filter: keep the records
/// with `date_iso >= start`, group by clock time and average the present
/// values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawClockView {
    pub records: Vec<RawClockRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CongestionPayload {
    /// Real locations, sorted; the pooled label is not included.
    pub locations: Vec<String>,
    pub by_date: BTreeMap<String, DateSeries>,
    pub by_clock: BTreeMap<String, ClockSeries>,
    pub clock_raw: BTreeMap<String, RawClockView>,
    pub first_congestion_date: Option<String>,
    pub first_delay_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TripModeSeries {
    pub quarters: Vec<String>,
    pub car: Vec<Option<f64>>,
    pub bus: Vec<Option<f64>>,
    pub bicycle: Vec<Option<f64>>,
    pub walk: Vec<Option<f64>>,
}

impl TripModeSeries {
    pub fn channel(&self, mode: Mode) -> &[Option<f64>] {
        match mode {
            Mode::Car => &self.car,
            Mode::Bus => &self.bus,
            Mode::Bicycle => &self.bicycle,
            Mode::Walk => &self.walk,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TripModePayload {
    pub routes: Vec<String>,
    pub series: BTreeMap<String, TripModeSeries>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowPayload {
    pub records: Vec<FlowRecord>,
    pub origins: Vec<String>,
    pub destinations: Vec<String>,
    pub times_of_day: Vec<String>,
    pub day_types: Vec<String>,
    /// Chronological order.
    pub quarters: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    pub generated_at: String,
    pub settings: Settings,
    pub congestion: CongestionPayload,
    pub trip_modes: TripModePayload,
    pub flows: FlowPayload,
}

impl Payload {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("cannot serialize payload")
    }

    pub fn from_json(s: &str) -> Result<Self> {
        serde_json::from_str(s).context("cannot parse payload")
    }

    /// JSON safe to inline inside a `<script>` element. `</` only occurs
    /// inside JSON strings, where `<\/` is an equivalent escape.
    pub fn to_inline_json(&self) -> Result<String> {
        Ok(self.to_json()?.replace("</", "<\\/"))
    }
}
