use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use tabled::Tabled;

// Raw rows mirror the extract columns after header normalization
// (BOM stripped, trimmed, lowercased). Every field stays textual here;
// coercion happens in the loader.

#[derive(Debug, Deserialize)]
pub struct RawCongestionRow {
    #[serde(rename = "dato", alias = "date")]
    pub date: Option<String>,
    #[serde(rename = "klokkeslett", alias = "clock_time")]
    pub clock_time: Option<String>,
    #[serde(rename = "stop_name", alias = "location")]
    pub location: Option<String>,
    #[serde(rename = "tid_dag", alias = "time_of_day")]
    pub time_of_day: Option<String>,
    #[serde(rename = "ko_min_km", alias = "congestion_index")]
    pub congestion_index: Option<String>,
    #[serde(rename = "forsinkelser", alias = "delay")]
    pub delay: Option<String>,
    #[serde(rename = "bil", alias = "volume")]
    pub volume: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawTripModeRow {
    #[serde(rename = "id", alias = "route")]
    pub route: Option<String>,
    #[serde(rename = "kvartal", alias = "quarter")]
    pub quarter: Option<String>,
    #[serde(rename = "bil", alias = "car")]
    pub car: Option<String>,
    #[serde(rename = "buss", alias = "bus")]
    pub bus: Option<String>,
    #[serde(rename = "sykkel", alias = "bicycle")]
    pub bicycle: Option<String>,
    #[serde(rename = "gange", alias = "walk")]
    pub walk: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawFlowRow {
    #[serde(rename = "delomrade_fra", alias = "origin")]
    pub origin: Option<String>,
    #[serde(rename = "delomrade_til", alias = "destination")]
    pub destination: Option<String>,
    #[serde(rename = "kvartal", alias = "quarter")]
    pub quarter: Option<String>,
    #[serde(rename = "reiser", alias = "trips")]
    pub trips: Option<String>,
    #[serde(rename = "co2_tonn", alias = "co2")]
    pub co2: Option<String>,
    #[serde(rename = "time_of_day")]
    pub time_of_day: Option<String>,
    #[serde(rename = "weekday_indicator", alias = "day_type")]
    pub day_type: Option<String>,
}

/// Coarse time-of-day split used for congestion analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TimeBucket {
    Morning,
    Afternoon,
}

impl TimeBucket {
    pub const ALL: [TimeBucket; 2] = [TimeBucket::Morning, TimeBucket::Afternoon];

    pub fn label(self) -> &'static str {
        match self {
            TimeBucket::Morning => "Morning",
            TimeBucket::Afternoon => "Afternoon",
        }
    }

    /// Accepts the extract's Norwegian labels as well as the English ones.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "morgen" | "morning" => Some(TimeBucket::Morning),
            "ettermiddag" | "afternoon" => Some(TimeBucket::Afternoon),
            _ => None,
        }
    }
}

impl fmt::Display for TimeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone)]
pub struct CongestionRecord {
    pub date: NaiveDate,
    pub clock_time: Option<String>,
    pub location: Option<String>,
    pub bucket: TimeBucket,
    pub congestion_index: Option<f64>,
    pub delay: Option<f64>,
    pub volume: Option<f64>,
}

/// Travel modes counted in the trip-mode extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Car,
    Bus,
    Bicycle,
    Walk,
}

impl Mode {
    pub const ALL: [Mode; 4] = [Mode::Car, Mode::Bus, Mode::Bicycle, Mode::Walk];

    pub fn key(self) -> &'static str {
        match self {
            Mode::Car => "car",
            Mode::Bus => "bus",
            Mode::Bicycle => "bicycle",
            Mode::Walk => "walk",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Mode::Car => "Car",
            Mode::Bus => "Bus",
            Mode::Bicycle => "Bicycle",
            Mode::Walk => "Walk",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            Mode::Car => "#636EFA",
            Mode::Bus => "#EF553B",
            Mode::Bicycle => "#00CC96",
            Mode::Walk => "#AB63FA",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "car" | "bil" => Some(Mode::Car),
            "bus" | "buss" => Some(Mode::Bus),
            "bicycle" | "bike" | "sykkel" => Some(Mode::Bicycle),
            "walk" | "gange" => Some(Mode::Walk),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModeCounts {
    pub car: Option<f64>,
    pub bus: Option<f64>,
    pub bicycle: Option<f64>,
    pub walk: Option<f64>,
}

impl ModeCounts {
    pub fn get(&self, mode: Mode) -> Option<f64> {
        match mode {
            Mode::Car => self.car,
            Mode::Bus => self.bus,
            Mode::Bicycle => self.bicycle,
            Mode::Walk => self.walk,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TripModeRecord {
    pub route: String,
    pub quarter: String,
    pub quarter_key: u32,
    pub counts: ModeCounts,
}

/// One origin-destination observation. Stored in the payload as-is; the
/// engine filters and sums these on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowRecord {
    pub origin: String,
    pub destination: String,
    pub quarter: String,
    pub trips: Option<f64>,
    pub co2: Option<f64>,
    pub time_of_day: String,
    pub day_type: String,
}

// Console preview rows.

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct LoadSummaryRow {
    #[tabled(rename = "Dataset")]
    pub dataset: String,
    #[tabled(rename = "Rows")]
    pub total_rows: String,
    #[tabled(rename = "Kept")]
    pub kept_rows: String,
    #[tabled(rename = "Skipped")]
    pub skipped_rows: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct SeriesCountRow {
    #[tabled(rename = "Bucket")]
    pub bucket: String,
    #[tabled(rename = "DateSeries")]
    pub date_series: usize,
    #[tabled(rename = "ClockSeries")]
    pub clock_series: usize,
    #[tabled(rename = "RawRecords")]
    pub raw_records: usize,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct SankeyTableRow {
    #[tabled(rename = "Rank")]
    pub rank: usize,
    #[tabled(rename = "Origin")]
    pub origin: String,
    #[tabled(rename = "Destination")]
    pub destination: String,
    #[tabled(rename = "Trips")]
    pub trips: String,
}

/// One row of the flow CSV export.
#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct FlowExportRow {
    #[serde(rename = "Origin")]
    #[tabled(rename = "Origin")]
    pub origin: String,
    #[serde(rename = "Destination")]
    #[tabled(rename = "Destination")]
    pub destination: String,
    #[serde(rename = "Quarter")]
    #[tabled(rename = "Quarter")]
    pub quarter: String,
    #[serde(rename = "Trips")]
    #[tabled(rename = "Trips")]
    pub trips: String,
    #[serde(rename = "TripsTrend")]
    #[tabled(rename = "TripsTrend")]
    pub trips_trend: String,
    #[serde(rename = "CO2")]
    #[tabled(rename = "CO2")]
    pub co2: String,
    #[serde(rename = "CO2PerTrip")]
    #[tabled(rename = "CO2PerTrip")]
    pub co2_per_trip: String,
    #[serde(rename = "CO2PerTripTrend")]
    #[tabled(rename = "CO2PerTripTrend")]
    pub co2_per_trip_trend: String,
}
