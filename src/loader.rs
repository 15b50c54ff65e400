use crate::payload::ALL_LOCATIONS;
use crate::types::{
    CongestionRecord, FlowRecord, ModeCounts, RawCongestionRow, RawFlowRow, RawTripModeRow,
    TimeBucket, TripModeRecord,
};
use crate::util::{clean_text, parse_date_safe, parse_decimal, quarter_sort_key};
use anyhow::{bail, Context, Result};
use csv::{Reader, ReaderBuilder, StringRecord};
use std::fs::File;
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub total_rows: usize,
    pub kept_rows: usize,
    pub parse_errors: usize,
    /// Rows that parsed fine but fall outside the analysed categories:
    /// congestion rows with an unknown time-of-day bucket or a location
    /// named like the pooled series.
    pub excluded_rows: usize,
}

impl LoadReport {
    pub fn skipped(&self) -> usize {
        self.parse_errors + self.excluded_rows
    }
}

const CONGESTION_COLUMNS: &[&[&str]] = &[
    &["dato", "date"],
    &["klokkeslett", "clock_time"],
    &["stop_name", "location"],
    &["tid_dag", "time_of_day"],
    &["ko_min_km", "congestion_index"],
    &["forsinkelser", "delay"],
    &["bil", "volume"],
];

const TRIP_MODE_COLUMNS: &[&[&str]] = &[
    &["id", "route"],
    &["kvartal", "quarter"],
    &["bil", "car"],
    &["buss", "bus"],
    &["sykkel", "bicycle"],
    &["gange", "walk"],
];

const FLOW_COLUMNS: &[&[&str]] = &[
    &["delomrade_fra", "origin"],
    &["delomrade_til", "destination"],
    &["kvartal", "quarter"],
    &["reiser", "trips"],
    &["co2_tonn", "co2"],
    &["time_of_day"],
    &["weekday_indicator", "day_type"],
];

/// Header cells arrive with arbitrary casing, padding and a byte-order mark
/// on the first column.
pub fn normalize_header(h: &str) -> String {
    h.trim_start_matches('\u{feff}').trim().to_lowercase()
}

/// Open a `;`-delimited extract, normalize its header row and verify that
/// every required column (under any accepted name) is present.
fn open_extract(path: &Path, required: &[&[&str]]) -> Result<Reader<File>> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("cannot open {}", path.display()))?;
    let headers = rdr
        .headers()
        .with_context(|| format!("cannot read header row of {}", path.display()))?
        .clone();
    let normalized: StringRecord = headers.iter().map(normalize_header).collect();
    for names in required {
        if !names.iter().any(|n| normalized.iter().any(|h| h == *n)) {
            bail!(
                "{}: missing required column '{}'",
                path.display(),
                names.join("' / '")
            );
        }
    }
    debug!(path = %path.display(), columns = normalized.len(), "Header normalized");
    rdr.set_headers(normalized);
    Ok(rdr)
}

pub fn load_congestion(path: &Path) -> Result<(Vec<CongestionRecord>, LoadReport)> {
    let mut rdr = open_extract(path, CONGESTION_COLUMNS)?;
    let mut report = LoadReport::default();
    let mut records = Vec::new();

    for result in rdr.deserialize::<RawCongestionRow>() {
        report.total_rows += 1;
        let row = match result {
            Ok(r) => r,
            Err(e) => {
                debug!(row = report.total_rows, error = %e, "Unreadable congestion row");
                report.parse_errors += 1;
                continue;
            }
        };
        let Some(date) = parse_date_safe(row.date.as_deref()) else {
            report.parse_errors += 1;
            continue;
        };
        let Some(bucket) = row.time_of_day.as_deref().and_then(TimeBucket::parse) else {
            report.excluded_rows += 1;
            continue;
        };

        let location = clean_text(row.location.as_deref());
        if location.as_deref() == Some(ALL_LOCATIONS) {
            warn!(row = report.total_rows, location = ALL_LOCATIONS, "Reserved location name");
            report.excluded_rows += 1;
            continue;
        }

        records.push(CongestionRecord {
            date,
            clock_time: clean_text(row.clock_time.as_deref()),
            location,
            bucket,
            congestion_index: parse_decimal(row.congestion_index.as_deref()),
            delay: parse_decimal(row.delay.as_deref()),
            volume: parse_decimal(row.volume.as_deref()),
        });
    }

    report.kept_rows = records.len();
    log_report("congestion", path, &report);
    Ok((records, report))
}

pub fn load_trip_modes(path: &Path) -> Result<(Vec<TripModeRecord>, LoadReport)> {
    let mut rdr = open_extract(path, TRIP_MODE_COLUMNS)?;
    let mut report = LoadReport::default();
    let mut records = Vec::new();

    for result in rdr.deserialize::<RawTripModeRow>() {
        report.total_rows += 1;
        let row = match result {
            Ok(r) => r,
            Err(_) => {
                report.parse_errors += 1;
                continue;
            }
        };
        let (Some(route), Some(quarter)) = (
            clean_text(row.route.as_deref()),
            clean_text(row.quarter.as_deref()),
        ) else {
            report.parse_errors += 1;
            continue;
        };
        let Some(quarter_key) = quarter_sort_key(&quarter) else {
            report.parse_errors += 1;
            continue;
        };

        records.push(TripModeRecord {
            route,
            quarter,
            quarter_key,
            counts: ModeCounts {
                car: parse_decimal(row.car.as_deref()),
                bus: parse_decimal(row.bus.as_deref()),
                bicycle: parse_decimal(row.bicycle.as_deref()),
                walk: parse_decimal(row.walk.as_deref()),
            },
        });
    }

    // Stable: rows sharing a quarter keep their file order.
    records.sort_by_key(|r| r.quarter_key);
    report.kept_rows = records.len();
    log_report("trip modes", path, &report);
    Ok((records, report))
}

pub fn load_flows(path: &Path) -> Result<(Vec<FlowRecord>, LoadReport)> {
    let mut rdr = open_extract(path, FLOW_COLUMNS)?;
    let mut report = LoadReport::default();
    let mut records = Vec::new();

    for result in rdr.deserialize::<RawFlowRow>() {
        report.total_rows += 1;
        let row = match result {
            Ok(r) => r,
            Err(_) => {
                report.parse_errors += 1;
                continue;
            }
        };
        let (Some(origin), Some(destination), Some(quarter)) = (
            clean_text(row.origin.as_deref()),
            clean_text(row.destination.as_deref()),
            clean_text(row.quarter.as_deref()),
        ) else {
            report.parse_errors += 1;
            continue;
        };
        if quarter_sort_key(&quarter).is_none() {
            report.parse_errors += 1;
            continue;
        }

        records.push(FlowRecord {
            origin,
            destination,
            quarter,
            trips: parse_decimal(row.trips.as_deref()),
            co2: parse_decimal(row.co2.as_deref()),
            time_of_day: clean_text(row.time_of_day.as_deref())
                .unwrap_or_else(|| "Unknown".to_string()),
            day_type: clean_text(row.day_type.as_deref()).unwrap_or_else(|| "Unknown".to_string()),
        });
    }

    report.kept_rows = records.len();
    log_report("flows", path, &report);
    Ok((records, report))
}

fn log_report(dataset: &str, path: &Path, report: &LoadReport) {
    info!(
        dataset,
        path = %path.display(),
        rows = report.total_rows,
        kept = report.kept_rows,
        "Extract loaded"
    );
    if report.skipped() > 0 {
        warn!(
            dataset,
            parse_errors = report.parse_errors,
            excluded = report.excluded_rows,
            "Rows skipped while loading"
        );
    }
}

/// The three extracts, loaded together before any output is produced.
#[derive(Debug, Clone)]
pub struct Datasets {
    pub congestion: Vec<CongestionRecord>,
    pub trip_modes: Vec<TripModeRecord>,
    pub flows: Vec<FlowRecord>,
    pub reports: [(&'static str, LoadReport); 3],
}

pub fn load_all(congestion: &Path, trip_modes: &Path, flows: &Path) -> Result<Datasets> {
    let (congestion, r1) = load_congestion(congestion)?;
    let (trip_modes, r2) = load_trip_modes(trip_modes)?;
    let (flows, r3) = load_flows(flows)?;
    Ok(Datasets {
        congestion,
        trip_modes,
        flows,
        reports: [("congestion", r1), ("trip modes", r2), ("flows", r3)],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;
    use std::path::PathBuf;

    fn temp_file(name: &str, content: &str) -> PathBuf {
        let path = env::temp_dir().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_normalize_header() {
        assert_eq!(normalize_header("\u{feff}Dato "), "dato");
        assert_eq!(normalize_header("  ID"), "id");
    }

    #[test]
    fn test_load_congestion_decimal_comma_and_bom() {
        let path = temp_file(
            "mobility_dashboard_congestion.csv",
            "\u{feff}Dato;Klokkeslett;stop_name;tid_dag;faktisk_tid;ko_min_km;forsinkelser;bil\n\
             2024-01-15;07:00;Bridge;Morgen;12,0;0,5;1,25;100\n\
             2024-01-15;07:15;Bridge;Ettermiddag;12,0;;2,5;0\n\
             2024-01-16;07:00;Bridge;Kveld;12,0;0,4;1,0;50\n\
             not-a-date;07:00;Bridge;Morgen;12,0;0,4;1,0;50\n",
        );
        let (records, report) = load_congestion(&path).unwrap();
        assert_eq!(report.total_rows, 4);
        assert_eq!(report.kept_rows, 2);
        assert_eq!(report.parse_errors, 1);
        assert_eq!(report.excluded_rows, 1);

        assert_eq!(records[0].congestion_index, Some(0.5));
        assert_eq!(records[0].delay, Some(1.25));
        assert_eq!(records[0].volume, Some(100.0));
        assert_eq!(records[0].location.as_deref(), Some("Bridge"));
        assert_eq!(records[1].bucket, TimeBucket::Afternoon);
        assert_eq!(records[1].congestion_index, None);
        // Zero volume is a reading, not a missing value.
        assert_eq!(records[1].volume, Some(0.0));

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_load_congestion_excludes_reserved_location() {
        let path = temp_file(
            "mobility_dashboard_congestion_reserved.csv",
            "dato;klokkeslett;stop_name;tid_dag;ko_min_km;forsinkelser;bil\n\
             2024-01-15;07:00; All locations ;Morgen;1,0;;1\n\
             2024-01-15;07:00;B;Morgen;10,0;;100\n",
        );
        let (records, report) = load_congestion(&path).unwrap();
        assert_eq!(report.kept_rows, 1);
        assert_eq!(report.excluded_rows, 1);
        assert_eq!(records[0].location.as_deref(), Some("B"));

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_load_trip_modes_sorted_by_quarter_and_nulls_kept() {
        let path = temp_file(
            "mobility_dashboard_trips.csv",
            "ID;kvartal;bil;buss;sykkel;gange\n\
             To centre;2024-2;10,5;3;;1\n\
             To centre;2023-4;9;2;0;\n",
        );
        let (records, report) = load_trip_modes(&path).unwrap();
        assert_eq!(report.kept_rows, 2);
        assert_eq!(records[0].quarter, "2023-4");
        assert_eq!(records[0].counts.bicycle, Some(0.0));
        assert_eq!(records[0].counts.walk, None);
        assert_eq!(records[1].counts.car, Some(10.5));
        assert_eq!(records[1].counts.bicycle, None);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_load_flows_trims_zones() {
        let path = temp_file(
            "mobility_dashboard_flows.csv",
            "delomrade_fra;delomrade_til;kvartal;reiser;co2_tonn;time_of_day;weekday_indicator\n\
             \x20North ;South;2024-1;10;2,5;Morning;Weekday\n\
             ;South;2024-1;10;2,5;Morning;Weekday\n",
        );
        let (records, report) = load_flows(&path).unwrap();
        assert_eq!(report.kept_rows, 1);
        assert_eq!(report.parse_errors, 1);
        assert_eq!(records[0].origin, "North");
        assert_eq!(records[0].co2, Some(2.5));

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_missing_column_is_fatal() {
        let path = temp_file(
            "mobility_dashboard_bad_flows.csv",
            "delomrade_fra;kvartal;reiser\nA;2024-1;1\n",
        );
        let err = load_flows(&path).unwrap_err();
        assert!(err.to_string().contains("delomrade_til"));
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let path = env::temp_dir().join("mobility_dashboard_does_not_exist.csv");
        assert!(load_congestion(&path).is_err());
    }
}
