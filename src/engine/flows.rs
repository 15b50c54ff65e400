//! Origin-destination flows: filtering, per-quarter totals, splitting and
//! the CSV export rows behind the flow chart.

use crate::config::Settings;
use crate::engine::chart::{palette_color, ChartSpec, Trace};
use crate::engine::filter::{Choice, Selection};
use crate::engine::smoothing::centered_moving_average;
use crate::payload::FlowPayload;
use crate::types::{FlowExportRow, FlowRecord};
use crate::util::{decimal_comma, round_opt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FlowMetric {
    #[default]
    Trips,
    Co2Sum,
    Co2PerTrip,
}

impl FlowMetric {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "trips" => Some(FlowMetric::Trips),
            "co2" | "co2_sum" => Some(FlowMetric::Co2Sum),
            "co2_per_trip" => Some(FlowMetric::Co2PerTrip),
            _ => None,
        }
    }

    fn titles(self) -> (&'static str, &'static str) {
        match self {
            FlowMetric::Trips => ("Trips - sum per quarter", "Trips (1000 per quarter)"),
            FlowMetric::Co2Sum => ("CO2 emissions - sum per quarter", "CO2 (tonnes per quarter)"),
            FlowMetric::Co2PerTrip => ("CO2 emissions per trip", "CO2 (kg per trip)"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowFilter {
    pub origins: Selection,
    pub destinations: Selection,
    pub metric: FlowMetric,
    pub time_of_day: Choice,
    pub day_type: Choice,
}

impl FlowFilter {
    pub fn matches(&self, r: &FlowRecord) -> bool {
        self.origins.matches(&r.origin)
            && self.destinations.matches(&r.destination)
            && self.time_of_day.matches(&r.time_of_day)
            && self.day_type.matches(&r.day_type)
    }

    /// Origins win when both sides have several explicit values.
    pub fn split(&self) -> Split {
        if let Some(values) = self.origins.split_values() {
            Split::ByOrigin(values.into_iter().map(String::from).collect())
        } else if let Some(values) = self.destinations.split_values() {
            Split::ByDestination(values.into_iter().map(String::from).collect())
        } else {
            Split::Combined
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Split {
    Combined,
    ByOrigin(Vec<String>),
    ByDestination(Vec<String>),
}

pub fn filter_records<'a>(filter: &FlowFilter, records: &'a [FlowRecord]) -> Vec<&'a FlowRecord> {
    records.iter().filter(|r| filter.matches(r)).collect()
}

/// Sums of the present values for one quarter. `None` when no record
/// carried a value.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QuarterTotals {
    pub trips: Option<f64>,
    pub co2: Option<f64>,
}

fn add(acc: Option<f64>, v: Option<f64>) -> Option<f64> {
    match (acc, v) {
        (Some(a), Some(b)) => Some(a + b),
        (None, v) => v,
        (a, None) => a,
    }
}

impl QuarterTotals {
    fn push(&mut self, r: &FlowRecord) {
        self.trips = add(self.trips, r.trips);
        self.co2 = add(self.co2, r.co2);
    }

    /// Ratio of the sums, not a mean of per-record ratios.
    pub fn co2_per_trip(&self) -> Option<f64> {
        match (self.co2, self.trips) {
            (Some(co2), Some(trips)) if trips > 0.0 => Some(co2 / trips),
            _ => None,
        }
    }

    pub fn value(&self, metric: FlowMetric) -> Option<f64> {
        match metric {
            FlowMetric::Trips => self.trips,
            FlowMetric::Co2Sum => self.co2,
            FlowMetric::Co2PerTrip => self.co2_per_trip(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuarterlySeries {
    pub name: String,
    pub origin_label: String,
    pub destination_label: String,
    pub quarters: Vec<String>,
    pub totals: Vec<QuarterTotals>,
}

impl QuarterlySeries {
    pub fn values(&self, metric: FlowMetric) -> Vec<Option<f64>> {
        self.totals
            .iter()
            .map(|t| round_opt(t.value(metric), 2))
            .collect()
    }
}

/// Totals per quarter in `quarter_order`, keeping only quarters with at
/// least one record.
pub fn quarterly_totals<'a, I>(records: I, quarter_order: &[String]) -> (Vec<String>, Vec<QuarterTotals>)
where
    I: IntoIterator<Item = &'a FlowRecord>,
{
    let mut by_quarter: HashMap<&str, QuarterTotals> = HashMap::new();
    for r in records {
        by_quarter.entry(r.quarter.as_str()).or_default().push(r);
    }
    quarter_order
        .iter()
        .filter_map(|q| by_quarter.get(q.as_str()).map(|t| (q.clone(), *t)))
        .unzip()
}

/// One series per split value, or a single combined series.
pub fn flow_series(filter: &FlowFilter, payload: &FlowPayload) -> Vec<QuarterlySeries> {
    let filtered = filter_records(filter, &payload.records);
    let series = |name: &str,
                  origin_label: String,
                  destination_label: String,
                  keep: &dyn Fn(&FlowRecord) -> bool| {
        let (quarters, totals) = quarterly_totals(
            filtered.iter().copied().filter(|r| keep(*r)),
            &payload.quarters,
        );
        QuarterlySeries {
            name: name.to_string(),
            origin_label,
            destination_label,
            quarters,
            totals,
        }
    };

    match filter.split() {
        Split::ByOrigin(values) => values
            .iter()
            .map(|o| {
                let keep = |r: &FlowRecord| r.origin == *o;
                series(o, o.clone(), filter.destinations.label(), &keep)
            })
            .collect(),
        Split::ByDestination(values) => values
            .iter()
            .map(|d| {
                let keep = |r: &FlowRecord| r.destination == *d;
                series(d, filter.origins.label(), d.clone(), &keep)
            })
            .collect(),
        Split::Combined => vec![series(
            "Trend",
            filter.origins.label(),
            filter.destinations.label(),
            &|_: &FlowRecord| true,
        )],
    }
}

pub fn flow_chart(filter: &FlowFilter, payload: &FlowPayload, settings: &Settings) -> ChartSpec {
    let (title, y_title) = filter.metric.titles();
    let mut traces = Vec::new();
    for (idx, s) in flow_series(filter, payload).iter().enumerate() {
        let values = s.values(filter.metric);
        let trend = centered_moving_average(&values, settings.quarter_window);
        let color = palette_color(idx);
        traces.push(Trace::markers(&s.name, s.quarters.clone(), values, color));
        traces.push(Trace::line(&s.name, s.quarters.clone(), trend, color));
    }
    ChartSpec {
        title: title.to_string(),
        x_title: "Quarter".to_string(),
        y_title: y_title.to_string(),
        traces,
        show_legend: true,
    }
}

/// Rows behind the current flow chart, with every metric and its trend.
pub fn export_rows(filter: &FlowFilter, payload: &FlowPayload, settings: &Settings) -> Vec<FlowExportRow> {
    let mut rows = Vec::new();
    for s in flow_series(filter, payload) {
        let trips = s.values(FlowMetric::Trips);
        let co2 = s.values(FlowMetric::Co2Sum);
        let per_trip = s.values(FlowMetric::Co2PerTrip);
        let trips_trend = centered_moving_average(&trips, settings.quarter_window);
        let per_trip_trend = centered_moving_average(&per_trip, settings.quarter_window);
        for (i, quarter) in s.quarters.iter().enumerate() {
            rows.push(FlowExportRow {
                origin: s.origin_label.clone(),
                destination: s.destination_label.clone(),
                quarter: quarter.clone(),
                trips: decimal_comma(trips[i]),
                trips_trend: decimal_comma(trips_trend[i]),
                co2: decimal_comma(co2[i]),
                co2_per_trip: decimal_comma(per_trip[i]),
                co2_per_trip_trend: decimal_comma(per_trip_trend[i]),
            });
        }
    }
    rows
}

/// The sankey is offered for trip counts once at least one zone side is
/// constrained.
pub fn sankey_available(filter: &FlowFilter) -> bool {
    filter.metric == FlowMetric::Trips
        && !(filter.origins.is_unconstrained() && filter.destinations.is_unconstrained())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::chart::TraceKind;

    fn rec(o: &str, d: &str, q: &str, trips: Option<f64>, co2: Option<f64>) -> FlowRecord {
        FlowRecord {
            origin: o.to_string(),
            destination: d.to_string(),
            quarter: q.to_string(),
            trips,
            co2,
            time_of_day: "Morning".to_string(),
            day_type: "Weekday".to_string(),
        }
    }

    fn payload(records: Vec<FlowRecord>, quarters: &[&str]) -> FlowPayload {
        FlowPayload {
            records,
            quarters: quarters.iter().map(|q| q.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_emissions_per_trip_is_ratio_of_sums() {
        let p = payload(
            vec![
                rec("A", "X", "2024-1", Some(10.0), Some(2.0)),
                rec("B", "X", "2024-1", Some(5.0), Some(3.0)),
            ],
            &["2024-1"],
        );
        let filter = FlowFilter {
            origins: Selection::new(["A", "B"]),
            ..Default::default()
        };
        // Collapse the split by reading the unsplit totals directly.
        let (quarters, totals) = quarterly_totals(filter_records(&filter, &p.records), &p.quarters);
        assert_eq!(quarters, vec!["2024-1"]);
        assert_eq!(totals[0].trips, Some(15.0));
        let ratio = totals[0].co2_per_trip().unwrap();
        assert!((ratio - 1.0 / 3.0).abs() < 1e-9);

        let combined = FlowFilter {
            origins: Selection::new(["A", "B"]),
            metric: FlowMetric::Co2PerTrip,
            ..Default::default()
        };
        let series = flow_series(
            &FlowFilter {
                origins: Selection::new(["A"]),
                ..combined.clone()
            },
            &p,
        );
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].values(FlowMetric::Co2PerTrip), vec![Some(0.2)]);

        let all = flow_series(
            &FlowFilter {
                origins: Selection::all(),
                ..combined
            },
            &p,
        );
        assert_eq!(all[0].values(FlowMetric::Co2PerTrip), vec![Some(0.33)]);
    }

    #[test]
    fn test_split_by_origin_partitions_the_sum() {
        let p = payload(
            vec![
                rec("A", "X", "2024-1", Some(1.0), None),
                rec("B", "X", "2024-1", Some(2.0), None),
                rec("A", "Y", "2024-2", Some(4.0), None),
                rec("C", "X", "2024-1", Some(100.0), None),
            ],
            &["2024-1", "2024-2"],
        );
        let filter = FlowFilter {
            origins: Selection::new(["A", "B"]),
            ..Default::default()
        };
        assert_eq!(filter.split(), Split::ByOrigin(vec!["A".into(), "B".into()]));
        let series = flow_series(&filter, &p);
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].name, "A");
        assert_eq!(series[0].quarters, vec!["2024-1", "2024-2"]);
        assert_eq!(series[0].values(FlowMetric::Trips), vec![Some(1.0), Some(4.0)]);
        assert_eq!(series[1].quarters, vec!["2024-1"]);
        assert_eq!(series[1].values(FlowMetric::Trips), vec![Some(2.0)]);

        let (_, unsplit) = quarterly_totals(filter_records(&filter, &p.records), &p.quarters);
        let split_sum: f64 = series
            .iter()
            .flat_map(|s| s.totals.iter().filter_map(|t| t.trips))
            .sum();
        let unsplit_sum: f64 = unsplit.iter().filter_map(|t| t.trips).sum();
        assert_eq!(split_sum, unsplit_sum);
    }

    #[test]
    fn test_origin_split_wins_over_destination() {
        let filter = FlowFilter {
            origins: Selection::new(["A", "B"]),
            destinations: Selection::new(["X", "Y"]),
            ..Default::default()
        };
        assert!(matches!(filter.split(), Split::ByOrigin(_)));
        let filter = FlowFilter {
            origins: Selection::new(["A"]),
            destinations: Selection::new(["X", "Y"]),
            ..Default::default()
        };
        assert!(matches!(filter.split(), Split::ByDestination(_)));
    }

    #[test]
    fn test_null_trips_stay_null() {
        let p = payload(
            vec![
                rec("A", "X", "2024-1", None, Some(1.0)),
                rec("A", "X", "2024-2", Some(0.0), Some(1.0)),
            ],
            &["2024-1", "2024-2"],
        );
        let series = flow_series(&FlowFilter::default(), &p);
        assert_eq!(series[0].values(FlowMetric::Trips), vec![None, Some(0.0)]);
        assert_eq!(series[0].values(FlowMetric::Co2PerTrip), vec![None, None]);
        assert_eq!(series[0].values(FlowMetric::Co2Sum), vec![Some(1.0), Some(1.0)]);
    }

    #[test]
    fn test_radio_filters() {
        let mut night = rec("A", "X", "2024-1", Some(7.0), None);
        night.time_of_day = "Night".to_string();
        let p = payload(vec![night, rec("A", "X", "2024-1", Some(3.0), None)], &["2024-1"]);
        let filter = FlowFilter {
            time_of_day: Choice::parse("Night"),
            ..Default::default()
        };
        let series = flow_series(&filter, &p);
        assert_eq!(series[0].values(FlowMetric::Trips), vec![Some(7.0)]);
        let filter = FlowFilter {
            day_type: Choice::parse("Weekend"),
            ..Default::default()
        };
        assert!(flow_series(&filter, &p)[0].quarters.is_empty());
    }

    #[test]
    fn test_chart_and_export() {
        let p = payload(
            vec![
                rec("A", "X", "2024-1", Some(10.0), Some(2.0)),
                rec("B", "X", "2024-1", Some(5.0), Some(3.0)),
            ],
            &["2024-1"],
        );
        let filter = FlowFilter {
            destinations: Selection::new(["X"]),
            ..Default::default()
        };
        let chart = flow_chart(&filter, &p, &Settings::default());
        assert_eq!(chart.traces.len(), 2);
        assert_eq!(chart.traces[0].kind, TraceKind::Markers);
        assert_eq!(chart.traces[0].y, vec![Some(15.0)]);

        let rows = export_rows(&filter, &p, &Settings::default());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].origin, "All");
        assert_eq!(rows[0].destination, "X");
        assert_eq!(rows[0].trips, "15");
        assert_eq!(rows[0].co2_per_trip, "0,33");
    }

    #[test]
    fn test_sankey_availability() {
        assert!(!sankey_available(&FlowFilter::default()));
        let mut filter = FlowFilter {
            origins: Selection::new(["A"]),
            ..Default::default()
        };
        assert!(sankey_available(&filter));
        filter.metric = FlowMetric::Co2Sum;
        assert!(!sankey_available(&filter));
    }
}
