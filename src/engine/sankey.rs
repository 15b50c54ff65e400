//! Top-N origin-destination pairs over the most recent quarters.

use crate::config::Settings;
use crate::engine::chart::{SankeyDiagram, SankeyLink};
use crate::engine::filter::Selection;
use crate::payload::FlowPayload;
use crate::types::SankeyTableRow;
use crate::util::round_to;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const ORIGIN_COLOR: &str = "#00CC96";
const DESTINATION_COLOR: &str = "#636EFA";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    /// Flows leaving the selected origins.
    #[default]
    From,
    /// Flows arriving at the selected destinations.
    Into,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SankeyFilter {
    pub origins: Selection,
    pub destinations: Selection,
    pub direction: Direction,
}

impl SankeyFilter {
    /// An unconstrained side cannot be the anchor: "from all origins" is
    /// read as "into the selected destinations" and vice versa.
    pub fn effective_direction(&self) -> Direction {
        if self.origins.is_unconstrained() {
            Direction::Into
        } else if self.destinations.is_unconstrained() {
            Direction::From
        } else {
            self.direction
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlowPair {
    pub origin: String,
    pub destination: String,
    pub trips: f64,
}

/// Sum trips per pair over the trailing quarters and keep the largest
/// `settings.top_n`. Ties keep first-seen order.
pub fn top_flows(filter: &SankeyFilter, payload: &FlowPayload, settings: &Settings) -> Vec<FlowPair> {
    let skip = payload.quarters.len().saturating_sub(settings.trailing_quarters);
    let recent = &payload.quarters[skip..];
    let direction = filter.effective_direction();

    let mut index: HashMap<(&str, &str), usize> = HashMap::new();
    let mut pairs: Vec<FlowPair> = Vec::new();
    for r in &payload.records {
        if !recent.contains(&r.quarter) {
            continue;
        }
        let anchored = match direction {
            Direction::From => filter.origins.matches(&r.origin),
            Direction::Into => filter.destinations.matches(&r.destination),
        };
        let Some(trips) = r.trips else { continue };
        if !anchored {
            continue;
        }
        match index.get(&(r.origin.as_str(), r.destination.as_str())) {
            Some(&i) => pairs[i].trips += trips,
            None => {
                index.insert((r.origin.as_str(), r.destination.as_str()), pairs.len());
                pairs.push(FlowPair {
                    origin: r.origin.clone(),
                    destination: r.destination.clone(),
                    trips,
                });
            }
        }
    }

    pairs.sort_by(|a, b| b.trips.total_cmp(&a.trips));
    pairs.truncate(settings.top_n);
    pairs
}

fn push_unique(labels: &mut Vec<String>, value: &str) -> usize {
    match labels.iter().position(|l| l == value) {
        Some(i) => i,
        None => {
            labels.push(value.to_string());
            labels.len() - 1
        }
    }
}

pub fn sankey_diagram(filter: &SankeyFilter, payload: &FlowPayload, settings: &Settings) -> SankeyDiagram {
    let pairs = top_flows(filter, payload, settings);
    if pairs.is_empty() {
        return SankeyDiagram::Empty {
            title: "No data for the selected filters".to_string(),
            message: "Select zones in the side panel".to_string(),
        };
    }

    let title = match filter.effective_direction() {
        Direction::From => format!("Trips from the selected zones (top {} destinations)", settings.top_n),
        Direction::Into => format!("Trips into the selected zones (top {} origins)", settings.top_n),
    };

    let mut origins = Vec::new();
    let mut destinations = Vec::new();
    let mut ends = Vec::with_capacity(pairs.len());
    for p in &pairs {
        let source = push_unique(&mut origins, &p.origin);
        let target = push_unique(&mut destinations, &p.destination);
        ends.push((source, target));
    }

    let links = pairs
        .iter()
        .zip(ends)
        .enumerate()
        .map(|(i, (p, (source, target)))| SankeyLink {
            source,
            target: origins.len() + target,
            value: round_to(p.trips, 0).unwrap_or(0.0),
            color: format!("hsla({}, 70%, 60%, 0.5)", (i * 50) % 360),
        })
        .collect();

    let node_colors = origins
        .iter()
        .map(|_| ORIGIN_COLOR.to_string())
        .chain(destinations.iter().map(|_| DESTINATION_COLOR.to_string()))
        .collect();
    let mut labels = origins;
    labels.extend(destinations);

    SankeyDiagram::Flows {
        title,
        labels,
        node_colors,
        links,
    }
}

/// Console rows for the ranked pairs.
pub fn table_rows(pairs: &[FlowPair]) -> Vec<SankeyTableRow> {
    pairs
        .iter()
        .enumerate()
        .map(|(i, p)| SankeyTableRow {
            rank: i + 1,
            origin: p.origin.clone(),
            destination: p.destination.clone(),
            trips: format!("{:.0}", p.trips),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FlowRecord;

    fn rec(o: &str, d: &str, q: &str, trips: Option<f64>) -> FlowRecord {
        FlowRecord {
            origin: o.to_string(),
            destination: d.to_string(),
            quarter: q.to_string(),
            trips,
            co2: None,
            time_of_day: "Morning".to_string(),
            day_type: "Weekday".to_string(),
        }
    }

    fn payload(records: Vec<FlowRecord>) -> FlowPayload {
        FlowPayload {
            records,
            quarters: ["2023-1", "2023-2", "2023-3", "2023-4", "2024-1", "2024-2"]
                .iter()
                .map(|q| q.to_string())
                .collect(),
            ..Default::default()
        }
    }

    fn from(origins: &[&str]) -> SankeyFilter {
        SankeyFilter {
            origins: Selection::new(origins.iter().copied()),
            destinations: Selection::all(),
            direction: Direction::Into,
        }
    }

    #[test]
    fn test_only_trailing_quarters_count() {
        let p = payload(vec![
            rec("A", "Old", "2023-1", Some(10_000.0)),
            rec("A", "Old", "2023-2", Some(10_000.0)),
            rec("A", "X", "2023-3", Some(5.0)),
            rec("A", "Y", "2024-2", Some(7.0)),
        ]);
        let pairs = top_flows(&from(&["A"]), &p, &Settings::default());
        let names: Vec<&str> = pairs.iter().map(|p| p.destination.as_str()).collect();
        assert_eq!(names, vec!["Y", "X"]);
    }

    #[test]
    fn test_top_n_sums_and_ranks_with_stable_ties() {
        let mut records = Vec::new();
        for i in 0..12 {
            records.push(rec("A", &format!("D{}", i), "2024-1", Some(i as f64)));
        }
        records.push(rec("A", "D0", "2024-2", Some(20.0)));
        records.push(rec("A", "T1", "2024-2", Some(5.0)));
        records.push(rec("B", "Z", "2024-2", Some(99.0)));
        let pairs = top_flows(&from(&["A"]), &payload(records), &Settings::default());
        assert_eq!(pairs.len(), 10);
        assert_eq!(pairs[0].destination, "D0");
        assert_eq!(pairs[0].trips, 20.0);
        assert_eq!(pairs[1].destination, "D11");
        // D5 and T1 both total 5; D5 was seen first.
        let d5 = pairs.iter().position(|p| p.destination == "D5").unwrap();
        let t1 = pairs.iter().position(|p| p.destination == "T1").unwrap();
        assert_eq!(t1, d5 + 1);
        assert_eq!(pairs[9].destination, "D4");
        assert!(pairs.iter().all(|p| p.origin == "A"));
    }

    #[test]
    fn test_pairs_without_trip_data_are_not_ranked() {
        let p = payload(vec![rec("A", "X", "2024-1", None)]);
        assert!(top_flows(&from(&["A"]), &p, &Settings::default()).is_empty());
    }

    #[test]
    fn test_effective_direction() {
        let mut f = SankeyFilter {
            origins: Selection::all(),
            destinations: Selection::new(["X"]),
            direction: Direction::From,
        };
        assert_eq!(f.effective_direction(), Direction::Into);
        f.origins = Selection::new(["A"]);
        assert_eq!(f.effective_direction(), Direction::From);
        f.direction = Direction::Into;
        assert_eq!(f.effective_direction(), Direction::Into);
        f.destinations = Selection::all();
        assert_eq!(f.effective_direction(), Direction::From);
    }

    #[test]
    fn test_into_direction_anchors_on_destination() {
        let p = payload(vec![
            rec("A", "X", "2024-1", Some(4.0)),
            rec("B", "X", "2024-2", Some(6.0)),
            rec("A", "Y", "2024-2", Some(50.0)),
        ]);
        let f = SankeyFilter {
            origins: Selection::all(),
            destinations: Selection::new(["X"]),
            direction: Direction::From,
        };
        let pairs = top_flows(&f, &p, &Settings::default());
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].origin, "B");
    }

    #[test]
    fn test_diagram_nodes_and_links() {
        let p = payload(vec![
            rec("A", "X", "2024-1", Some(10.4)),
            rec("A", "Y", "2024-1", Some(5.6)),
            rec("B", "X", "2024-2", Some(3.0)),
        ]);
        let diagram = sankey_diagram(&from(&["A", "B"]), &p, &Settings::default());
        let SankeyDiagram::Flows { labels, node_colors, links, .. } = diagram else {
            panic!("expected flows");
        };
        assert_eq!(labels, vec!["A", "B", "X", "Y"]);
        assert_eq!(node_colors, vec![ORIGIN_COLOR, ORIGIN_COLOR, DESTINATION_COLOR, DESTINATION_COLOR]);
        assert_eq!(links.len(), 3);
        assert_eq!((links[0].source, links[0].target, links[0].value), (0, 2, 10.0));
        assert_eq!((links[1].source, links[1].target, links[1].value), (0, 3, 6.0));
        assert_eq!((links[2].source, links[2].target), (1, 2));
        assert_eq!(links[1].color, "hsla(50, 70%, 60%, 0.5)");
    }

    #[test]
    fn test_empty_state() {
        let p = payload(vec![rec("A", "X", "2024-1", Some(1.0))]);
        let diagram = sankey_diagram(&from(&["Nowhere"]), &p, &Settings::default());
        assert!(matches!(diagram, SankeyDiagram::Empty { .. }));
    }

    #[test]
    fn test_table_rows() {
        let rows = table_rows(&[FlowPair {
            origin: "A".into(),
            destination: "X".into(),
            trips: 12.6,
        }]);
        assert_eq!(rows[0].rank, 1);
        assert_eq!(rows[0].trips, "13");
    }
}
