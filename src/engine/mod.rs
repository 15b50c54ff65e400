//! Recombination engine: a pure function from an immutable filter state and
//! the payload to a chart description.

pub mod chart;
pub mod congestion;
pub mod filter;
pub mod flows;
pub mod sankey;
pub mod smoothing;
pub mod trips;

use crate::payload::Payload;
use chart::Chart;
use serde::{Deserialize, Serialize};

/// What the user currently looks at, with every filter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum FilterState {
    Congestion(congestion::CongestionFilter),
    TripModes(trips::TripModeFilter),
    Flows(flows::FlowFilter),
    Sankey(sankey::SankeyFilter),
}

pub fn render(state: &FilterState, payload: &Payload) -> Chart {
    let settings = &payload.settings;
    match state {
        FilterState::Congestion(f) => Chart::Series(congestion::congestion_chart(
            f,
            &payload.congestion,
            settings,
        )),
        FilterState::TripModes(f) => {
            Chart::Series(trips::trip_mode_chart(f, &payload.trip_modes, settings))
        }
        FilterState::Flows(f) => Chart::Series(flows::flow_chart(f, &payload.flows, settings)),
        FilterState::Sankey(f) => Chart::Sankey(sankey::sankey_diagram(f, &payload.flows, settings)),
    }
}
