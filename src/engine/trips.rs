use crate::config::Settings;
use crate::engine::chart::{ChartSpec, Trace};
use crate::engine::filter::Selection;
use crate::engine::smoothing::centered_moving_average;
use crate::payload::TripModePayload;
use crate::types::Mode;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripModeFilter {
    pub route: String,
    /// Mode keys (`car`, `bus`, ...) or `All`.
    pub modes: Selection,
}

/// Modes drawn for a selection, in selection order. Unknown keys are
/// ignored.
pub fn selected_modes(selection: &Selection) -> Vec<Mode> {
    let Some(keys) = selection.explicit() else {
        return Mode::ALL.to_vec();
    };
    let mut modes = Vec::new();
    for mode in keys.into_iter().filter_map(Mode::parse) {
        if !modes.contains(&mode) {
            modes.push(mode);
        }
    }
    modes
}

/// Unconstrained: one trend line per mode. Constrained: observed markers
/// plus a trend line for each selected mode.
pub fn trip_mode_chart(
    filter: &TripModeFilter,
    payload: &TripModePayload,
    settings: &Settings,
) -> ChartSpec {
    let mut chart = ChartSpec {
        title: format!("Trips by mode - {}", filter.route),
        x_title: "Quarter".to_string(),
        y_title: "Trips".to_string(),
        traces: Vec::new(),
        show_legend: true,
    };
    let Some(series) = payload.series.get(&filter.route) else {
        return chart;
    };

    let unconstrained = filter.modes.is_unconstrained();
    for mode in selected_modes(&filter.modes) {
        let values = series.channel(mode);
        let trend = centered_moving_average(values, settings.quarter_window);
        if !unconstrained {
            chart.traces.push(Trace::markers(
                mode.label(),
                series.quarters.clone(),
                values.to_vec(),
                mode.color(),
            ));
        }
        chart.traces.push(Trace::line(
            mode.label(),
            series.quarters.clone(),
            trend,
            mode.color(),
        ));
    }
    chart
}
