//! Chart descriptions produced by the engine. They carry data and labels
//! only; drawing is left to the chart library on the page.

use serde::Serialize;

pub const PALETTE: [&str; 10] = [
    "#636EFA", "#EF553B", "#00CC96", "#AB63FA", "#FFA15A", "#19D3F3", "#FF6692", "#B6E880",
    "#FF97FF", "#FECB52",
];

pub fn palette_color(idx: usize) -> &'static str {
    PALETTE[idx % PALETTE.len()]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceKind {
    /// Observed values as faint markers.
    Markers,
    /// Smoothed trend line.
    Line,
    Bar,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trace {
    pub name: String,
    pub kind: TraceKind,
    pub x: Vec<String>,
    pub y: Vec<Option<f64>>,
    pub color: String,
    pub show_legend: bool,
}

impl Trace {
    pub fn markers(name: &str, x: Vec<String>, y: Vec<Option<f64>>, color: &str) -> Self {
        Trace {
            name: name.to_string(),
            kind: TraceKind::Markers,
            x,
            y,
            color: color.to_string(),
            show_legend: false,
        }
    }

    pub fn line(name: &str, x: Vec<String>, y: Vec<Option<f64>>, color: &str) -> Self {
        Trace {
            name: name.to_string(),
            kind: TraceKind::Line,
            x,
            y,
            color: color.to_string(),
            show_legend: true,
        }
    }

    pub fn bar(name: &str, x: Vec<String>, y: Vec<Option<f64>>, color: &str) -> Self {
        Trace {
            name: name.to_string(),
            kind: TraceKind::Bar,
            x,
            y,
            color: color.to_string(),
            show_legend: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpec {
    pub title: String,
    pub x_title: String,
    pub y_title: String,
    pub traces: Vec<Trace>,
    pub show_legend: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SankeyLink {
    pub source: usize,
    pub target: usize,
    pub value: f64,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum SankeyDiagram {
    /// Nothing to draw for the current filters.
    Empty { title: String, message: String },
    Flows {
        title: String,
        labels: Vec<String>,
        node_colors: Vec<String>,
        links: Vec<SankeyLink>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "chart", rename_all = "lowercase")]
pub enum Chart {
    Series(ChartSpec),
    Sankey(SankeyDiagram),
}
