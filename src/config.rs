use crate::engine::filter::ALL;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Tunables shared by the Rust engine and the page script. They travel
/// inside the payload so both read the same values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Moving-average window for congestion/delay over date.
    pub date_window: usize,
    /// Moving-average window for quarterly trip-mode and flow trends.
    pub quarter_window: usize,
    /// Number of origin-destination pairs kept in the flow diagram.
    pub top_n: usize,
    /// Most recent quarters considered by the flow diagram.
    pub trailing_quarters: usize,
    /// Multi-select value meaning "no constraint".
    pub all_sentinel: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            date_window: 7,
            quarter_window: 5,
            top_n: 10,
            trailing_quarters: 4,
            all_sentinel: ALL.to_string(),
        }
    }
}

/// Everything the batch build needs.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub congestion_path: PathBuf,
    pub trip_modes_path: PathBuf,
    pub flows_path: PathBuf,
    pub output_path: PathBuf,
    /// Optional standalone copy of the embedded payload.
    pub payload_path: Option<PathBuf>,
    pub title: String,
    pub settings: Settings,
}

impl Default for BuildConfig {
    fn default() -> Self {
        BuildConfig {
            congestion_path: PathBuf::from("data/congestion.csv"),
            trip_modes_path: PathBuf::from("data/trips.csv"),
            flows_path: PathBuf::from("data/flows.csv"),
            output_path: PathBuf::from("docs/index.html"),
            payload_path: None,
            title: "Mobility dashboard".to_string(),
            settings: Settings::default(),
        }
    }
}
