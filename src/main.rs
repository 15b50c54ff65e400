// Entry point and CLI flow.
//
// `build` runs the batch job and writes the dashboard page. The other
// commands run the recombination engine over a built payload (or freshly
// loaded extracts) and print the result, so the numbers behind any chart
// can be checked from the terminal.
use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use mobility_dashboard::builder::{build_dashboard, build_payload, series_counts};
use mobility_dashboard::config::{BuildConfig, Settings};
use mobility_dashboard::engine::congestion::{Axis, CongestionFilter, CongestionMetric};
use mobility_dashboard::engine::filter::{Choice, Selection};
use mobility_dashboard::engine::flows::{export_rows, sankey_available, FlowFilter, FlowMetric};
use mobility_dashboard::engine::sankey::{table_rows, top_flows, Direction, SankeyFilter};
use mobility_dashboard::engine::trips::TripModeFilter;
use mobility_dashboard::engine::{render, FilterState};
use mobility_dashboard::loader::{load_all, LoadReport};
use mobility_dashboard::output::{preview_table_rows, write_csv};
use mobility_dashboard::payload::Payload;
use mobility_dashboard::types::{LoadSummaryRow, TimeBucket};
use mobility_dashboard::util::format_int;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mobility_dashboard")]
#[command(about = "Builds the static mobility dashboard and inspects its data", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CsvArgs {
    /// Congestion and delay readings
    #[arg(long, default_value = "data/congestion.csv")]
    congestion: PathBuf,

    /// Trip counts per route and mode
    #[arg(long, default_value = "data/trips.csv")]
    trips: PathBuf,

    /// Origin-destination flows
    #[arg(long, default_value = "data/flows.csv")]
    flows: PathBuf,
}

#[derive(Args)]
struct InputArgs {
    /// Payload JSON written by `build --payload`; the extracts are loaded when absent
    #[arg(long)]
    payload: Option<PathBuf>,

    #[command(flatten)]
    csv: CsvArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate the extracts and write the dashboard page
    Build {
        #[command(flatten)]
        csv: CsvArgs,

        /// HTML file to write
        #[arg(short, long, default_value = "docs/index.html")]
        output: PathBuf,

        /// Also write the payload as a standalone JSON file
        #[arg(long)]
        payload: Option<PathBuf>,

        /// Page title
        #[arg(long, default_value = "Mobility dashboard")]
        title: String,

        /// Moving-average window over dates
        #[arg(long, default_value_t = 7)]
        date_window: usize,

        /// Moving-average window over quarters
        #[arg(long, default_value_t = 5)]
        quarter_window: usize,

        /// Pairs kept in the flow diagram
        #[arg(long, default_value_t = 10)]
        top_n: usize,
    },
    /// Quarterly flow totals for a zone selection
    Flows {
        #[command(flatten)]
        input: InputArgs,

        /// Origin zones (repeat or comma-separate; "All" for every zone)
        #[arg(long = "origin", value_delimiter = ',')]
        origins: Vec<String>,

        /// Destination zones
        #[arg(long = "destination", value_delimiter = ',')]
        destinations: Vec<String>,

        /// trips, co2_sum or co2_per_trip
        #[arg(long, default_value = "trips")]
        metric: String,

        #[arg(long, default_value = "All")]
        time_of_day: String,

        #[arg(long, default_value = "All")]
        day_type: String,

        /// Write the rows as a spreadsheet-friendly CSV
        #[arg(long)]
        export: Option<PathBuf>,

        /// Rows shown in the console preview
        #[arg(long, default_value_t = 20)]
        rows: usize,
    },
    /// Largest origin-destination pairs over the most recent quarters
    Sankey {
        #[command(flatten)]
        input: InputArgs,

        #[arg(long = "origin", value_delimiter = ',')]
        origins: Vec<String>,

        #[arg(long = "destination", value_delimiter = ',')]
        destinations: Vec<String>,

        #[arg(long, value_enum, default_value_t = DirectionArg::From)]
        direction: DirectionArg,

        /// Print the diagram description as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Congestion or delay chart description as JSON
    Congestion {
        #[command(flatten)]
        input: InputArgs,

        #[arg(long = "location", value_delimiter = ',')]
        locations: Vec<String>,

        #[arg(long, value_enum, default_value_t = MetricArg::Congestion)]
        metric: MetricArg,

        #[arg(long, value_enum, default_value_t = AxisArg::Date)]
        axis: AxisArg,

        /// Morning or Afternoon
        #[arg(long, default_value = "Morning")]
        bucket: String,

        /// First date shown (YYYY-MM-DD); defaults to the first date with data
        #[arg(long)]
        start: Option<NaiveDate>,

        /// Show every date, ignoring the default start
        #[arg(long, default_value_t = false)]
        from_beginning: bool,
    },
    /// Trip-mode chart description as JSON
    Trips {
        #[command(flatten)]
        input: InputArgs,

        #[arg(long)]
        route: String,

        /// car, bus, bicycle, walk or All
        #[arg(long = "mode", value_delimiter = ',')]
        modes: Vec<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum DirectionArg {
    From,
    Into,
}

#[derive(Clone, Copy, ValueEnum)]
enum MetricArg {
    Congestion,
    Delay,
}

#[derive(Clone, Copy, ValueEnum)]
enum AxisArg {
    Date,
    Clock,
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            csv,
            output,
            payload,
            title,
            date_window,
            quarter_window,
            top_n,
        } => {
            let config = BuildConfig {
                congestion_path: csv.congestion,
                trip_modes_path: csv.trips,
                flows_path: csv.flows,
                output_path: output,
                payload_path: payload,
                title,
                settings: Settings {
                    date_window,
                    quarter_window,
                    top_n,
                    ..Settings::default()
                },
            };
            run_build(&config)?;
        }
        Commands::Flows {
            input,
            origins,
            destinations,
            metric,
            time_of_day,
            day_type,
            export,
            rows,
        } => {
            let Some(metric) = FlowMetric::parse(&metric) else {
                bail!("unknown flow metric '{}' (expected trips, co2_sum or co2_per_trip)", metric);
            };
            let payload = load_payload(&input)?;
            let filter = FlowFilter {
                origins: Selection::new(origins),
                destinations: Selection::new(destinations),
                metric,
                time_of_day: Choice::parse(&time_of_day),
                day_type: Choice::parse(&day_type),
            };
            let table = export_rows(&filter, &payload.flows, &payload.settings);
            preview_table_rows(
                &format!(
                    "Flows from {} to {}",
                    filter.origins.label(),
                    filter.destinations.label()
                ),
                &table,
                rows,
            );
            if sankey_available(&filter) {
                println!("(Flow diagram available: run `sankey` with the same zones)");
            }
            if let Some(path) = export {
                write_csv(&path, &table)?;
                println!("(Full table exported to {})", path.display());
            }
        }
        Commands::Sankey {
            input,
            origins,
            destinations,
            direction,
            json,
        } => {
            let payload = load_payload(&input)?;
            let filter = SankeyFilter {
                origins: Selection::new(origins),
                destinations: Selection::new(destinations),
                direction: match direction {
                    DirectionArg::From => Direction::From,
                    DirectionArg::Into => Direction::Into,
                },
            };
            if json {
                print_json(&render(&FilterState::Sankey(filter), &payload))?;
            } else {
                let pairs = top_flows(&filter, &payload.flows, &payload.settings);
                preview_table_rows(
                    &format!("Top flows ({:?} the selected zones)", filter.effective_direction()),
                    &table_rows(&pairs),
                    payload.settings.top_n,
                );
            }
        }
        Commands::Congestion {
            input,
            locations,
            metric,
            axis,
            bucket,
            start,
            from_beginning,
        } => {
            let Some(bucket) = TimeBucket::parse(&bucket) else {
                bail!("unknown time-of-day bucket '{}' (expected Morning or Afternoon)", bucket);
            };
            let payload = load_payload(&input)?;
            let mut filter = CongestionFilter::with_default_start(
                Selection::new(locations),
                match metric {
                    MetricArg::Congestion => CongestionMetric::Congestion,
                    MetricArg::Delay => CongestionMetric::Delay,
                },
                match axis {
                    AxisArg::Date => Axis::Date,
                    AxisArg::Clock => Axis::ClockTime,
                },
                bucket,
                &payload.congestion,
            );
            if from_beginning {
                filter.start_date = None;
            } else if start.is_some() {
                filter.start_date = start;
            }
            print_json(&render(&FilterState::Congestion(filter), &payload))?;
        }
        Commands::Trips {
            input,
            route,
            modes,
        } => {
            let payload = load_payload(&input)?;
            if !payload.trip_modes.series.contains_key(&route) {
                bail!(
                    "unknown route '{}' (available: {})",
                    route,
                    payload.trip_modes.routes.join(", ")
                );
            }
            let filter = TripModeFilter {
                route,
                modes: Selection::new(modes),
            };
            print_json(&render(&FilterState::TripModes(filter), &payload))?;
        }
    }

    Ok(())
}

fn run_build(config: &BuildConfig) -> Result<()> {
    let outcome = build_dashboard(config)?;

    let summary: Vec<LoadSummaryRow> = outcome
        .reports
        .iter()
        .map(|(name, r)| summary_row(name, r))
        .collect();
    preview_table_rows("Loaded extracts", &summary, summary.len());
    preview_table_rows(
        "Congestion views",
        &series_counts(&outcome.payload.congestion),
        TimeBucket::ALL.len(),
    );

    println!(
        "Dashboard written to {} ({} bytes, {} locations, {} routes, {} flow records)",
        config.output_path.display(),
        format_int(outcome.html_bytes as u64),
        format_int(outcome.payload.congestion.locations.len() as u64),
        format_int(outcome.payload.trip_modes.routes.len() as u64),
        format_int(outcome.payload.flows.records.len() as u64)
    );
    if let Some(path) = &config.payload_path {
        println!("Payload written to {}", path.display());
    }
    Ok(())
}

fn summary_row(name: &str, r: &LoadReport) -> LoadSummaryRow {
    LoadSummaryRow {
        dataset: name.to_string(),
        total_rows: format_int(r.total_rows as u64),
        kept_rows: format_int(r.kept_rows as u64),
        skipped_rows: format_int(r.skipped() as u64),
    }
}

fn load_payload(input: &InputArgs) -> Result<Payload> {
    if let Some(path) = &input.payload {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read payload {}", path.display()))?;
        let payload = Payload::from_json(&text)?;
        info!(path = %path.display(), generated_at = %payload.generated_at, "Payload loaded");
        return Ok(payload);
    }
    let data = load_all(&input.csv.congestion, &input.csv.trips, &input.csv.flows)?;
    Ok(build_payload(&data, &Settings::default()))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("cannot serialize chart")?
    );
    Ok(())
}
