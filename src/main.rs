use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use client_counts::analyzer::normalize_activity;
use client_counts::config::get_config;
use client_counts::display::DisplayManager;
use client_counts::logging::init_logging;
use client_counts::sources::load_capture;
use client_counts::timestamp_parser::{CalendarMonth, TimestampParser};
use client_counts::{
    ActivityResponse, ClientCountAnalyzer, Endpoint, Fetched, FilterSelection, QueryRange,
    ReportQuery,
};
use std::path::PathBuf;
use std::process;
use tracing::debug;

#[derive(Parser)]
#[command(name = "client-counts")]
#[command(about = "Normalize, rank and classify client-count telemetry")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a client-count report from captured endpoint responses
    Report(ReportArgs),
    /// Print an activity response with every counts object normalized
    Normalize {
        /// Captured activity response
        activity: PathBuf,
    },
}

#[derive(Args)]
struct ReportArgs {
    /// Captured activity response
    #[arg(long)]
    activity: Option<PathBuf>,
    /// Captured activity config response
    #[arg(long)]
    config: Option<PathBuf>,
    /// Captured license response
    #[arg(long)]
    license: Option<PathBuf>,
    /// Captured version history response
    #[arg(long)]
    versions: Option<PathBuf>,
    /// First month of an explicit range (YYYY-MM)
    #[arg(long)]
    start: Option<CalendarMonth>,
    /// Last month of an explicit range (YYYY-MM); defaults to --start
    #[arg(long, requires = "start")]
    end: Option<CalendarMonth>,
    /// Earliest date client counts exist for (RFC3339)
    #[arg(long, value_parser = parse_instant)]
    floor: Option<DateTime<Utc>>,
    /// Evaluate the report as of this instant (RFC3339)
    #[arg(long, value_parser = parse_instant)]
    now: Option<DateTime<Utc>>,
    /// Drill into one namespace ("root" for the root namespace)
    #[arg(long)]
    namespace: Option<String>,
    /// Drill into one mount of the selected namespace
    #[arg(long, requires = "namespace")]
    mount: Option<String>,
    /// Number of entries shown as top attribution
    #[arg(long)]
    limit: Option<usize>,
    /// Output in JSON format
    #[arg(long)]
    json: bool,
}

fn parse_instant(s: &str) -> std::result::Result<DateTime<Utc>, String> {
    TimestampParser::parse(s).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = get_config();
    let _guard = init_logging(config);

    match cli.command {
        Commands::Report(args) => {
            let json = args.json;
            match run_report(args).await {
                Ok(_) => Ok(()),
                Err(e) => handle_error(e, json),
            }
        }
        Commands::Normalize { activity } => match run_normalize(activity).await {
            Ok(_) => Ok(()),
            Err(e) => handle_error(e, true),
        },
    }
}

async fn run_report(args: ReportArgs) -> Result<()> {
    let analyzer = ClientCountAnalyzer::new();
    let display = DisplayManager::from_config(get_config());

    let mut query = ReportQuery::at(args.now.unwrap_or_else(Utc::now));
    if let Some(start) = args.start {
        query = query.with_range(QueryRange::new(start, args.end.unwrap_or(start)));
    }
    if let Some(floor) = args.floor {
        query = query.with_counts_floor(floor);
    }

    let selection = FilterSelection {
        namespace: args.namespace,
        mount: args.mount,
    };
    let limit = args.limit.unwrap_or(analyzer.settings().top_limit);
    if limit == 0 {
        anyhow::bail!("--limit must be greater than 0");
    }

    let paths = client_counts::CapturePaths {
        activity: args.activity,
        config: args.config,
        license: args.license,
        version_history: args.versions,
    };
    debug!(?paths, "Loading captures");

    let report = analyzer.load_report(&paths, &query).await;
    display.display_report(&report, &selection, limit, args.json);
    Ok(())
}

async fn run_normalize(path: PathBuf) -> Result<()> {
    let display = DisplayManager::from_config(get_config());

    let response: ActivityResponse = match load_capture(Endpoint::Activity, Some(&path)).await {
        Fetched::Data(response) => response,
        Fetched::NoData => {
            display.print_json(&serde_json::json!({"data": null}));
            return Ok(());
        }
        Fetched::Failed(e) => return Err(e.into()),
    };

    let normalized = normalize_activity(&response)
        .map_err(|e| e.for_endpoint(Endpoint::Activity))
        .with_context(|| format!("Failed to normalize {}", path.display()))?;
    display.print_json(&serde_json::json!({ "data": normalized }));
    Ok(())
}

fn handle_error(e: anyhow::Error, json: bool) -> Result<(), anyhow::Error> {
    if json {
        println!("{}", serde_json::json!({ "error": format!("{:#}", e) }));
    } else {
        eprintln!("Error: {:#}", e);
    }
    process::exit(1);
}
