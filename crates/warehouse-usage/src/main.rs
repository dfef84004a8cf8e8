use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use warehouse_usage_monitor::config::expand_path;
use warehouse_usage_monitor::prelude::*;
use warehouse_usage_monitor::{QueryWindow, Settings, SnapshotSource, UsageError, UsageSource};

const EXIT_CONFIG: u8 = 101;
const EXIT_SOURCE: u8 = 102;
const EXIT_INVALID_FACT: u8 = 103;
const EXIT_INCONSISTENT: u8 = 104;

/// Ten years of hours.
const MAX_WINDOW_HOURS: i64 = 87_660;

#[derive(Parser, Debug)]
#[clap(author = "Red", version, about)]
struct Args {
    #[arg(short = 'c', long = "config", default_value = "settings.json")]
    config: PathBuf,

    /// JSONL export of table sizes (dataset_id, table_id, num_bytes)
    #[arg(long = "storage-snapshot")]
    storage_snapshot: PathBuf,

    /// JSONL export of the jobs view
    #[arg(long = "jobs-snapshot")]
    jobs_snapshot: PathBuf,

    #[arg(
        long = "window-hours",
        default_value_t = 24,
        value_parser = clap::value_parser!(i64).range(1..=MAX_WINDOW_HOURS)
    )]
    window_hours: i64,

    /// Print the report on a single line
    #[arg(long)]
    compact: bool,
}

/// A failed run and the exit code it maps to.
struct Failure {
    code: u8,
    error: anyhow::Error,
}

impl Failure {
    fn new(error: anyhow::Error, fallback: u8) -> Self {
        let code = match error.chain().find_map(|e| e.downcast_ref::<UsageError>()) {
            Some(UsageError::InvalidRateConfig { .. }) => EXIT_CONFIG,
            Some(UsageError::InvalidUsageFact { .. }) => EXIT_INVALID_FACT,
            Some(UsageError::ReportInconsistency { .. }) => EXIT_INCONSISTENT,
            None => fallback,
        };
        Self { code, error }
    }
}

fn query_window(now: DateTime<Utc>, hours: i64) -> Result<QueryWindow> {
    let start = Duration::try_hours(hours)
        .and_then(|duration| now.checked_sub_signed(duration))
        .with_context(|| format!("Query window of {} hours is out of range", hours))?;
    Ok(QueryWindow::new(start, now))
}

fn load_settings(args: &Args) -> Result<(Settings, CostRateModel)> {
    let settings = Settings::load_from_file(expand_path(&args.config))?;
    let rates = CostRateModel::from_settings(&settings.rates)?;
    Ok((settings, rates))
}

async fn collect_facts(
    args: &Args,
    settings: &Settings,
) -> Result<(Vec<DatasetUsageFact>, Vec<QueryJobFact>)> {
    let source = SnapshotSource::new(
        expand_path(&args.storage_snapshot),
        expand_path(&args.jobs_snapshot),
    );
    let window = query_window(Utc::now(), args.window_hours)?;
    debug!(start = %window.start(), end = %window.end(), "Query window");

    let storage_source = source.clone();
    let datasets = settings.datasets.clone();
    let storage_task =
        tokio::task::spawn_blocking(move || storage_source.dataset_usage(&datasets));
    let jobs_task = tokio::task::spawn_blocking(move || source.query_jobs(&window));

    let (storage, queries) = tokio::try_join!(storage_task, jobs_task)?;
    Ok((storage?, queries?))
}

async fn run(args: &Args) -> std::result::Result<String, Failure> {
    let (settings, rates) = load_settings(args).map_err(|e| Failure::new(e, EXIT_CONFIG))?;
    info!(
        project_id = %settings.project_id,
        region = %settings.region,
        datasets = settings.datasets.len(),
        "Generating usage report"
    );
    debug!(key_file = %settings.key_file.display(), "Credentials");

    let (storage, queries) = collect_facts(args, &settings)
        .await
        .map_err(|e| Failure::new(e, EXIT_SOURCE))?;
    info!(
        datasets = storage.len(),
        jobs = queries.len(),
        "Collected usage facts"
    );

    let monitor = UsageMonitor::new(rates);
    let report = monitor
        .generate_report(&storage, &queries)
        .map_err(|e| Failure::new(e.into(), EXIT_INCONSISTENT))?;

    let output = if args.compact {
        report.to_json()
    } else {
        report.to_json_pretty()
    };
    output.map_err(|e| Failure::new(e.into(), EXIT_INCONSISTENT))
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warehouse_usage=info,warehouse_usage_monitor=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    match run(&args).await {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(failure) => {
            error!(code = failure.code, "{:#}", failure.error);
            ExitCode::from(failure.code)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_codes_follow_error_kind() {
        let rate = Failure::new(
            UsageError::invalid_rate("usd_to_local", "rate is missing").into(),
            EXIT_SOURCE,
        );
        assert_eq!(rate.code, EXIT_CONFIG);

        let fact = Failure::new(
            anyhow::Error::from(UsageError::invalid_fact("ds", "negative")).context("loading"),
            EXIT_SOURCE,
        );
        assert_eq!(fact.code, EXIT_INVALID_FACT);

        let inconsistent = Failure::new(
            UsageError::ReportInconsistency {
                section: "query",
                field: "total_cost_usd",
            }
            .into(),
            EXIT_SOURCE,
        );
        assert_eq!(inconsistent.code, EXIT_INCONSISTENT);
    }

    #[test]
    fn test_other_errors_use_fallback() {
        let failure = Failure::new(anyhow::anyhow!("file missing"), EXIT_SOURCE);
        assert_eq!(failure.code, EXIT_SOURCE);
    }

    #[test]
    fn test_args_defaults() {
        let args = Args::parse_from([
            "warehouse-usage",
            "--storage-snapshot",
            "tables.jsonl",
            "--jobs-snapshot",
            "jobs.jsonl",
        ]);
        assert_eq!(args.config, PathBuf::from("settings.json"));
        assert_eq!(args.window_hours, 24);
        assert!(!args.compact);
    }

    #[test]
    fn test_window_hours_bounded() {
        let parse = |hours: &str| {
            Args::try_parse_from([
                "warehouse-usage",
                "--storage-snapshot",
                "tables.jsonl",
                "--jobs-snapshot",
                "jobs.jsonl",
                "--window-hours",
                hours,
            ])
        };
        assert!(parse("9999999999999").is_err());
        assert!(parse("0").is_err());
        assert_eq!(parse("87660").unwrap().window_hours, MAX_WINDOW_HOURS);
    }

    #[test]
    fn test_query_window_out_of_range_is_error() {
        let now = Utc::now();
        assert!(query_window(now, i64::MAX).is_err());
        assert!(query_window(now, 9_999_999_999_999).is_err());
        assert_eq!(query_window(now, 24).unwrap(), QueryWindow::last_day(now));
        assert!(query_window(now, MAX_WINDOW_HOURS).is_ok());
    }
}
