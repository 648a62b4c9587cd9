//! `ecc-scrape`: run the registration pipelines once.
//!
//! # Usage
//!
//! ```text
//! ecc-scrape all                          # every country, previous month
//! ecc-scrape se --year 2024 --month 5     # one country, explicit period
//! ecc-scrape switzerland --config /etc/ecc/scraper.toml
//! ```
//!
//! Countries run one after another; a failing country never stops the
//! others. The exit status is non-zero if any run failed.

use std::{path::PathBuf, process::ExitCode, time::Duration};

use anyhow::Context as _;
use clap::Parser;
use ecc_core::{
  Period,
  run::{Collaborators, RunRequest},
};
use ecc_scraper::{FsBucket, OpsChannel, ReqwestFetcher, ScraperConfig, config::expand_tilde};
use ecc_sources::Pipeline;
use ecc_store_sqlite::SqliteWarehouse;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Scrape monthly vehicle registrations")]
struct Cli {
  /// Country code or name (`fi`, `sweden`, ...), or `all`.
  target: String,

  /// Reporting year; defaults to the month preceding today.
  #[arg(long, requires = "month")]
  year: Option<i32>,

  /// Reporting month (1-12).
  #[arg(long, requires = "year")]
  month: Option<u32>,

  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let pipelines: Vec<Pipeline> = if cli.target.eq_ignore_ascii_case("all") {
    Pipeline::all().collect()
  } else {
    vec![ecc_sources::lookup(&cli.target)?]
  };

  let period = match (cli.year, cli.month) {
    (Some(year), Some(month)) => Some(Period::new(year, month)?),
    _ => None,
  };
  let today = chrono::Local::now().date_naive();
  let request = RunRequest { period, today };

  let cfg = ScraperConfig::load(&cli.config).context("failed to read configuration")?;
  let timeout = Duration::from_secs(cfg.http_timeout_secs);

  let warehouse_path = expand_tilde(&cfg.warehouse_path);
  if let Some(parent) = warehouse_path.parent() {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {parent:?}"))?;
  }
  let warehouse = SqliteWarehouse::open(&warehouse_path)
    .await
    .with_context(|| format!("failed to open warehouse at {warehouse_path:?}"))?;

  let deps = Collaborators {
    fetcher: ReqwestFetcher::new(timeout).context("failed to build HTTP client")?,
    blobs: FsBucket::new(expand_tilde(&cfg.blob_dir)),
    warehouse,
    notifier: OpsChannel::from_config(cfg.slack, timeout)
      .context("failed to build Slack client")?,
  };

  let mut failures = 0;
  for pipeline in pipelines {
    let report = pipeline.run(&deps, request).await;
    let summary = serde_json::to_string(&report).unwrap_or_default();
    if report.is_failure() {
      failures += 1;
      error!(report = %summary, "run failed");
    } else {
      info!(report = %summary, "run finished");
    }
  }

  Ok(if failures == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
