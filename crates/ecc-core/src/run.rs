//! One scheduled run of a country pipeline.
//!
//! Fetch → persist raw blobs → parse → normalize → freshness gate →
//! (sink | suppress), with a status line to the operations channel at every
//! stage transition. Stage errors end the run with [`Outcome::Failed`]; they
//! are never propagated to the caller.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{Instrument as _, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::{
  Batch, Country, Error, ErrorKind, Period, Result, WriteMode,
  collab::{BlobStore, Download, Fetcher, Notifier},
  freshness::{self, Freshness},
  pipeline::CountryPipeline,
  warehouse::Warehouse,
};

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// The external collaborators of a run, constructed by the caller.
pub struct Collaborators<F, B, W, N> {
  pub fetcher:   F,
  pub blobs:     B,
  pub warehouse: W,
  pub notifier:  N,
}

#[derive(Debug, Clone, Copy)]
pub struct RunRequest {
  /// Explicit reporting period; defaults to the month preceding `today`.
  pub period: Option<Period>,
  pub today:  NaiveDate,
}

impl RunRequest {
  pub fn scheduled(today: NaiveDate) -> Self { Self { period: None, today } }

  pub fn for_period(period: Period, today: NaiveDate) -> Self {
    Self { period: Some(period), today }
  }
}

// ─── Outputs ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
  Published { rows_written: usize },
  /// The expected period is not (yet) the newest one available.
  Suppressed { latest: Option<Period> },
  Failed {
    #[serde(skip)]
    kind:    ErrorKind,
    message: String,
  },
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
  pub country: Country,
  pub period:  Period,
  pub run_id:  Uuid,
  #[serde(flatten)]
  pub outcome: Outcome,
}

impl RunReport {
  pub fn is_failure(&self) -> bool { matches!(self.outcome, Outcome::Failed { .. }) }
}

// ─── Runner ──────────────────────────────────────────────────────────────────

pub async fn run_country<P, F, B, W, N>(
  pipeline: &P,
  deps: &Collaborators<F, B, W, N>,
  request: RunRequest,
) -> RunReport
where
  P: CountryPipeline,
  F: Fetcher,
  B: BlobStore,
  W: Warehouse,
  N: Notifier,
{
  let country  = pipeline.country();
  let released = Period::preceding(request.today);
  let period   = request.period.unwrap_or(released);
  let run_id   = Uuid::new_v4();

  let span = info_span!("run", country = country.code(), %period, %run_id);
  let outcome = execute(pipeline, deps, period, released).instrument(span).await;

  RunReport { country, period, run_id, outcome }
}

async fn execute<P, F, B, W, N>(
  pipeline: &P,
  deps: &Collaborators<F, B, W, N>,
  period: Period,
  released: Period,
) -> Outcome
where
  P: CountryPipeline,
  F: Fetcher,
  B: BlobStore,
  W: Warehouse,
  N: Notifier,
{
  let ops = Ops { notifier: &deps.notifier, country: pipeline.country() };

  if period > released {
    ops.say(&format!("data for {period} has not been released yet...")).await;
    return Outcome::Suppressed { latest: None };
  }

  let downloads = match pipeline.fetch(&deps.fetcher, period).await {
    Ok(d) => d,
    Err(e) => return ops.fail(format!("failed to retrieve data for {period}"), e).await,
  };
  ops.say(&format!("successfully retrieved data for {period}...")).await;

  for download in &downloads {
    persist(&deps.blobs, &ops, download).await;
  }

  let raw = match pipeline.parse(&downloads) {
    Ok(raw) => raw,
    Err(e) => return ops.fail(format!("failed to parse data for {period}"), e).await,
  };
  let batches = match pipeline.normalize(raw, period) {
    Ok(b) => b,
    Err(e) => return ops.fail(format!("failed to normalize data for {period}"), e).await,
  };

  let latest = batches.iter().filter_map(Batch::latest).max();
  if let Freshness::Suppress { latest } = freshness::gate(latest, period) {
    info!(?latest, "expected period not published yet");
    ops
      .say(&format!("data for {} has not been released yet...", period.to_date_string()))
      .await;
    return Outcome::Suppressed { latest };
  }

  let mut rows_written = 0;
  let mut failure = None;
  for batch in &batches {
    match sink(&deps.warehouse, &ops, batch).await {
      Ok(n) => {
        rows_written += n;
        ops.say(&format!("{} updated with data from {period}!", batch.table)).await;
      }
      Err(e) => {
        let context = format!("failed to update {} with data from {period}", batch.table);
        let outcome = ops.fail(context, e).await;
        failure.get_or_insert(outcome);
      }
    }
  }
  if let Some(outcome) = failure {
    return outcome;
  }

  if let Some(table) = pipeline.leaderboard_table() {
    match deps.warehouse.refresh_leaderboard(pipeline.country().slug(), table).await {
      Ok(rows) => debug!(rows, "leaderboard refreshed"),
      Err(e) => {
        warn!(error = %e, "leaderboard refresh failed");
        ops.say(&format!("failed to refresh the leaderboard from {table}: {e}")).await;
      }
    }
  }

  Outcome::Published { rows_written }
}

/// Keep the raw payload; a storage failure is reported but not fatal.
async fn persist<B: BlobStore, N: Notifier>(blobs: &B, ops: &Ops<'_, N>, download: &Download) {
  match blobs.put(&download.blob_name, &download.payload.body).await {
    Ok(receipt) => info!(
      blob = %receipt.name,
      size = receipt.size,
      sha256 = %receipt.sha256,
      "raw payload stored"
    ),
    Err(e) => {
      warn!(blob = %download.blob_name, error = %e, "raw payload not stored");
      ops
        .say(&format!("failed to upload {} to the bucket: {e}", download.blob_name))
        .await;
    }
  }
}

async fn sink<W: Warehouse, N: Notifier>(
  warehouse: &W,
  ops: &Ops<'_, N>,
  batch: &Batch,
) -> Result<usize> {
  match batch.mode {
    WriteMode::Replace => {
      let replaced =
        warehouse.replace(batch.table, &batch.records).await.map_err(Error::sink)?;
      if replaced.dropped {
        ops.say(&format!("{} dropped!", batch.table)).await;
      }
      Ok(replaced.written)
    }
    WriteMode::Upsert(fields) => warehouse
      .append(batch.table, &batch.records, fields)
      .await
      .map_err(Error::sink),
  }
}

// ─── Operations channel ──────────────────────────────────────────────────────

struct Ops<'a, N> {
  notifier: &'a N,
  country:  Country,
}

impl<N: Notifier> Ops<'_, N> {
  async fn say(&self, text: &str) {
    let line = format!("{} - {text}", self.country.code());
    info!("{line}");
    self.notifier.send(&line).await;
  }

  async fn fail(&self, context: String, e: Error) -> Outcome {
    let kind = e.kind();
    error!(?kind, error = %e, "{context}");
    let message = format!("{context}: {e}");
    self.say(&message).await;
    Outcome::Failed { kind, message }
  }
}

#[cfg(test)]
mod tests {
  use std::{
    collections::HashMap,
    sync::{
      Mutex,
      atomic::{AtomicUsize, Ordering},
    },
  };

  use super::*;
  use crate::{
    Field, FuelType, RegistrationRecord,
    collab::{BlobReceipt, HttpRequest, Payload},
    pipeline::download,
    warehouse::Replaced,
  };

  // ── Fakes ───────────────────────────────────────────────────────────────

  #[derive(Debug, thiserror::Error)]
  #[error("offline")]
  struct Offline;

  struct StubFetcher {
    status: u16,
    calls:  AtomicUsize,
  }

  impl StubFetcher {
    fn answering(status: u16) -> Self { Self { status, calls: AtomicUsize::new(0) } }
  }

  impl Fetcher for StubFetcher {
    type Error = Offline;

    async fn fetch(&self, request: HttpRequest) -> Result<Payload, Offline> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      Ok(Payload { url: request.url, status: self.status, body: "raw".into() })
    }
  }

  #[derive(Default)]
  struct MemoryBlobs(Mutex<Vec<String>>);

  impl BlobStore for MemoryBlobs {
    type Error = Offline;

    async fn put(&self, name: &str, body: &[u8]) -> Result<BlobReceipt, Offline> {
      self.0.lock().unwrap().push(name.to_owned());
      Ok(BlobReceipt { name: name.to_owned(), size: body.len(), sha256: String::new() })
    }
  }

  #[derive(Default)]
  struct MemoryWarehouse {
    tables:  Mutex<HashMap<String, Vec<RegistrationRecord>>>,
    offline: bool,
  }

  impl Warehouse for MemoryWarehouse {
    type Error = Offline;

    async fn append(
      &self,
      table: &str,
      records: &[RegistrationRecord],
      _unique_fields: &[Field],
    ) -> Result<usize, Offline> {
      if self.offline {
        return Err(Offline);
      }
      let mut tables = self.tables.lock().unwrap();
      tables.entry(table.to_owned()).or_default().extend_from_slice(records);
      Ok(records.len())
    }

    async fn replace(
      &self,
      table: &str,
      records: &[RegistrationRecord],
    ) -> Result<Replaced, Offline> {
      if self.offline {
        return Err(Offline);
      }
      let previous = self.tables.lock().unwrap().insert(table.to_owned(), records.to_vec());
      Ok(Replaced { dropped: previous.is_some(), written: records.len() })
    }

    async fn drop_table(&self, table: &str) -> Result<bool, Offline> {
      if self.offline {
        return Err(Offline);
      }
      Ok(self.tables.lock().unwrap().remove(table).is_some())
    }

    async fn refresh_leaderboard(&self, _country: &str, _table: &str) -> Result<usize, Offline> {
      Ok(0)
    }
  }

  #[derive(Default)]
  struct RecordingNotifier(Mutex<Vec<String>>);

  impl RecordingNotifier {
    fn lines(&self) -> Vec<String> { self.0.lock().unwrap().clone() }
  }

  impl Notifier for RecordingNotifier {
    async fn send(&self, text: &str) { self.0.lock().unwrap().push(text.to_owned()); }
  }

  struct StubPipeline {
    records:  Vec<RegistrationRecord>,
    mode:     WriteMode,
    unmapped: bool,
  }

  impl StubPipeline {
    fn with(records: Vec<RegistrationRecord>) -> Self {
      Self { records, mode: WriteMode::Replace, unmapped: false }
    }
  }

  impl CountryPipeline for StubPipeline {
    type Raw = ();

    fn country(&self) -> Country { Country::Finland }

    async fn fetch<F: Fetcher>(&self, fetcher: &F, period: Period) -> Result<Vec<Download>> {
      let payload = download(fetcher, HttpRequest::get("https://stub.test/data.csv")).await?;
      Ok(vec![Download {
        label:     "finland".into(),
        blob_name: format!("stub/{period}.csv"),
        payload,
      }])
    }

    fn parse(&self, _downloads: &[Download]) -> Result<()> { Ok(()) }

    fn normalize(&self, _raw: (), _period: Period) -> Result<Vec<Batch>> {
      if self.unmapped {
        return Err(Error::UnmappedFuelType {
          country: Country::Finland,
          label:   "Steam".into(),
        });
      }
      Ok(vec![Batch { table: "stub", mode: self.mode, records: self.records.clone() }])
    }
  }

  fn deps(
    status: u16,
    offline: bool,
  ) -> Collaborators<StubFetcher, MemoryBlobs, MemoryWarehouse, RecordingNotifier> {
    Collaborators {
      fetcher:   StubFetcher::answering(status),
      blobs:     MemoryBlobs::default(),
      warehouse: MemoryWarehouse { offline, ..Default::default() },
      notifier:  RecordingNotifier::default(),
    }
  }

  fn june_10() -> NaiveDate { NaiveDate::from_ymd_opt(2024, 6, 10).unwrap() }

  fn records_for(period: &str) -> Vec<RegistrationRecord> {
    let p: Period = period.parse().unwrap();
    vec![
      RegistrationRecord::new(p, FuelType::Bev, "Tesla", 120.0),
      RegistrationRecord::new(p, FuelType::Petrol, "Toyota", 80.0),
    ]
  }

  // ── Tests ───────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn publishes_when_latest_matches_expected() {
    let deps = deps(200, false);
    let report = run_country(
      &StubPipeline::with(records_for("2024-05")),
      &deps,
      RunRequest::scheduled(june_10()),
    )
    .await;

    assert_eq!(report.period, "2024-05".parse().unwrap());
    assert_eq!(report.outcome, Outcome::Published { rows_written: 2 });
    assert_eq!(deps.warehouse.tables.lock().unwrap()["stub"].len(), 2);
    assert_eq!(deps.blobs.0.lock().unwrap().as_slice(), ["stub/2024-05.csv"]);

    let lines = deps.notifier.lines();
    assert_eq!(lines[0], "FI - successfully retrieved data for 2024-05...");
    assert!(lines.iter().any(|l| l == "FI - stub updated with data from 2024-05!"));
  }

  #[tokio::test]
  async fn stale_data_is_suppressed_without_writing() {
    let deps = deps(200, false);
    let report = run_country(
      &StubPipeline::with(records_for("2024-04")),
      &deps,
      RunRequest::scheduled(june_10()),
    )
    .await;

    assert_eq!(
      report.outcome,
      Outcome::Suppressed { latest: Some("2024-04".parse().unwrap()) }
    );
    assert!(deps.warehouse.tables.lock().unwrap().is_empty());
    assert!(
      deps
        .notifier
        .lines()
        .contains(&"FI - data for 2024-05-01 has not been released yet...".to_owned())
    );
  }

  #[tokio::test]
  async fn unreleased_period_is_suppressed_before_fetching() {
    let deps = deps(200, false);
    let request = RunRequest::for_period("2024-06".parse().unwrap(), june_10());
    let report = run_country(&StubPipeline::with(records_for("2024-06")), &deps, request).await;

    assert_eq!(report.outcome, Outcome::Suppressed { latest: None });
    assert_eq!(deps.fetcher.calls.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn fetch_failure_is_reported_not_raised() {
    let deps = deps(404, false);
    let report = run_country(
      &StubPipeline::with(records_for("2024-05")),
      &deps,
      RunRequest::scheduled(june_10()),
    )
    .await;

    assert!(matches!(report.outcome, Outcome::Failed { kind: ErrorKind::Fetch, .. }));
    assert!(deps.blobs.0.lock().unwrap().is_empty());
    assert!(deps.notifier.lines()[0].starts_with("FI - failed to retrieve data for 2024-05"));
  }

  #[tokio::test]
  async fn mapping_failure_writes_nothing() {
    let deps = deps(200, false);
    let mut pipeline = StubPipeline::with(records_for("2024-05"));
    pipeline.unmapped = true;
    let report = run_country(&pipeline, &deps, RunRequest::scheduled(june_10())).await;

    assert!(matches!(report.outcome, Outcome::Failed { kind: ErrorKind::Mapping, .. }));
    assert!(deps.warehouse.tables.lock().unwrap().is_empty());
  }

  #[tokio::test]
  async fn sink_failure_is_reported_not_raised() {
    let deps = deps(200, true);
    let report = run_country(
      &StubPipeline::with(records_for("2024-05")),
      &deps,
      RunRequest::scheduled(june_10()),
    )
    .await;

    assert!(report.is_failure());
    assert!(matches!(report.outcome, Outcome::Failed { kind: ErrorKind::Sink, .. }));
    assert!(
      deps
        .notifier
        .lines()
        .iter()
        .any(|l| l.starts_with("FI - failed to update stub with data from 2024-05"))
    );
  }

  #[tokio::test]
  async fn replace_mode_drops_previous_contents() {
    let deps = deps(200, false);
    deps
      .warehouse
      .tables
      .lock()
      .unwrap()
      .insert("stub".into(), records_for("2023-01"));

    run_country(
      &StubPipeline::with(records_for("2024-05")),
      &deps,
      RunRequest::scheduled(june_10()),
    )
    .await;

    let tables = deps.warehouse.tables.lock().unwrap();
    assert!(tables["stub"].iter().all(|r| r.date == "2024-05".parse().unwrap()));
    assert!(deps.notifier.lines().contains(&"FI - stub dropped!".to_owned()));
  }

  #[tokio::test]
  async fn failed_replace_keeps_previous_contents() {
    let deps = deps(200, true);
    deps
      .warehouse
      .tables
      .lock()
      .unwrap()
      .insert("stub".into(), records_for("2023-01"));

    let report = run_country(
      &StubPipeline::with(records_for("2024-05")),
      &deps,
      RunRequest::scheduled(june_10()),
    )
    .await;

    assert!(report.is_failure());
    let tables = deps.warehouse.tables.lock().unwrap();
    assert_eq!(tables["stub"], records_for("2023-01"));
    assert!(!deps.notifier.lines().iter().any(|l| l.ends_with("dropped!")));
  }
}
