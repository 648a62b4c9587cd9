//! The `CountryPipeline` trait: what each country contributes to a run.

use std::future::Future;

use crate::{
  Batch, Country, Period, Result,
  collab::{Download, Fetcher},
};

/// Fetch, parse and normalize for one national source.
///
/// The orchestration around these steps (blob persistence, freshness gate,
/// sinking, notifications) is shared; see [`crate::run::run_country`].
pub trait CountryPipeline: Send + Sync {
  /// The source-shaped table produced by [`Self::parse`].
  type Raw: Send;

  fn country(&self) -> Country;

  /// The table the manufacturer leaderboard is computed from after a
  /// publish, for sources that break makes down by fuel type.
  fn leaderboard_table(&self) -> Option<&'static str> { None }

  /// Download every payload needed for `period`. Any non-success status
  /// fails the whole fetch.
  fn fetch<'a, F: Fetcher>(
    &'a self,
    fetcher: &'a F,
    period: Period,
  ) -> impl Future<Output = Result<Vec<Download>>> + Send + 'a;

  fn parse(&self, downloads: &[Download]) -> Result<Self::Raw>;

  /// Canonical batches for the warehouse. Records carry the period they
  /// describe, which is not necessarily `period`.
  fn normalize(&self, raw: Self::Raw, period: Period) -> Result<Vec<Batch>>;
}

/// Issue one request through `fetcher`, turning transport failures and
/// non-success statuses into [`crate::Error`]s.
pub async fn download<F: Fetcher>(
  fetcher: &F,
  request: crate::collab::HttpRequest,
) -> Result<crate::collab::Payload> {
  let url = request.url.clone();
  fetcher
    .fetch(request)
    .await
    .map_err(|e| crate::Error::Transport { url, reason: e.to_string() })?
    .ensure_success()
}
