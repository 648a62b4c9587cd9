//! The national registration sources.
//!
//! One [`CountryPipeline`] per country: request building, raw parsing (CSV,
//! Excel workbook, Power BI JSON) and normalization onto the canonical
//! record. No HTTP client and no warehouse here; both come in through the
//! [`Collaborators`] of a run.
//!
//! # Quick start
//!
//! ```no_run
//! # async fn demo<F, B, W, N>(deps: ecc_core::run::Collaborators<F, B, W, N>)
//! # where
//! #   F: ecc_core::collab::Fetcher,
//! #   B: ecc_core::collab::BlobStore,
//! #   W: ecc_core::warehouse::Warehouse,
//! #   N: ecc_core::collab::Notifier,
//! # {
//! use ecc_core::run::RunRequest;
//!
//! let pipeline = ecc_sources::lookup("SE").unwrap();
//! let today = chrono::Local::now().date_naive();
//! let report = pipeline.run(&deps, RunRequest::scheduled(today)).await;
//! println!("{report:?}");
//! # }
//! ```

pub mod finland;
pub mod sweden;
pub mod switzerland;

use ecc_core::{
  Country, Result,
  collab::{BlobStore, Fetcher, Notifier},
  pipeline::CountryPipeline,
  run::{Collaborators, RunReport, RunRequest, run_country},
  warehouse::Warehouse,
};

pub use finland::Finland;
pub use sweden::Sweden;
pub use switzerland::Switzerland;

// ─── Registry ────────────────────────────────────────────────────────────────

/// Every supported source, selected by country.
#[derive(Debug, Clone, Copy)]
pub enum Pipeline {
  Finland(Finland),
  Sweden(Sweden),
  Switzerland(Switzerland),
}

impl Pipeline {
  pub fn for_country(country: Country) -> Self {
    match country {
      Country::Finland => Self::Finland(Finland),
      Country::Sweden => Self::Sweden(Sweden),
      Country::Switzerland => Self::Switzerland(Switzerland),
    }
  }

  pub fn all() -> impl Iterator<Item = Self> { Country::ALL.into_iter().map(Self::for_country) }

  pub fn country(&self) -> Country {
    match self {
      Self::Finland(p) => p.country(),
      Self::Sweden(p) => p.country(),
      Self::Switzerland(p) => p.country(),
    }
  }

  pub async fn run<F, B, W, N>(
    &self,
    deps: &Collaborators<F, B, W, N>,
    request: RunRequest,
  ) -> RunReport
  where
    F: Fetcher,
    B: BlobStore,
    W: Warehouse,
    N: Notifier,
  {
    match self {
      Self::Finland(p) => run_country(p, deps, request).await,
      Self::Sweden(p) => run_country(p, deps, request).await,
      Self::Switzerland(p) => run_country(p, deps, request).await,
    }
  }
}

/// Look a pipeline up by ISO code or country slug, case-insensitively.
pub fn lookup(code: &str) -> Result<Pipeline> {
  code.parse::<Country>().map(Pipeline::for_country)
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn lookup_accepts_codes_and_slugs() {
    assert_eq!(lookup("se").unwrap().country(), Country::Sweden);
    assert_eq!(lookup("Switzerland").unwrap().country(), Country::Switzerland);
    assert_eq!(lookup("FI").unwrap().country(), Country::Finland);
    assert!(lookup("NO").is_err());
  }

  #[test]
  fn all_covers_every_country() {
    let countries: Vec<_> = Pipeline::all().map(|p| p.country()).collect();
    assert_eq!(countries, Country::ALL);
  }
}
