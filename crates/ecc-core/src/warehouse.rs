//! The warehouse traits and the row types of its read-side views.
//!
//! [`Warehouse`] is the sink a pipeline run writes to. [`WarehouseReader`]
//! answers the aggregated queries behind the REST API. Both are implemented
//! by `ecc-store-sqlite`.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::{Field, FuelType, Period, RegistrationRecord};

// ─── Write side ──────────────────────────────────────────────────────────────

pub trait Warehouse: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Insert `records` into `table`, creating it if needed.
  ///
  /// With a non-empty `unique_fields`, a record whose key already exists
  /// overwrites the stored row instead of duplicating it. Returns the number
  /// of records written.
  fn append<'a>(
    &'a self,
    table: &'a str,
    records: &'a [RegistrationRecord],
    unique_fields: &'a [Field],
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + 'a;

  /// Swap the contents of `table` for `records` atomically. On failure the
  /// previous contents stay in place.
  fn replace<'a>(
    &'a self,
    table: &'a str,
    records: &'a [RegistrationRecord],
  ) -> impl Future<Output = Result<Replaced, Self::Error>> + Send + 'a;

  /// Drop `table`. Returns `false` if it did not exist.
  fn drop_table<'a>(
    &'a self,
    table: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Recompute the manufacturer leaderboard of `country` from the latest
  /// month in `table`. Returns the number of leaderboard rows.
  fn refresh_leaderboard<'a>(
    &'a self,
    country: &'a str,
    table: &'a str,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + 'a;
}

/// Outcome of [`Warehouse::replace`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Replaced {
  /// Whether a previous table was dropped.
  pub dropped: bool,
  pub written: usize,
}

// ─── Read side ───────────────────────────────────────────────────────────────

/// Monthly registrations of one fuel type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuelTypeTotal {
  pub date:          Period,
  pub fuel_type:     FuelType,
  pub registrations: f64,
}

/// Which two windows a [`ComparisonRow`] compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonWindow {
  /// The latest twelve months against the twelve before them.
  TrailingYear,
  /// The latest month against the same month a year earlier.
  SameMonthLastYear,
}

/// One fuel type's total in the current window, its change against the
/// previous window, and its share of the current window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
  pub fuel_type:   FuelType,
  pub total:       f64,
  pub perc_change: Option<f64>,
  pub share:       Option<f64>,
}

/// A make's fuel-type split in the latest month, in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MakeFuelShare {
  pub make:         String,
  pub fuel_type:    FuelType,
  pub market_share: f64,
}

/// Registrations of a group of makes within one fuel type, and the fuel
/// type's total, for one month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSharePoint {
  pub date:    Period,
  pub partial: f64,
  pub total:   f64,
}

/// BEV and overall registrations for one month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdoptionPoint {
  pub date:  Period,
  pub bev:   f64,
  pub total: f64,
}

/// One row of the pre-aggregated manufacturer leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
  pub make:           String,
  pub bev_sales:      f64,
  /// The make's share of the month's BEV registrations.
  pub bev_percentage: f64,
}

/// Aggregated views over warehouse tables. A missing table reads as empty.
pub trait WarehouseReader: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn fuel_type_series<'a>(
    &'a self,
    table: &'a str,
    since: Option<Period>,
  ) -> impl Future<Output = Result<Vec<FuelTypeTotal>, Self::Error>> + Send + 'a;

  /// Ordered by current-window total, descending. Fuel types absent from
  /// either window are left out.
  fn period_comparison<'a>(
    &'a self,
    table: &'a str,
    window: ComparisonWindow,
  ) -> impl Future<Output = Result<Vec<ComparisonRow>, Self::Error>> + Send + 'a;

  /// Fuel-type split of the `limit` best-selling makes of the latest month.
  fn top_make_fuel_share<'a>(
    &'a self,
    table: &'a str,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<MakeFuelShare>, Self::Error>> + Send + 'a;

  fn market_share<'a>(
    &'a self,
    table: &'a str,
    fuel_type: FuelType,
    makes: &'a [String],
    since: Option<Period>,
  ) -> impl Future<Output = Result<Vec<MarketSharePoint>, Self::Error>> + Send + 'a;

  fn adoption_curve<'a>(
    &'a self,
    table: &'a str,
    since: Option<Period>,
  ) -> impl Future<Output = Result<Vec<AdoptionPoint>, Self::Error>> + Send + 'a;

  /// The latest leaderboard of `country`, best seller first.
  fn top_makers<'a>(
    &'a self,
    country: &'a str,
  ) -> impl Future<Output = Result<Vec<LeaderboardEntry>, Self::Error>> + Send + 'a;
}
