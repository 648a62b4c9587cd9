//! The canonical registration record and the write plan around it.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Error, Period, Result};

// ─── Fuel type ───────────────────────────────────────────────────────────────

/// The shared fuel-type vocabulary every source is mapped onto.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum FuelType {
  #[serde(rename = "petrol")]
  Petrol,
  #[serde(rename = "diesel")]
  Diesel,
  #[serde(rename = "BEV")]
  Bev,
  #[serde(rename = "PHEV")]
  Phev,
  #[serde(rename = "FHEV")]
  Fhev,
  #[serde(rename = "MHEV")]
  Mhev,
  #[serde(rename = "HEV")]
  Hev,
  #[serde(rename = "ICE")]
  Ice,
  #[serde(rename = "other")]
  Other,
  /// Every fuel type at once. Only used by make-level tables whose source
  /// does not split makes by fuel.
  #[serde(rename = "all")]
  AllFuels,
}

impl FuelType {
  /// Every member a fuel-type mapping may produce.
  pub const CANONICAL: [FuelType; 9] = [
    Self::Petrol,
    Self::Diesel,
    Self::Bev,
    Self::Phev,
    Self::Fhev,
    Self::Mhev,
    Self::Hev,
    Self::Ice,
    Self::Other,
  ];

  /// The token stored in the warehouse. Must match the serde renames above.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Petrol => "petrol",
      Self::Diesel => "diesel",
      Self::Bev => "BEV",
      Self::Phev => "PHEV",
      Self::Fhev => "FHEV",
      Self::Mhev => "MHEV",
      Self::Hev => "HEV",
      Self::Ice => "ICE",
      Self::Other => "other",
      Self::AllFuels => "all",
    }
  }
}

impl fmt::Display for FuelType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Exact match on the canonical token; source vocabularies go through
/// [`crate::normalize::FuelMap`] instead.
impl FromStr for FuelType {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    Self::CANONICAL
      .into_iter()
      .chain([Self::AllFuels])
      .find(|f| f.as_str() == s)
      .ok_or_else(|| Error::UnknownFuelType(s.to_owned()))
  }
}

// ─── Record ──────────────────────────────────────────────────────────────────

/// Make name used by tables that only break registrations down by fuel type.
pub const ALL_MAKES: &str = "All makes";

/// One `(date, fuelType, make)` registration count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationRecord {
  pub date:          Period,
  #[serde(rename = "fuelType")]
  pub fuel_type:     FuelType,
  pub make:          String,
  pub registrations: f64,
}

impl RegistrationRecord {
  pub fn new(
    date: Period,
    fuel_type: FuelType,
    make: impl Into<String>,
    registrations: f64,
  ) -> Self {
    Self { date, fuel_type, make: make.into(), registrations }
  }
}

// ─── Write plan ──────────────────────────────────────────────────────────────

/// A column participating in a table's upsert key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
  Date,
  FuelType,
  Make,
}

impl Field {
  pub fn column(self) -> &'static str {
    match self {
      Self::Date => "date",
      Self::FuelType => "fuel_type",
      Self::Make => "make",
    }
  }
}

/// How a batch lands in its table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
  /// Drop the table and load the batch as its full contents.
  Replace,
  /// Insert, overwriting rows whose key columns already exist.
  Upsert(&'static [Field]),
}

/// Normalized records bound for one warehouse table.
#[derive(Debug, Clone)]
pub struct Batch {
  pub table:   &'static str,
  pub mode:    WriteMode,
  pub records: Vec<RegistrationRecord>,
}

impl Batch {
  pub fn latest(&self) -> Option<Period> { self.records.iter().map(|r| r.date).max() }
}
