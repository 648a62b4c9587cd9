//! Shared normalization steps: fuel-type mapping, numeric coercion, the
//! missing-value policies, and aggregation onto the canonical key.
//!
//! Pipeline for a label-based source:
//!   Vec<Observation>
//!     └─ FuelMap::map()          → canonical fuel type (hard error if unmapped)
//!          └─ MissingPolicy      → every count resolved or dropped
//!               └─ aggregate()   → one record per (date, fuelType, make), > 0

use std::collections::BTreeMap;

use crate::{Country, Error, FuelType, Period, RegistrationRecord, Result};

// ─── Fuel-type mapping ───────────────────────────────────────────────────────

/// A closed lookup table from a source's fuel vocabulary to [`FuelType`].
#[derive(Debug, Clone, Copy)]
pub struct FuelMap {
  country: Country,
  entries: &'static [(&'static str, FuelType)],
}

impl FuelMap {
  pub const fn new(country: Country, entries: &'static [(&'static str, FuelType)]) -> Self {
    Self { country, entries }
  }

  /// Map a source label. Surrounding whitespace is ignored; everything else
  /// must match exactly.
  pub fn map(&self, label: &str) -> Result<FuelType> {
    let label = label.trim();
    self
      .entries
      .iter()
      .find(|(source, _)| *source == label)
      .map(|(_, fuel)| *fuel)
      .ok_or_else(|| Error::UnmappedFuelType {
        country: self.country,
        label:   label.to_owned(),
      })
  }

  /// Source labels in table order.
  pub fn labels(&self) -> impl Iterator<Item = &'static str> + '_ {
    self.entries.iter().map(|(label, _)| *label)
  }
}

// ─── Numeric coercion ────────────────────────────────────────────────────────

/// Strip non-numeric residue (thousands separators, apostrophes, unit
/// markers) and parse what is left. Returns `None` when nothing numeric
/// remains, e.g. for the `-` placeholder, and for negative values.
///
/// More than one `.` means the dots separate thousands (`1.234.567`).
pub fn coerce_count(raw: &str) -> Option<f64> {
  if raw.trim_start().starts_with('-') {
    return None;
  }
  let mut cleaned: String = raw.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect();
  if cleaned.matches('.').count() > 1 {
    cleaned.retain(|c| c != '.');
  }
  cleaned.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0)
}

// ─── Missing values ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingPolicy {
  /// A missing count means "none registered": it becomes zero and is dropped.
  PlaceholderAsZero,
  /// A missing count repeats the previous count of the same fetch batch.
  /// Leading gaps have nothing to repeat and are dropped.
  ForwardFill,
}

impl MissingPolicy {
  pub fn apply(self, counts: &mut [Option<f64>]) {
    match self {
      Self::PlaceholderAsZero => {
        for count in counts.iter_mut() {
          count.get_or_insert(0.0);
        }
      }
      Self::ForwardFill => forward_fill(counts),
    }
  }
}

/// Replace each `None` with the closest preceding `Some`.
pub fn forward_fill(counts: &mut [Option<f64>]) {
  let mut last = None;
  for count in counts.iter_mut() {
    match count {
      Some(v) => last = Some(*v),
      None => *count = last,
    }
  }
}

// ─── Observations ────────────────────────────────────────────────────────────

/// A source row after parsing, before any canonicalization.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
  pub date:       Period,
  pub fuel_label: String,
  pub make:       String,
  pub count:      Option<f64>,
}

/// Map, fill and aggregate one fetch batch of observations.
///
/// Every label is mapped before anything else happens, so an unknown label
/// fails the batch even when its count would have been dropped.
pub fn resolve(
  observations: Vec<Observation>,
  fuels: &FuelMap,
  policy: MissingPolicy,
) -> Result<Vec<RegistrationRecord>> {
  let fuel_types = observations
    .iter()
    .map(|o| fuels.map(&o.fuel_label))
    .collect::<Result<Vec<_>>>()?;

  let mut counts: Vec<Option<f64>> = observations.iter().map(|o| o.count).collect();
  policy.apply(&mut counts);

  let records = observations
    .into_iter()
    .zip(fuel_types)
    .zip(counts)
    .filter_map(|((o, fuel), count)| {
      count.map(|c| RegistrationRecord::new(o.date, fuel, o.make, c))
    });
  Ok(aggregate(records))
}

// ─── Aggregation ─────────────────────────────────────────────────────────────

/// Sum records sharing `(date, fuelType, make)` and drop non-positive totals.
/// Negative records are ignored rather than subtracted. Output is sorted by
/// that key.
pub fn aggregate(
  records: impl IntoIterator<Item = RegistrationRecord>,
) -> Vec<RegistrationRecord> {
  let mut totals: BTreeMap<(Period, FuelType, String), f64> = BTreeMap::new();
  for r in records.into_iter().filter(|r| r.registrations >= 0.0) {
    *totals.entry((r.date, r.fuel_type, r.make)).or_insert(0.0) += r.registrations;
  }
  totals
    .into_iter()
    .filter(|(_, total)| *total > 0.0)
    .map(|((date, fuel_type, make), registrations)| RegistrationRecord {
      date,
      fuel_type,
      make,
      registrations,
    })
    .collect()
}
