//! Encoding and decoding helpers between domain types and SQLite columns.
//!
//! Months are stored as `YYYY-MM-01` strings so SQLite's date functions and
//! plain string comparison both order them correctly. Fuel types are stored
//! as their canonical token.

use ecc_core::{
  FuelType, Period, RegistrationRecord,
  warehouse::{
    AdoptionPoint, ComparisonRow, FuelTypeTotal, LeaderboardEntry, MakeFuelShare,
    MarketSharePoint,
  },
};

use crate::Result;

pub fn encode_period(p: Period) -> String { p.to_date_string() }

pub fn decode_period(s: &str) -> Result<Period> { Ok(s.parse()?) }

pub fn decode_fuel_type(s: &str) -> Result<FuelType> { Ok(s.parse()?) }

// ─── Records ─────────────────────────────────────────────────────────────────

/// A record flattened to column values, ready to move into a DB closure.
pub struct RawRecord {
  pub date:          String,
  pub fuel_type:     &'static str,
  pub make:          String,
  pub registrations: f64,
}

pub fn encode_record(r: &RegistrationRecord) -> RawRecord {
  RawRecord {
    date:          encode_period(r.date),
    fuel_type:     r.fuel_type.as_str(),
    make:          r.make.clone(),
    registrations: r.registrations,
  }
}

// ─── Query rows ──────────────────────────────────────────────────────────────

pub struct RawTotal {
  pub date:          String,
  pub fuel_type:     String,
  pub registrations: f64,
}

impl RawTotal {
  pub fn into_total(self) -> Result<FuelTypeTotal> {
    Ok(FuelTypeTotal {
      date:          decode_period(&self.date)?,
      fuel_type:     decode_fuel_type(&self.fuel_type)?,
      registrations: self.registrations,
    })
  }
}

pub struct RawComparison {
  pub fuel_type:     String,
  pub current:       f64,
  pub previous:      f64,
  pub current_total: f64,
}

impl RawComparison {
  pub fn into_row(self) -> Result<ComparisonRow> {
    let percent = |part: f64, whole: f64| (whole != 0.0).then(|| part / whole * 100.0);
    Ok(ComparisonRow {
      fuel_type:   decode_fuel_type(&self.fuel_type)?,
      total:       self.current,
      perc_change: percent(self.current - self.previous, self.previous),
      share:       percent(self.current, self.current_total),
    })
  }
}

pub struct RawShare {
  pub make:         String,
  pub fuel_type:    String,
  pub market_share: f64,
}

impl RawShare {
  pub fn into_share(self) -> Result<MakeFuelShare> {
    Ok(MakeFuelShare {
      make:         self.make,
      fuel_type:    decode_fuel_type(&self.fuel_type)?,
      market_share: self.market_share,
    })
  }
}

/// `(date, a, b)`: shared by the market-share and adoption queries.
pub struct RawPair {
  pub date: String,
  pub a:    f64,
  pub b:    f64,
}

impl RawPair {
  pub fn into_market_share(self) -> Result<MarketSharePoint> {
    Ok(MarketSharePoint { date: decode_period(&self.date)?, partial: self.a, total: self.b })
  }

  pub fn into_adoption(self) -> Result<AdoptionPoint> {
    Ok(AdoptionPoint { date: decode_period(&self.date)?, bev: self.a, total: self.b })
  }
}

pub fn leaderboard_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<LeaderboardEntry> {
  Ok(LeaderboardEntry {
    make:           row.get(0)?,
    bev_sales:      row.get(1)?,
    bev_percentage: row.get(2)?,
  })
}
