//! Finland: the Traficom PXWeb saved query.
//!
//! The query always returns the full history as one wide CSV
//! (`Month, Year, Driving power, <make>...`), so every run reloads the whole
//! table.

use chrono::NaiveDate;
use ecc_core::{
  Batch, Country, Error, FuelType, Period, Result, WriteMode,
  collab::{Download, Fetcher, HttpRequest},
  normalize::{FuelMap, MissingPolicy, Observation, coerce_count, resolve},
  pipeline::{CountryPipeline, download},
};
use tracing::debug;

pub const TABLE: &str = "finland";
pub const BLOB: &str = "finland/all_data.csv";

const URL: &str = "https://trafi2.stat.fi:443/PXWeb/sq/d0f731e4-7a84-444e-9abb-af9aeb2ca1f2";

const MONTH: &str = "Month";
const YEAR: &str = "Year";
const DRIVING_POWER: &str = "Driving power";

pub const FUELS: FuelMap = FuelMap::new(Country::Finland, &[
  ("Petrol", FuelType::Petrol),
  ("Diesel", FuelType::Diesel),
  ("Electricity", FuelType::Bev),
  ("Petrol/Electricity (plug-in hybrid)", FuelType::Phev),
  ("Diesel/Electricity (plug-in hybrid)", FuelType::Phev),
  ("Petrol/Electricity (hybrid)", FuelType::Fhev),
  ("Diesel/Electricity (hybrid)", FuelType::Fhev),
  ("Natural gas", FuelType::Other),
  ("Hydrogen", FuelType::Other),
  ("Ethanol", FuelType::Other),
  ("Other", FuelType::Other),
  ("petrol", FuelType::Petrol),
  ("diesel", FuelType::Diesel),
  ("BEV", FuelType::Bev),
  ("PHEV", FuelType::Phev),
  ("FHEV", FuelType::Fhev),
  ("MHEV", FuelType::Mhev),
  ("HEV", FuelType::Hev),
  ("ICE", FuelType::Ice),
  ("other", FuelType::Other),
]);

// ─── Raw table ───────────────────────────────────────────────────────────────

/// The CSV as published: one row per (month, driving power), one count
/// column per make.
#[derive(Debug, Clone, PartialEq)]
pub struct WideTable {
  pub makes: Vec<String>,
  pub rows:  Vec<WideRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WideRow {
  pub month:         String,
  pub year:          String,
  pub driving_power: String,
  /// Aligned with [`WideTable::makes`].
  pub counts:        Vec<String>,
}

/// Decode the published CSV. Columns are located by header name; every
/// column other than the three identifiers is a make.
pub fn parse_csv(body: &[u8]) -> Result<WideTable> {
  let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(body);

  let headers: Vec<String> = reader
    .byte_headers()
    .map_err(Error::parse)?
    .iter()
    .map(|h| String::from_utf8_lossy(h).trim_start_matches('\u{feff}').trim().to_owned())
    .collect();

  let column = |name: &str| {
    headers.iter().position(|h| h == name).ok_or_else(|| Error::anchor(name))
  };
  let (month, year, power) = (column(MONTH)?, column(YEAR)?, column(DRIVING_POWER)?);

  let make_columns: Vec<usize> =
    (0..headers.len()).filter(|i| ![month, year, power].contains(i)).collect();
  let makes = make_columns.iter().map(|&i| headers[i].clone()).collect();

  let mut rows = Vec::new();
  for record in reader.byte_records() {
    let record = record.map_err(Error::parse)?;
    let field = |i: usize| {
      record.get(i).map(|f| String::from_utf8_lossy(f).trim().to_owned()).unwrap_or_default()
    };
    if (0..record.len()).all(|i| field(i).is_empty()) {
      continue;
    }
    rows.push(WideRow {
      month:         field(month),
      year:          field(year),
      driving_power: field(power),
      counts:        make_columns.iter().map(|&i| field(i)).collect(),
    });
  }

  debug!(rows = rows.len(), "parsed Finnish CSV");
  Ok(WideTable { makes, rows })
}

/// `("2024", "May")` → 2024-05.
fn month_of(year: &str, month: &str) -> Result<Period> {
  NaiveDate::parse_from_str(&format!("{year}-{month}-01"), "%Y-%B-%d")
    .map(Period::containing)
    .map_err(|_| Error::InvalidPeriod(format!("{year} {month}")))
}

/// Wide to long: one observation per (row, make).
pub fn melt(table: WideTable) -> Result<Vec<Observation>> {
  let mut observations = Vec::with_capacity(table.rows.len() * table.makes.len());
  for row in table.rows {
    let date = month_of(&row.year, &row.month)?;
    for (make, count) in table.makes.iter().zip(&row.counts) {
      observations.push(Observation {
        date,
        fuel_label: row.driving_power.clone(),
        make: make.clone(),
        count: coerce_count(count),
      });
    }
  }
  Ok(observations)
}

// ─── Pipeline ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
pub struct Finland;

impl CountryPipeline for Finland {
  type Raw = WideTable;

  fn country(&self) -> Country { Country::Finland }

  fn leaderboard_table(&self) -> Option<&'static str> { Some(TABLE) }

  async fn fetch<F: Fetcher>(&self, fetcher: &F, _period: Period) -> Result<Vec<Download>> {
    let payload = download(fetcher, HttpRequest::get(URL)).await?;
    Ok(vec![Download {
      label: Country::Finland.slug().to_owned(),
      blob_name: BLOB.to_owned(),
      payload,
    }])
  }

  fn parse(&self, downloads: &[Download]) -> Result<WideTable> {
    let download = downloads.first().ok_or_else(|| Error::parse("no Finnish payload"))?;
    parse_csv(&download.payload.body)
  }

  fn normalize(&self, raw: WideTable, _period: Period) -> Result<Vec<Batch>> {
    let records = resolve(melt(raw)?, &FUELS, MissingPolicy::PlaceholderAsZero)?;
    Ok(vec![Batch { table: TABLE, mode: WriteMode::Replace, records }])
  }
}
