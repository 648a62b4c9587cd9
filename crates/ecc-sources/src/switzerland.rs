//! Switzerland: the auto-schweiz monthly MOFIS workbook.
//!
//! The last worksheet holds two blocks under a `Marken / marques` header:
//! registrations per make down to a `Total` row, and further down eight
//! fuel rows starting at `Benzin`. Counts sit in the fourth column.

use std::io::Cursor;

use calamine::{Data, Reader, open_workbook_auto_from_rs};
use ecc_core::{
  Batch, Country, Error, Field, FuelType, Period, RegistrationRecord, Result, WriteMode,
  collab::{Download, Fetcher, HttpRequest},
  normalize::{FuelMap, MissingPolicy, Observation, aggregate, coerce_count, resolve},
  pipeline::{CountryPipeline, download},
  record::ALL_MAKES,
};
use tracing::debug;

pub const MAKE_TABLE: &str = "switzerland_make";
pub const FUEL_TABLE: &str = "switzerland_fueltype";

const MAKE_KEY: &[Field] = &[Field::Date, Field::Make];
const FUEL_KEY: &[Field] = &[Field::Date, Field::FuelType];

const HEADER_ANCHOR: &str = "Marken / marques";
const TOTAL_ANCHOR: &str = "Total";
const FUEL_ANCHOR: &str = "Benzin";
const FUEL_ROWS: usize = 8;
const COUNT_COLUMN: usize = 3;

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

pub const FUELS: FuelMap = FuelMap::new(Country::Switzerland, &[
  ("Benzin", FuelType::Petrol),
  ("Diesel", FuelType::Diesel),
  ("Hybrid HEV + MHEV", FuelType::Fhev),
  ("Plug-In PHEV* + REX", FuelType::Phev),
  ("Elektrisch/BEV", FuelType::Bev),
  ("Elektrisch", FuelType::Bev),
  ("CNG", FuelType::Other),
  ("Wasserstoff/Elektrisch", FuelType::Other),
  ("Diverse", FuelType::Other),
]);

/// The workbook for `period` is uploaded in the following month, and its
/// file name carries the month without a leading zero.
pub fn workbook_url(period: Period) -> String {
  let upload = period.next();
  format!(
    "https://www.auto.swiss/wp-content/uploads/{}/{:02}/MOFISPW{}_{}.xlsx",
    upload.year(),
    upload.month(),
    period.year(),
    period.month(),
  )
}

// ─── Worksheet grid ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
  Text(String),
  Number(f64),
  Empty,
}

impl From<&Data> for Cell {
  fn from(data: &Data) -> Self {
    match data {
      Data::String(s) => Cell::Text(s.trim().to_owned()),
      Data::Float(f) => Cell::Number(*f),
      Data::Int(i) => Cell::Number(*i as f64),
      Data::Empty | Data::Error(_) => Cell::Empty,
      other => Cell::Text(other.to_string()),
    }
  }
}

impl Cell {
  fn text(&self) -> Option<&str> {
    match self {
      Cell::Text(s) if !s.is_empty() => Some(s),
      _ => None,
    }
  }

  fn count(&self) -> Option<f64> {
    match self {
      Cell::Number(n) => Some(*n),
      Cell::Text(s) => coerce_count(s),
      Cell::Empty => None,
    }
  }
}

pub type Grid = Vec<Vec<Cell>>;

/// Read the last worksheet of an xlsx/xls payload.
pub fn read_last_sheet(body: &[u8]) -> Result<Grid> {
  let mut workbook = open_workbook_auto_from_rs(Cursor::new(body.to_vec())).map_err(Error::parse)?;
  let name = workbook
    .sheet_names()
    .last()
    .cloned()
    .ok_or_else(|| Error::parse("workbook has no sheets"))?;
  let range = workbook.worksheet_range(&name).map_err(Error::parse)?;
  debug!(sheet = %name, rows = range.height(), "read MOFIS worksheet");
  Ok(range.rows().map(|row| row.iter().map(Cell::from).collect()).collect())
}

// ─── Raw tables ──────────────────────────────────────────────────────────────

/// The two blocks of the worksheet, as `(label, count)` pairs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MofisTables {
  pub makes: Vec<(String, Option<f64>)>,
  pub fuels: Vec<(String, Option<f64>)>,
}

fn label(row: &[Cell]) -> Option<&str> { row.first().and_then(Cell::text) }

fn labelled(row: &[Cell]) -> Option<(String, Option<f64>)> {
  let label = label(row)?;
  Some((label.to_owned(), row.get(COUNT_COLUMN).and_then(Cell::count)))
}

pub fn extract(grid: &[Vec<Cell>]) -> Result<MofisTables> {
  let find = |rows: &[Vec<Cell>], anchor: &str| {
    rows.iter().position(|r| label(r) == Some(anchor)).ok_or_else(|| Error::anchor(anchor))
  };

  let header = find(grid, HEADER_ANCHOR)?;
  let body = &grid[header + 1..];

  let total = find(body, TOTAL_ANCHOR)?;
  let makes = body[..total].iter().filter_map(|r| labelled(r)).collect();

  let benzin = find(body, FUEL_ANCHOR)?;
  let fuel_block = body.get(benzin..benzin + FUEL_ROWS).ok_or_else(|| {
    Error::parse(format!("fuel block starting at {FUEL_ANCHOR:?} is shorter than {FUEL_ROWS} rows"))
  })?;
  let fuels = fuel_block.iter().filter_map(|r| labelled(r)).collect();

  Ok(MofisTables { makes, fuels })
}

// ─── Pipeline ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
pub struct Switzerland;

impl CountryPipeline for Switzerland {
  type Raw = MofisTables;

  fn country(&self) -> Country { Country::Switzerland }

  async fn fetch<F: Fetcher>(&self, fetcher: &F, period: Period) -> Result<Vec<Download>> {
    let request = HttpRequest::get(workbook_url(period))
      .header("Referer", "https://www.auto.swiss/")
      .header("Upgrade-Insecure-Requests", "1")
      .header("User-Agent", USER_AGENT);
    let payload = download(fetcher, request).await?;
    Ok(vec![Download {
      label: Country::Switzerland.slug().to_owned(),
      blob_name: format!("switzerland/{period}.xlsx"),
      payload,
    }])
  }

  fn parse(&self, downloads: &[Download]) -> Result<MofisTables> {
    let download = downloads.first().ok_or_else(|| Error::parse("no Swiss payload"))?;
    extract(&read_last_sheet(&download.payload.body)?)
  }

  /// The workbook describes exactly one month, so every record is dated
  /// `period`.
  fn normalize(&self, raw: MofisTables, period: Period) -> Result<Vec<Batch>> {
    let makes = aggregate(raw.makes.into_iter().filter_map(|(make, count)| {
      count.map(|c| RegistrationRecord::new(period, FuelType::AllFuels, make, c))
    }));

    let observations = raw
      .fuels
      .into_iter()
      .map(|(fuel_label, count)| Observation {
        date: period,
        fuel_label,
        make: ALL_MAKES.to_owned(),
        count,
      })
      .collect();
    let fuels = resolve(observations, &FUELS, MissingPolicy::PlaceholderAsZero)?;

    Ok(vec![
      Batch { table: MAKE_TABLE, mode: WriteMode::Upsert(MAKE_KEY), records: makes },
      Batch { table: FUEL_TABLE, mode: WriteMode::Upsert(FUEL_KEY), records: fuels },
    ])
  }
}
