//! SQL schema for the warehouse.
//!
//! The fixed part runs once at connection startup. Registration tables are
//! created lazily by [`registration_table`] because their names come from
//! the pipelines.

use ecc_core::Field;

use crate::{Error, Result};

pub const LEADERBOARD_TABLE: &str = "national_top_makers";

/// Fixed DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- Best-selling BEV makes per country and month, recomputed after each publish.
CREATE TABLE IF NOT EXISTS national_top_makers (
    country        TEXT    NOT NULL,
    date           TEXT    NOT NULL,   -- YYYY-MM-01
    rank           INTEGER NOT NULL,
    make           TEXT    NOT NULL,
    bev_sales      REAL    NOT NULL,
    bev_percentage REAL    NOT NULL,   -- share of the month's BEV registrations
    PRIMARY KEY (country, date, make)
);

PRAGMA user_version = 1;
";

/// Reject anything but `[A-Za-z_][A-Za-z0-9_]*`, and the reserved
/// leaderboard table.
pub fn check_table(name: &str) -> Result<()> {
  let mut chars = name.chars();
  let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
    && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    && name != LEADERBOARD_TABLE;
  if valid { Ok(()) } else { Err(Error::InvalidTable(name.to_owned())) }
}

pub fn registration_table(table: &str) -> String {
  format!(
    "CREATE TABLE IF NOT EXISTS \"{table}\" (
         date          TEXT NOT NULL,   -- YYYY-MM-01
         fuel_type     TEXT NOT NULL,
         make          TEXT NOT NULL,
         registrations REAL NOT NULL
     );
     CREATE INDEX IF NOT EXISTS \"{table}__date\" ON \"{table}\"(date);"
  )
}

pub fn unique_index(table: &str, fields: &[Field]) -> String {
  let columns: Vec<&str> = fields.iter().map(|f| f.column()).collect();
  format!(
    "CREATE UNIQUE INDEX IF NOT EXISTS \"{table}__{}\" ON \"{table}\"({});",
    columns.join("_"),
    columns.join(", "),
  )
}

/// Plain insert without a key, upsert with one. Key columns are left alone
/// on conflict; everything else takes the incoming value.
pub fn insert(table: &str, fields: &[Field]) -> String {
  let base = format!(
    "INSERT INTO \"{table}\" (date, fuel_type, make, registrations) VALUES (?1, ?2, ?3, ?4)"
  );
  if fields.is_empty() {
    return base;
  }

  let key: Vec<&str> = fields.iter().map(|f| f.column()).collect();
  let updates: Vec<String> = ["date", "fuel_type", "make", "registrations"]
    .into_iter()
    .filter(|c| !key.contains(c))
    .map(|c| format!("{c} = excluded.{c}"))
    .collect();

  format!("{base} ON CONFLICT({}) DO UPDATE SET {}", key.join(", "), updates.join(", "))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn only_plain_identifiers_are_tables() {
    assert!(check_table("switzerland_make").is_ok());
    assert!(check_table("_staging2").is_ok());
    assert!(check_table("").is_err());
    assert!(check_table("2024").is_err());
    assert!(check_table("finland\"; DROP TABLE x; --").is_err());
    assert!(check_table(LEADERBOARD_TABLE).is_err());
  }

  #[test]
  fn upsert_updates_non_key_columns() {
    let sql = insert("t", &[Field::Date, Field::Make]);
    assert!(sql.ends_with(
      "ON CONFLICT(date, make) DO UPDATE SET fuel_type = excluded.fuel_type, \
       registrations = excluded.registrations"
    ));
    assert!(!insert("t", &[]).contains("ON CONFLICT"));
  }
}
