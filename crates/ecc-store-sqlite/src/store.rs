//! [`SqliteWarehouse`]: the SQLite implementation of [`Warehouse`] and
//! [`WarehouseReader`].

use std::path::Path;

use ecc_core::{
  Field, FuelType, Period, RegistrationRecord,
  warehouse::{
    AdoptionPoint, ComparisonRow, ComparisonWindow, FuelTypeTotal, LeaderboardEntry,
    MakeFuelShare, MarketSharePoint, Replaced, Warehouse, WarehouseReader,
  },
};
use rusqlite::types::Value;
use tracing::debug;

use crate::{
  Result,
  encode::{
    RawComparison, RawPair, RawRecord, RawShare, RawTotal, encode_period, encode_record,
    leaderboard_entry,
  },
  error::Error,
  schema::{LEADERBOARD_TABLE, SCHEMA, check_table, insert, registration_table, unique_index},
};

/// How many makes a leaderboard keeps per country and month.
const LEADERBOARD_SIZE: i64 = 10;

fn table_exists(conn: &rusqlite::Connection, table: &str) -> rusqlite::Result<bool> {
  conn.query_row(
    "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
    [table],
    |row| row.get(0),
  )
}

fn since_param(since: Option<Period>) -> Value {
  since.map(encode_period).map_or(Value::Null, Value::Text)
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A registration warehouse backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteWarehouse {
  conn: tokio_rusqlite::Connection,
}

impl SqliteWarehouse {
  /// Open (or create) a warehouse at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory warehouse, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Number of rows in `table`; zero when it does not exist.
  pub async fn count(&self, table: &str) -> Result<usize> {
    check_table(table)?;
    let table = table.to_owned();
    let n: i64 = self
      .conn
      .call(move |conn| {
        if !table_exists(conn, &table)? {
          return Ok(0);
        }
        Ok(conn.query_row(&format!("SELECT COUNT(*) FROM \"{table}\""), [], |r| r.get(0))?)
      })
      .await?;
    Ok(n as usize)
  }

  /// Run a read query against a registration table. A missing table yields
  /// no rows.
  async fn select<T, F>(&self, table: &str, sql: String, params: Vec<Value>, map: F) -> Result<Vec<T>>
  where
    T: Send + 'static,
    F: Fn(&rusqlite::Row<'_>) -> rusqlite::Result<T> + Send + 'static,
  {
    check_table(table)?;
    let table = table.to_owned();
    let rows = self
      .conn
      .call(move |conn| {
        if !table_exists(conn, &table)? {
          return Ok(Vec::new());
        }
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), |row| map(row))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(rows)
  }
}

// ─── Write side ──────────────────────────────────────────────────────────────

/// Create `table` if needed and insert `rows` inside `tx`.
fn load(
  tx: &rusqlite::Transaction<'_>,
  table: &str,
  rows: &[RawRecord],
  unique_fields: &[Field],
) -> rusqlite::Result<usize> {
  let mut ddl = registration_table(table);
  if !unique_fields.is_empty() {
    ddl.push_str(&unique_index(table, unique_fields));
  }
  tx.execute_batch(&ddl)?;

  let mut stmt = tx.prepare(&insert(table, unique_fields))?;
  for r in rows {
    stmt.execute(rusqlite::params![r.date, r.fuel_type, r.make, r.registrations])?;
  }
  Ok(rows.len())
}

impl Warehouse for SqliteWarehouse {
  type Error = Error;

  async fn append(
    &self,
    table: &str,
    records: &[RegistrationRecord],
    unique_fields: &[Field],
  ) -> Result<usize> {
    check_table(table)?;
    let owned = table.to_owned();
    let fields = unique_fields.to_vec();
    let rows: Vec<_> = records.iter().map(encode_record).collect();

    let written = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let written = load(&tx, &owned, &rows, &fields)?;
        tx.commit()?;
        Ok(written)
      })
      .await?;

    debug!(table, written, "records appended");
    Ok(written)
  }

  async fn replace(&self, table: &str, records: &[RegistrationRecord]) -> Result<Replaced> {
    check_table(table)?;
    let owned = table.to_owned();
    let rows: Vec<_> = records.iter().map(encode_record).collect();

    let replaced = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let dropped = table_exists(&tx, &owned)?;
        if dropped {
          tx.execute_batch(&format!("DROP TABLE \"{owned}\""))?;
        }
        let written = load(&tx, &owned, &rows, &[])?;
        tx.commit()?;
        Ok(Replaced { dropped, written })
      })
      .await?;

    debug!(table, dropped = replaced.dropped, written = replaced.written, "table replaced");
    Ok(replaced)
  }

  async fn drop_table(&self, table: &str) -> Result<bool> {
    check_table(table)?;
    let table = table.to_owned();
    let existed = self
      .conn
      .call(move |conn| {
        let existed = table_exists(conn, &table)?;
        if existed {
          conn.execute_batch(&format!("DROP TABLE \"{table}\""))?;
        }
        Ok(existed)
      })
      .await?;
    Ok(existed)
  }

  async fn refresh_leaderboard(&self, country: &str, table: &str) -> Result<usize> {
    check_table(table)?;
    let table = table.to_owned();
    let country = country.to_owned();

    let delete = format!(
      "DELETE FROM {LEADERBOARD_TABLE}
       WHERE country = ?1 AND date = (SELECT MAX(date) FROM \"{table}\")"
    );
    let rebuild = format!(
      "WITH latest AS (SELECT MAX(date) AS d FROM \"{table}\"),
       bev AS (
           SELECT make, SUM(registrations) AS sales
           FROM \"{table}\", latest
           WHERE date = latest.d AND fuel_type = 'BEV'
           GROUP BY make
       )
       INSERT INTO {LEADERBOARD_TABLE} (country, date, rank, make, bev_sales, bev_percentage)
       SELECT ?1, latest.d,
              ROW_NUMBER() OVER (ORDER BY sales DESC, make),
              make, sales,
              sales * 100.0 / SUM(sales) OVER ()
       FROM bev, latest
       ORDER BY sales DESC, make
       LIMIT ?2"
    );

    let inserted = self
      .conn
      .call(move |conn| {
        if !table_exists(conn, &table)? {
          return Ok(0);
        }
        let tx = conn.transaction()?;
        tx.execute(&delete, [&country])?;
        let inserted = tx.execute(&rebuild, rusqlite::params![country, LEADERBOARD_SIZE])?;
        tx.commit()?;
        Ok(inserted)
      })
      .await?;
    Ok(inserted)
  }
}

// ─── Read side ───────────────────────────────────────────────────────────────

impl WarehouseReader for SqliteWarehouse {
  type Error = Error;

  async fn fuel_type_series(&self, table: &str, since: Option<Period>) -> Result<Vec<FuelTypeTotal>> {
    let sql = format!(
      "SELECT date, fuel_type, SUM(registrations)
       FROM \"{table}\"
       WHERE ?1 IS NULL OR date >= ?1
       GROUP BY date, fuel_type
       ORDER BY date, fuel_type"
    );
    let raws = self
      .select(table, sql, vec![since_param(since)], |row| {
        Ok(RawTotal { date: row.get(0)?, fuel_type: row.get(1)?, registrations: row.get(2)? })
      })
      .await?;
    raws.into_iter().map(RawTotal::into_total).collect()
  }

  async fn period_comparison(
    &self,
    table: &str,
    window: ComparisonWindow,
  ) -> Result<Vec<ComparisonRow>> {
    let (current, previous) = match window {
      ComparisonWindow::TrailingYear => (
        format!("SELECT DISTINCT date FROM \"{table}\" ORDER BY date DESC LIMIT 12"),
        format!("SELECT DISTINCT date FROM \"{table}\" ORDER BY date DESC LIMIT 12 OFFSET 12"),
      ),
      ComparisonWindow::SameMonthLastYear => (
        format!("SELECT MAX(date) FROM \"{table}\""),
        format!("SELECT date(MAX(date), '-1 year') FROM \"{table}\""),
      ),
    };
    let sql = format!(
      "WITH cur AS (
           SELECT fuel_type, SUM(registrations) AS reg FROM \"{table}\"
           WHERE date IN ({current}) GROUP BY fuel_type
       ),
       prev AS (
           SELECT fuel_type, SUM(registrations) AS reg FROM \"{table}\"
           WHERE date IN ({previous}) GROUP BY fuel_type
       )
       SELECT cur.fuel_type, cur.reg, prev.reg, (SELECT SUM(reg) FROM cur)
       FROM cur JOIN prev ON prev.fuel_type = cur.fuel_type
       ORDER BY cur.reg DESC"
    );
    let raws = self
      .select(table, sql, Vec::new(), |row| {
        Ok(RawComparison {
          fuel_type:     row.get(0)?,
          current:       row.get(1)?,
          previous:      row.get(2)?,
          current_total: row.get(3)?,
        })
      })
      .await?;
    raws.into_iter().map(RawComparison::into_row).collect()
  }

  async fn top_make_fuel_share(&self, table: &str, limit: usize) -> Result<Vec<MakeFuelShare>> {
    let sql = format!(
      "WITH latest AS (SELECT MAX(date) AS d FROM \"{table}\"),
       top AS (
           SELECT make FROM \"{table}\", latest WHERE date = latest.d
           GROUP BY make ORDER BY SUM(registrations) DESC LIMIT ?1
       ),
       per AS (
           SELECT make, fuel_type, SUM(registrations) AS reg
           FROM \"{table}\", latest
           WHERE date = latest.d AND make IN (SELECT make FROM top)
           GROUP BY make, fuel_type
       )
       SELECT make, fuel_type, ROUND(reg * 100.0 / SUM(reg) OVER (PARTITION BY make), 1)
       FROM per
       ORDER BY SUM(reg) OVER (PARTITION BY make) DESC, make, reg DESC"
    );
    let raws = self
      .select(table, sql, vec![Value::Integer(limit as i64)], |row| {
        Ok(RawShare { make: row.get(0)?, fuel_type: row.get(1)?, market_share: row.get(2)? })
      })
      .await?;
    raws.into_iter().map(RawShare::into_share).collect()
  }

  async fn market_share(
    &self,
    table: &str,
    fuel_type: FuelType,
    makes: &[String],
    since: Option<Period>,
  ) -> Result<Vec<MarketSharePoint>> {
    if makes.is_empty() {
      return Ok(Vec::new());
    }
    let placeholders: Vec<String> = (0..makes.len()).map(|i| format!("?{}", i + 3)).collect();
    let sql = format!(
      "WITH totals AS (
           SELECT date, SUM(registrations) AS total FROM \"{table}\"
           WHERE fuel_type = ?1 GROUP BY date
       )
       SELECT a.date, SUM(a.registrations), b.total
       FROM \"{table}\" AS a JOIN totals AS b ON b.date = a.date
       WHERE a.fuel_type = ?1
         AND (?2 IS NULL OR a.date >= ?2)
         AND a.make IN ({})
       GROUP BY a.date, b.total
       ORDER BY a.date",
      placeholders.join(", "),
    );

    let mut params = vec![Value::Text(fuel_type.as_str().to_owned()), since_param(since)];
    params.extend(makes.iter().cloned().map(Value::Text));

    let raws = self
      .select(table, sql, params, |row| {
        Ok(RawPair { date: row.get(0)?, a: row.get(1)?, b: row.get(2)? })
      })
      .await?;
    raws.into_iter().map(RawPair::into_market_share).collect()
  }

  async fn adoption_curve(&self, table: &str, since: Option<Period>) -> Result<Vec<AdoptionPoint>> {
    let sql = format!(
      "WITH total AS (
           SELECT date, SUM(registrations) AS total FROM \"{table}\"
           WHERE ?1 IS NULL OR date >= ?1 GROUP BY date
       ),
       bev AS (
           SELECT date, SUM(registrations) AS bev FROM \"{table}\"
           WHERE fuel_type = 'BEV' AND (?1 IS NULL OR date >= ?1) GROUP BY date
       )
       SELECT total.date, bev.bev, total.total
       FROM total JOIN bev ON bev.date = total.date
       ORDER BY total.date"
    );
    let raws = self
      .select(table, sql, vec![since_param(since)], |row| {
        Ok(RawPair { date: row.get(0)?, a: row.get(1)?, b: row.get(2)? })
      })
      .await?;
    raws.into_iter().map(RawPair::into_adoption).collect()
  }

  async fn top_makers(&self, country: &str) -> Result<Vec<LeaderboardEntry>> {
    let country = country.to_owned();
    let entries = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT make, bev_sales, bev_percentage FROM {LEADERBOARD_TABLE}
           WHERE country = ?1
             AND date = (SELECT MAX(date) FROM {LEADERBOARD_TABLE} WHERE country = ?1)
           ORDER BY rank"
        ))?;
        let rows = stmt
          .query_map([&country], leaderboard_entry)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(entries)
  }
}
