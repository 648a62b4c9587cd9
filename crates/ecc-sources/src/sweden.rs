//! Sweden: the Mobility Sweden Power BI report.
//!
//! The public report is queried once per fuel class. Each answer is a Power
//! BI "DSR" data set: rows of `(make, market share, count)` where values
//! equal to the previous row's are left out and flagged in an `R` bitmask.

use ecc_core::{
  Batch, Country, Error, Field, FuelType, Period, RegistrationRecord, Result, WriteMode,
  collab::{Download, Fetcher, HttpRequest},
  normalize::{FuelMap, MissingPolicy, Observation, aggregate, coerce_count, resolve},
  pipeline::{CountryPipeline, download},
};
use serde_json::{Value, json};
use tracing::{debug, warn};
use uuid::Uuid;

pub const TABLE: &str = "sweden";

const URL: &str =
  "https://wabi-north-europe-k-primary-api.analysis.windows.net/public/reports/querydata";
const RESOURCE_KEY: &str = "813cce17-dcb9-4dfe-bb46-21436ef98cef";
const MODEL_ID: u64 = 1_876_611;
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36";

const ROWS: &str = "/results/0/result/data/dsr/DS/0/PH/0/DM0";
const VALUE_DICTS: &str = "/results/0/result/data/dsr/DS/0/ValueDicts";

/// Projected columns of every row, in order.
const MAKE: usize = 0;
const COUNT: usize = 2;
const COLUMNS: usize = 3;

const UNIQUE: &[Field] = &[Field::Date, Field::FuelType, Field::Make];

const MONTHS: [&str; 12] = [
  "januari",
  "februari",
  "mars",
  "april",
  "maj",
  "juni",
  "juli",
  "augusti",
  "september",
  "oktober",
  "november",
  "december",
];

/// Fuel classes in query order.
pub const FUELS: FuelMap = FuelMap::new(Country::Sweden, &[
  ("Bensin", FuelType::Petrol),
  ("Diesel", FuelType::Diesel),
  ("EL", FuelType::Bev),
  ("Elhybrid", FuelType::Fhev),
  ("Etanol", FuelType::Other),
  ("Gas", FuelType::Other),
  ("Laddhybrid", FuelType::Phev),
  ("Ospec.", FuelType::Other),
]);

// ─── Request ─────────────────────────────────────────────────────────────────

fn literal(value: &str) -> Value { json!([[{ "Literal": { "Value": format!("'{value}'") } }]]) }

fn equals(source: &str, property: &str, value: &str) -> Value {
  json!({
    "Condition": {
      "In": {
        "Expressions": [{
          "Column": { "Expression": { "SourceRef": { "Source": source } }, "Property": property }
        }],
        "Values": literal(value),
      }
    }
  })
}

fn measure() -> Value {
  json!({
    "Measure": {
      "Expression": { "SourceRef": { "Source": "m" } },
      "Property": "Antal nyregistrerade",
    }
  })
}

fn column(property: &str) -> Value {
  json!({
    "Column": { "Expression": { "SourceRef": { "Source": "d" } }, "Property": property },
    "Name": format!("DimModel.{property}"),
    "NativeReferenceName": property,
  })
}

/// The semantic query for passenger cars of one fuel class in one month.
pub fn query_body(period: Period, fuel_label: &str) -> Value {
  let month = MONTHS[period.month() as usize - 1];
  let year = period.year().to_string();

  let mut count = measure();
  count["Name"] = json!("MeasuresTable.Antal nyregistrerade");
  count["NativeReferenceName"] = json!("Antal");

  json!({
    "version": "1.0.0",
    "queries": [{
      "Query": {
        "Commands": [{
          "SemanticQueryDataShapeCommand": {
            "Query": {
              "Version": 2,
              "From": [
                { "Name": "d",   "Entity": "DimModel",        "Type": 0 },
                { "Name": "m",   "Entity": "MeasuresTable",   "Type": 0 },
                { "Name": "d1",  "Entity": "DimDate",         "Type": 0 },
                { "Name": "d11", "Entity": "DimVehicleType",  "Type": 0 },
                { "Name": "d2",  "Entity": "DimFuel",         "Type": 0 },
                { "Name": "s",   "Entity": "Slice by",        "Type": 0 },
              ],
              "Select": [
                column("Fabrikat"),
                {
                  "Arithmetic": {
                    "Left": measure(),
                    "Right": { "ScopedEval": { "Expression": measure(), "Scope": [] } },
                    "Operator": 3,
                  },
                  "Name": "Divide(MeasuresTable.Antal nyregistrerade, ScopedEval(MeasuresTable.Antal nyregistrerade, []))",
                  "NativeReferenceName": "Marknadsandel",
                },
                column("TopCodeName"),
                count,
              ],
              "Where": [
                equals("d1", "MånadNamn", month),
                equals("d1", "År", &year),
                equals("d11", "Fordonsslag", "Personbil"),
                equals("d2", "Drivmedelklass", fuel_label),
                equals("s", "Slice by Fields", "''MeasuresTable''[Antal nyregistrerade]"),
              ],
              "OrderBy": [{ "Direction": 2, "Expression": measure() }],
            },
            "Binding": {
              "Primary": { "Groupings": [{ "Projections": [0, 1, 3] }] },
              "DataReduction": { "DataVolume": 4, "Primary": { "Window": { "Count": 1000 } } },
              "SuppressedJoinPredicates": [1],
              "Version": 1,
            },
          }
        }]
      },
      "QueryId": "",
    }],
    "cancelQueries": [],
    "modelId": MODEL_ID,
  })
}

fn request(period: Period, fuel_label: &str) -> HttpRequest {
  HttpRequest::post_json(URL, query_body(period, fuel_label))
    .query("synchronous", "true")
    .header("Accept", "application/json, text/plain, */*")
    .header("ActivityId", Uuid::new_v4().to_string())
    .header("RequestId", Uuid::new_v4().to_string())
    .header("Origin", "https://app.powerbi.com")
    .header("Referer", "https://app.powerbi.com/")
    .header("User-Agent", USER_AGENT)
    .header("X-PowerBI-ResourceKey", RESOURCE_KEY)
}

// ─── Raw table ───────────────────────────────────────────────────────────────

/// One make's row of a fuel query; `count` is `None` when the source left it
/// out as a repeat of the previous row.
#[derive(Debug, Clone, PartialEq)]
pub struct MakeCount {
  pub make:  String,
  pub count: Option<f64>,
}

/// The decoded answer to one fuel-class query.
#[derive(Debug, Clone, PartialEq)]
pub struct FuelQuery {
  pub label: String,
  pub rows:  Vec<MakeCount>,
}

fn bitmask(entry: &Value, key: &str) -> u64 { entry.get(key).and_then(Value::as_u64).unwrap_or(0) }

/// The value dictionary the make column indexes into. The first row's `S`
/// schema names it under `DN`; answers without one use `D0`.
fn make_dictionary<'a>(answer: &'a Value, entries: &[Value]) -> Option<&'a Vec<Value>> {
  let name = entries
    .iter()
    .find_map(|e| e.get("S")?.get(MAKE)?.get("DN")?.as_str())
    .unwrap_or("D0");
  answer.pointer(VALUE_DICTS)?.get(name)?.as_array()
}

/// Rows of a DSR data set, in source order.
pub fn decode_rows(answer: &Value) -> Result<Vec<MakeCount>> {
  let entries = answer
    .pointer(ROWS)
    .and_then(Value::as_array)
    .ok_or_else(|| Error::anchor(ROWS))?;
  let dictionary = make_dictionary(answer, entries);

  let mut previous_make: Option<String> = None;
  let mut rows = Vec::with_capacity(entries.len());

  for entry in entries {
    let Some(values) = entry.get("C").and_then(Value::as_array).filter(|c| !c.is_empty())
    else {
      continue;
    };
    let repeated = bitmask(entry, "R");
    let nulls = bitmask(entry, "Ø");

    let mut values = values.iter();
    let mut cells: [Option<&Value>; COLUMNS] = [None; COLUMNS];
    for (i, cell) in cells.iter_mut().enumerate() {
      if (repeated | nulls) & (1 << i) == 0 {
        *cell = values.next();
      }
    }

    let make = match cells[MAKE] {
      Some(Value::String(name)) => Some(name.clone()),
      Some(Value::Number(n)) => n
        .as_u64()
        .and_then(|i| dictionary?.get(i as usize)?.as_str())
        .map(str::to_owned),
      _ if repeated & (1 << MAKE) != 0 => previous_make.clone(),
      _ => None,
    };
    let Some(make) = make else {
      warn!(?entry, "row without a make skipped");
      continue;
    };

    let count = match cells[COUNT] {
      Some(Value::String(s)) => coerce_count(s),
      Some(Value::Number(n)) => n.as_f64(),
      _ => None,
    };

    previous_make = Some(make.clone());
    rows.push(MakeCount { make, count });
  }

  Ok(rows)
}

// ─── Pipeline ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
pub struct Sweden;

impl CountryPipeline for Sweden {
  type Raw = Vec<FuelQuery>;

  fn country(&self) -> Country { Country::Sweden }

  fn leaderboard_table(&self) -> Option<&'static str> { Some(TABLE) }

  async fn fetch<F: Fetcher>(&self, fetcher: &F, period: Period) -> Result<Vec<Download>> {
    let mut downloads = Vec::new();
    for label in FUELS.labels() {
      let payload = download(fetcher, request(period, label)).await?;
      debug!(fuel = label, bytes = payload.body.len(), "fuel query answered");
      downloads.push(Download {
        label: label.to_owned(),
        blob_name: format!("sweden/{period}/{label}.json"),
        payload,
      });
    }
    Ok(downloads)
  }

  fn parse(&self, downloads: &[Download]) -> Result<Vec<FuelQuery>> {
    downloads
      .iter()
      .map(|d| {
        let answer: Value = serde_json::from_slice(&d.payload.body)?;
        Ok(FuelQuery { label: d.label.clone(), rows: decode_rows(&answer)? })
      })
      .collect()
  }

  /// Every record is dated `period`: the report is queried for exactly one
  /// month and does not echo it back.
  fn normalize(&self, raw: Vec<FuelQuery>, period: Period) -> Result<Vec<Batch>> {
    let mut records: Vec<RegistrationRecord> = Vec::new();
    for query in raw {
      let observations = query
        .rows
        .into_iter()
        .map(|row| Observation {
          date:       period,
          fuel_label: query.label.clone(),
          make:       row.make,
          count:      row.count,
        })
        .collect();
      records.extend(resolve(observations, &FUELS, MissingPolicy::ForwardFill)?);
    }
    Ok(vec![Batch { table: TABLE, mode: WriteMode::Upsert(UNIQUE), records: aggregate(records) }])
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::fake::ScriptedFetcher;

  fn may() -> Period { "2024-05".parse().unwrap() }

  fn answer(rows: Value) -> Value {
    json!({ "results": [{ "result": { "data": { "dsr": { "DS": [{ "PH": [{ "DM0": rows }] }] } } } }] })
  }

  #[test]
  fn repeated_counts_are_left_missing() {
    let rows = decode_rows(&answer(json!([
      { "S": [{ "N": "G0" }, { "N": "M0" }, { "N": "M1" }], "C": ["Volvo", "0.2D", "120L"] },
      { "C": ["Kia", "0.2D"], "R": 4 },
      { "C": ["Tesla", "0.05D", "50L"] },
      { "C": ["BMW"], "R": 6 },
    ])))
    .unwrap();

    let counts: Vec<_> = rows.iter().map(|r| r.count).collect();
    assert_eq!(counts, [Some(120.0), None, Some(50.0), None]);
    assert_eq!(rows[3].make, "BMW");
  }

  #[test]
  fn value_dictionary_and_repeated_make_are_resolved() {
    let mut value = answer(json!([
      { "C": [0, "0.3D", 10] },
      { "C": ["0.1D", "4L"], "R": 1 },
    ]));
    value["results"][0]["result"]["data"]["dsr"]["DS"][0]["ValueDicts"] =
      json!({ "D0": ["Polestar"] });

    let rows = decode_rows(&value).unwrap();
    assert_eq!(rows, [
      MakeCount { make: "Polestar".into(), count: Some(10.0) },
      MakeCount { make: "Polestar".into(), count: Some(4.0) },
    ]);
  }

  #[test]
  fn make_dictionary_is_named_by_the_row_schema() {
    let mut value = answer(json!([
      { "S": [{ "N": "G0", "DN": "D1" }, { "N": "M0" }, { "N": "M1" }], "C": [1, "0.3D", 10] },
      { "C": [0, "0.1D", 4] },
    ]));
    value["results"][0]["result"]["data"]["dsr"]["DS"][0]["ValueDicts"] =
      json!({ "D0": ["Personbil"], "D1": ["Kia", "Volvo"] });

    let rows = decode_rows(&value).unwrap();
    let makes: Vec<_> = rows.iter().map(|r| r.make.as_str()).collect();
    assert_eq!(makes, ["Volvo", "Kia"]);
  }

  #[test]
  fn missing_data_path_is_a_parse_error() {
    let err = decode_rows(&json!({ "results": [] })).unwrap_err();
    assert!(matches!(err, Error::AnchorNotFound { .. }));
  }

  #[test]
  fn normalize_fills_within_each_query_and_sums_categories() {
    let raw = vec![
      FuelQuery {
        label: "Etanol".into(),
        rows:  vec![
          MakeCount { make: "Volvo".into(), count: Some(7.0) },
          MakeCount { make: "Saab".into(), count: None },
        ],
      },
      FuelQuery {
        label: "Gas".into(),
        rows:  vec![
          MakeCount { make: "Volvo".into(), count: None },
          MakeCount { make: "Saab".into(), count: Some(2.0) },
        ],
      },
    ];

    let batches = Sweden.normalize(raw, may()).unwrap();
    let records = &batches[0].records;
    assert_eq!(batches[0].mode, WriteMode::Upsert(UNIQUE));

    // Gas/Volvo has no predecessor in its own query and is dropped.
    assert_eq!(records, &[
      RegistrationRecord::new(may(), FuelType::Other, "Saab", 9.0),
      RegistrationRecord::new(may(), FuelType::Other, "Volvo", 7.0),
    ]);
  }

  #[test]
  fn unmapped_fuel_class_fails_loudly() {
    let raw = vec![FuelQuery {
      label: "Vätgas".into(),
      rows:  vec![MakeCount { make: "Toyota".into(), count: Some(1.0) }],
    }];
    assert_eq!(Sweden.normalize(raw, may()).unwrap_err().kind(), ecc_core::ErrorKind::Mapping);
  }

  #[test]
  fn query_filters_on_swedish_month_and_fuel() {
    let body = query_body("2024-12".parse().unwrap(), "Laddhybrid").to_string();
    assert!(body.contains("'december'"));
    assert!(body.contains("'2024'"));
    assert!(body.contains("'Laddhybrid'"));
    assert!(body.contains("'Personbil'"));
  }

  #[tokio::test]
  async fn fetch_posts_one_query_per_fuel_class() {
    let fetcher = ScriptedFetcher::new(200, answer(json!([])).to_string());
    let downloads = Sweden.fetch(&fetcher, may()).await.unwrap();

    assert_eq!(downloads.len(), 8);
    assert_eq!(downloads[2].blob_name, "sweden/2024-05/EL.json");
    assert!(fetcher.requests().iter().all(|r| r.json.is_some()));
  }

  #[tokio::test]
  async fn any_failed_query_fails_the_fetch() {
    let fetcher = ScriptedFetcher::new(503, "");
    let err = Sweden.fetch(&fetcher, may()).await.unwrap_err();
    assert!(matches!(err, Error::Fetch { status: 503, .. }));
    assert_eq!(fetcher.requests().len(), 1);
  }
}
