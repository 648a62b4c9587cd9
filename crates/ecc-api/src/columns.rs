//! Column-oriented JSON bodies: `{column: [values...]}`.

use serde_json::{Map, Value};

#[derive(Debug, Default)]
pub struct Columns(Map<String, Value>);

impl Columns {
  /// Start with every named column present and empty, so an empty result
  /// still carries its schema.
  pub fn new(names: &[&str]) -> Self {
    Self(names.iter().map(|n| ((*n).to_owned(), Value::Array(Vec::new()))).collect())
  }

  pub fn push(&mut self, name: &str, value: impl Into<Value>) {
    if let Value::Array(values) =
      self.0.entry(name).or_insert_with(|| Value::Array(Vec::new()))
    {
      values.push(value.into());
    }
  }

  /// Set a scalar field next to the columns.
  pub fn set(&mut self, name: &str, value: impl Into<Value>) {
    self.0.insert(name.to_owned(), value.into());
  }

  pub fn into_value(self) -> Value { Value::Object(self.0) }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn empty_columns_keep_their_names() {
    assert_eq!(Columns::new(&["make", "total"]).into_value(), json!({ "make": [], "total": [] }));
  }

  #[test]
  fn push_appends_in_order() {
    let mut c = Columns::new(&["make"]);
    c.push("make", "Tesla");
    c.push("make", "Volvo");
    c.set("lastUpdate", "2024-05-01");
    assert_eq!(c.into_value(), json!({ "make": ["Tesla", "Volvo"], "lastUpdate": "2024-05-01" }));
  }
}
