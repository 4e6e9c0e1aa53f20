//! Record file encoding
//!
//! A record file is a JSON object with two fields:
//!
//! ```json
//! {
//!   "generation": 3,
//!   "bins": { "catalog": { ... } }
//! }
//! ```
//!
//! The generation counter lives alongside the bins so a record carries its
//! own write history across process restarts.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::record::{Bins, Value};

#[derive(Debug, Serialize, Deserialize)]
struct RecordFile {
    generation: u64,
    bins: Bins,
}

/// Parse a record file's content into bins and a generation counter
pub fn parse(content: &str) -> Result<(Bins, u64)> {
    let file: RecordFile =
        serde_json::from_str(content).context("Failed to parse record file")?;
    Ok((file.bins, file.generation))
}

/// Render bins and a generation counter back into record file content
pub fn render(bins: &Bins, generation: u64) -> String {
    let file = RecordFile {
        generation,
        bins: bins.clone(),
    };
    let mut out = serde_json::to_string_pretty(&file).unwrap_or_default();
    out.push('\n');
    out
}

/// Render a single value as pretty-printed JSON, for display
pub fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(entries) => Value::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}
