//! Structured payloads the model embeds in its answer as fenced JSON blocks.
//!
//! Two families exist: chart specifications (`"type": "bar"` or
//! `"type": "radar"`) and comparison table data (`"type": "comparison_data"`).
//! Both are decoded leniently because they are produced by a language model:
//! numeric chart values may arrive as strings or `null`, table cells may be
//! numbers.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const TYPE_BAR: &str = "bar";
pub const TYPE_RADAR: &str = "radar";
pub const TYPE_COMPARISON_DATA: &str = "comparison_data";

/// Discriminators recognized in the `type` field of an embedded block.
pub const KNOWN_PAYLOAD_TYPES: [&str; 3] = [TYPE_BAR, TYPE_RADAR, TYPE_COMPARISON_DATA];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Radar,
}

impl ChartKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChartKind::Bar => TYPE_BAR,
            ChartKind::Radar => TYPE_RADAR,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSeries {
    pub label: String,
    #[serde(default, deserialize_with = "lenient_numbers")]
    pub data: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl ChartSeries {
    /// Value at `index`, or zero when the series is shorter than the
    /// category list.
    pub fn value_at(&self, index: usize) -> f64 {
        self.data
            .get(index)
            .copied()
            .filter(|value| value.is_finite())
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPayload {
    #[serde(rename = "type")]
    pub kind: ChartKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub series: Vec<ChartSeries>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TablePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_cells")]
    pub headers: Vec<String>,
    #[serde(default, deserialize_with = "lenient_rows")]
    pub rows: Vec<Vec<String>>,
}

impl TablePayload {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            title: None,
            headers,
            rows,
        }
    }
}

/// One successfully decoded embedded block.
#[derive(Debug, Clone, PartialEq)]
pub enum EmbeddedPayload {
    Chart(ChartPayload),
    Table(TablePayload),
}

impl EmbeddedPayload {
    /// Decode the JSON object found inside a fenced block.
    ///
    /// Returns `None` for invalid JSON, objects without a recognized `type`,
    /// and objects whose shape does not match their declared type.
    pub fn from_json(raw: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(raw).ok()?;
        let kind = value.get("type")?.as_str()?;
        match kind {
            TYPE_BAR | TYPE_RADAR => serde_json::from_value::<ChartPayload>(value)
                .ok()
                .map(EmbeddedPayload::Chart),
            TYPE_COMPARISON_DATA => serde_json::from_value::<TablePayload>(value)
                .ok()
                .map(EmbeddedPayload::Table),
            _ => None,
        }
    }
}

fn number_from_value(value: &Value) -> f64 {
    match value {
        Value::Number(number) => number.as_f64().unwrap_or(0.0),
        Value::String(text) => text.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn cell_from_value(value: Value) -> String {
    match value {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn lenient_numbers<'de, D>(deserializer: D) -> Result<Vec<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Vec::<Value>::deserialize(deserializer)?;
    Ok(values.iter().map(number_from_value).collect())
}

fn lenient_cells<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Vec::<Value>::deserialize(deserializer)?;
    Ok(values.into_iter().map(cell_from_value).collect())
}

fn lenient_rows<'de, D>(deserializer: D) -> Result<Vec<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let rows = Vec::<Vec<Value>>::deserialize(deserializer)?;
    Ok(rows
        .into_iter()
        .map(|row| row.into_iter().map(cell_from_value).collect())
        .collect())
}
