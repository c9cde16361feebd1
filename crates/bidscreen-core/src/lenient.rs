//! Permissive field decoders for model-produced JSON.
//!
//! A language model asked for a fixed JSON shape still returns numbers where
//! strings were requested, `null` for empty lists, or a bare string where a
//! list was expected. Each decoder here maps the wrong shape to the field's
//! empty value instead of rejecting the whole report.

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::warn;

/// Upper bound for every 0..100 score in a report.
pub const MAX_SCORE: u32 = 100;

/// Any serde type; falls back to `T::default()` if the value has the wrong shape.
pub fn value<'de, D, T>(de: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let raw = Value::deserialize(de)?;
    Ok(serde_json::from_value(raw).unwrap_or_default())
}

/// Scalar text. Numbers and booleans are rendered; anything else is empty.
pub fn text<'de, D>(de: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(text_of(&Value::deserialize(de)?))
}

/// List of free-text strings. A bare string becomes a one-element list.
pub fn strings<'de, D>(de: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(strings_of(&Value::deserialize(de)?))
}

/// List of records. Elements that do not decode as `T` are skipped.
pub fn records<'de, D, T>(de: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = Value::deserialize(de)?;
    let Value::Array(items) = raw else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value(item) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(index, error = %err, "skipping malformed list element");
                None
            }
        })
        .collect())
}

/// Open-ended category map: `{ "name": ["item", ...] }`, in document order.
pub fn categories<'de, D>(de: D) -> Result<IndexMap<String, Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(de)?;
    let Value::Object(map) = raw else {
        return Ok(IndexMap::new());
    };
    Ok(map
        .iter()
        .map(|(key, items)| (key.clone(), strings_of(items)))
        .collect())
}

/// A JSON object with each `(alias, canonical)` key folded onto its
/// canonical name. The canonical key wins unless it is absent or `null`.
/// Anything but an object is an error.
pub(crate) fn canonical_object<'de, D>(de: D, aliases: &[(&str, &str)]) -> Result<Value, D::Error>
where
    D: Deserializer<'de>,
{
    let Value::Object(mut map) = Value::deserialize(de)? else {
        return Err(serde::de::Error::custom("expected a JSON object"));
    };
    for &(alias, canonical) in aliases {
        let Some(value) = map.remove(alias) else {
            continue;
        };
        if map.get(canonical).is_none_or(Value::is_null) {
            map.insert(canonical.to_string(), value);
        }
    }
    Ok(Value::Object(map))
}

/// Integer score clamped to `0..=MAX_SCORE`. Floats round, numeric strings parse.
pub fn score<'de, D>(de: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let n = number_of(&Value::deserialize(de)?).unwrap_or(0.0);
    Ok(n.round().clamp(0.0, MAX_SCORE as f64) as u32)
}

/// Non-negative counter (token counts, page counts).
pub fn count<'de, D>(de: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let n = number_of(&Value::deserialize(de)?).unwrap_or(0.0);
    Ok(if n.is_finite() && n > 0.0 { n.round() as u64 } else { 0 })
}

/// Like [`count`], as `usize`.
pub fn size<'de, D>(de: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    count(de).map(|n| usize::try_from(n).unwrap_or(usize::MAX))
}

/// Monetary amount; non-finite or negative values decode as zero.
pub fn amount<'de, D>(de: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let n = number_of(&Value::deserialize(de)?).unwrap_or(0.0);
    Ok(if n.is_finite() && n > 0.0 { n } else { 0.0 })
}

/// Boolean flag; accepts `"true"`/`"false"` strings.
pub fn flag<'de, D>(de: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(de)? {
        Value::Bool(b) => b,
        Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    })
}

pub(crate) fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

fn strings_of(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter(|item| !matches!(item, Value::Null | Value::Array(_) | Value::Object(_)))
            .map(text_of)
            .collect(),
        Value::String(s) if !s.trim().is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}

fn number_of(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    n.filter(|n| n.is_finite())
}
