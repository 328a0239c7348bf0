use crate::utils::error::{MrlError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Tissue kinds tracked under the `meat` matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TissueKind {
    Muscle,
    Fat,
    Liver,
    Kidney,
}

impl TissueKind {
    pub const ALL: [TissueKind; 4] = [
        TissueKind::Muscle,
        TissueKind::Fat,
        TissueKind::Liver,
        TissueKind::Kidney,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TissueKind::Muscle => "muscle",
            TissueKind::Fat => "fat",
            TissueKind::Liver => "liver",
            TissueKind::Kidney => "kidney",
        }
    }
}

impl fmt::Display for TissueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TissueKind {
    type Err = MrlError;

    fn from_str(s: &str) -> Result<Self> {
        TissueKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| MrlError::ValidationError {
                message: format!(
                    "Unknown tissue '{}'. Expected one of: muscle, fat, liver, kidney",
                    s
                ),
            })
    }
}

/// Threshold band for a residue level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskCategory {
    Safe,
    Borderline,
    Unsafe,
}

impl fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RiskCategory::Safe => "safe",
            RiskCategory::Borderline => "borderline",
            RiskCategory::Unsafe => "unsafe",
        };
        f.write_str(label)
    }
}

/// Writes whole numbers as JSON integers so `100 * 0.8` comes out as `80`.
pub(crate) fn serialize_number<S: Serializer>(
    value: &f64,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 9.0e15 {
        serializer.serialize_i64(*value as i64)
    } else {
        serializer.serialize_f64(*value)
    }
}

/// Numeric reading of a loosely typed reference field.
///
/// Numeric strings parse, blank strings, `null` and `false` read as 0, `true`
/// as 1. Anything else is NaN.
pub(crate) fn coerce_number(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) if s.trim().is_empty() => 0.0,
        Value::String(s) => s.trim().parse().unwrap_or(f64::NAN),
        Value::Bool(true) => 1.0,
        Value::Bool(false) | Value::Null => 0.0,
        Value::Array(_) | Value::Object(_) => f64::NAN,
    }
}

pub(crate) fn unit_text(value: &Value) -> String {
    match value {
        Value::String(unit) => unit.clone(),
        other => other.to_string(),
    }
}

fn lenient_number<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<f64, D::Error> {
    Value::deserialize(deserializer).map(|value| coerce_number(&value))
}

fn lenient_unit<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    Value::deserialize(deserializer).map(|value| unit_text(&value))
}

/// Numeric view of one derived tissue entry.
///
/// The emitted entry carries the matrix values verbatim, so reading it back
/// goes through [`coerce_number`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TissueEntry {
    #[serde(serialize_with = "serialize_number", deserialize_with = "lenient_number")]
    pub base_mrl: f64,
    #[serde(serialize_with = "serialize_number", deserialize_with = "lenient_number")]
    pub base_withdrawal_days: f64,
    #[serde(deserialize_with = "lenient_unit")]
    pub mrl_unit: String,
    #[serde(serialize_with = "serialize_number", deserialize_with = "lenient_number")]
    pub safe_threshold: f64,
    #[serde(serialize_with = "serialize_number", deserialize_with = "lenient_number")]
    pub borderline_threshold: f64,
    #[serde(serialize_with = "serialize_number", deserialize_with = "lenient_number")]
    pub unsafe_threshold: f64,
}

/// The `tissues` block attached to a matrix entry. Field order is the emitted key order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TissueSet {
    pub muscle: TissueEntry,
    pub fat: TissueEntry,
    pub liver: TissueEntry,
    pub kidney: TissueEntry,
}

impl TissueSet {
    pub fn get(&self, kind: TissueKind) -> &TissueEntry {
        match kind {
            TissueKind::Muscle => &self.muscle,
            TissueKind::Fat => &self.fat,
            TissueKind::Liver => &self.liver,
            TissueKind::Kidney => &self.kidney,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (TissueKind, &TissueEntry)> {
        TissueKind::ALL.into_iter().map(move |kind| (kind, self.get(kind)))
    }
}

/// Reference document: species → record, kept in insertion order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceDocument(Map<String, Value>);

impl ReferenceDocument {
    pub fn from_json_slice(data: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(data)
            .map_err(|e| MrlError::malformed(format!("invalid JSON: {}", e)))?;
        Self::try_from(value)
    }

    pub fn from_json_str(data: &str) -> Result<Self> {
        Self::from_json_slice(data.as_bytes())
    }

    pub fn species(&self) -> &Map<String, Value> {
        &self.0
    }

    pub(crate) fn species_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl TryFrom<Value> for ReferenceDocument {
    type Error = MrlError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Object(species) => Ok(Self(species)),
            other => Err(MrlError::malformed(format!(
                "expected a mapping of species at the top level, found {}",
                json_kind(&other)
            ))),
        }
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "a mapping",
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DerivationSummary {
    pub species: usize,
    pub medicines: usize,
    pub augmented: usize,
    pub passed_through: usize,
}

/// Output of the transform phase.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedDocument {
    pub document: ReferenceDocument,
    pub summary: DerivationSummary,
}
