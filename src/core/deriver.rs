//! Tissue-level MRL threshold derivation.
//!
//! Only the `meat` matrix is augmented, and all four tissues receive the same
//! thresholds computed from the matrix-level `base_mrl`. Real residue limits
//! usually differ per tissue; this is kept as-is pending product clarification.

use crate::domain::model::{
    coerce_number, serialize_number, unit_text, DerivationSummary, ReferenceDocument,
    TissueEntry, TissueKind,
};
use crate::utils::error::Result;
use serde_json::{Map, Value};

pub const DERIVED_MATRIX: &str = "meat";
pub const TISSUES_KEY: &str = "tissues";
pub const DEFAULT_MRL_UNIT: &str = "ug/kg";

pub const SAFE_FACTOR: f64 = 0.8;
pub const BORDERLINE_FACTOR: f64 = 1.0;
pub const UNSAFE_FACTOR: f64 = 1.2;

/// Derives the `tissues` block for every `meat` matrix entry.
///
/// Fails with `MalformedInput` when `document` is not a mapping.
pub fn derive(document: Value) -> Result<Value> {
    let mut document = ReferenceDocument::try_from(document)?;
    document.derive();
    Ok(document.into_value())
}

impl ReferenceDocument {
    /// Attaches `tissues` in place and reports what was visited.
    pub fn derive(&mut self) -> DerivationSummary {
        let mut summary = DerivationSummary::default();

        for (species, record) in self.species_mut().iter_mut() {
            summary.species += 1;

            let Some(medicines) = record.get_mut("medicines").and_then(Value::as_object_mut)
            else {
                tracing::debug!("Species '{}' has no medicines mapping, skipping", species);
                continue;
            };

            for (medicine, entry) in medicines.iter_mut() {
                summary.medicines += 1;

                let Some(meat) = entry
                    .get_mut("matrix")
                    .and_then(|matrix| matrix.get_mut(DERIVED_MATRIX))
                    .and_then(Value::as_object_mut)
                else {
                    summary.passed_through += 1;
                    continue;
                };

                let tissue = tissue_value(meat);
                let base_mrl = coerce_number(&tissue["base_mrl"]);
                if base_mrl.is_nan() || base_mrl < 0.0 {
                    tracing::warn!(
                        "{}/{}: base_mrl {} is not a non-negative number, thresholds follow it as-is",
                        species,
                        medicine,
                        tissue["base_mrl"]
                    );
                } else {
                    tracing::trace!("{}/{}: base_mrl {}", species, medicine, base_mrl);
                }

                let tissues: Map<String, Value> = TissueKind::ALL
                    .into_iter()
                    .map(|kind| (kind.as_str().to_string(), tissue.clone()))
                    .collect();
                meat.insert(TISSUES_KEY.to_string(), Value::Object(tissues));
                summary.augmented += 1;
            }
        }

        summary
    }
}

impl TissueEntry {
    /// Numeric view of the entry [`ReferenceDocument::derive`] would attach for `entry`.
    pub fn from_matrix_entry(entry: &Map<String, Value>) -> Self {
        let base_mrl = coerce_number(&field_or(entry, "base_mrl", Value::from(0)));
        Self {
            base_mrl,
            base_withdrawal_days: coerce_number(&field_or(
                entry,
                "base_withdrawal_days",
                Value::from(0),
            )),
            mrl_unit: unit_text(&field_or(entry, "mrl_unit", Value::from(DEFAULT_MRL_UNIT))),
            safe_threshold: base_mrl * SAFE_FACTOR,
            borderline_threshold: base_mrl * BORDERLINE_FACTOR,
            unsafe_threshold: base_mrl * UNSAFE_FACTOR,
        }
    }
}

/// The entry shared by all four tissues. Matrix values are copied verbatim.
fn tissue_value(entry: &Map<String, Value>) -> Value {
    let base_mrl = field_or(entry, "base_mrl", Value::from(0));
    let base = coerce_number(&base_mrl);

    let mut tissue = Map::new();
    tissue.insert("base_mrl".to_string(), base_mrl);
    tissue.insert(
        "base_withdrawal_days".to_string(),
        field_or(entry, "base_withdrawal_days", Value::from(0)),
    );
    tissue.insert(
        "mrl_unit".to_string(),
        field_or(entry, "mrl_unit", Value::from(DEFAULT_MRL_UNIT)),
    );
    tissue.insert("safe_threshold".to_string(), threshold(base, SAFE_FACTOR));
    tissue.insert("borderline_threshold".to_string(), threshold(base, BORDERLINE_FACTOR));
    tissue.insert("unsafe_threshold".to_string(), threshold(base, UNSAFE_FACTOR));
    Value::Object(tissue)
}

/// Absent or falsy (`null`, `false`, `0`, `""`) fields take `default`.
fn field_or(entry: &Map<String, Value>, key: &str, default: Value) -> Value {
    match entry.get(key) {
        Some(value) if !is_falsy(value) => value.clone(),
        _ => default,
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

// NaN products come out as null
fn threshold(base: f64, factor: f64) -> Value {
    serialize_number(&(base * factor), serde_json::value::Serializer).unwrap_or(Value::Null)
}
