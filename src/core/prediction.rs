//! Tissue residue prediction after a course of treatment.
//!
//! Residues decay first-order from an initial tissue concentration
//! `dose × dose_conversion_factor × partition_factor × species_factor`.

use crate::core::deriver::DERIVED_MATRIX;
use crate::domain::model::{serialize_number, RiskCategory};
use crate::utils::error::{MrlError, Result};
use crate::utils::validation::{validate_non_negative, validate_range};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_HALF_LIFE_DAYS: f64 = 7.0;

#[derive(Debug, Clone, PartialEq)]
pub struct DoseRequest {
    pub species: String,
    pub category: String,
    pub medicine: String,
    pub dose_mg_per_kg: f64,
    pub frequency_per_day: u32,
    pub matrix: String,
    pub end_date: NaiveDate,
    pub current_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TissuePrediction {
    pub tissue: String,
    pub predicted_mrl: f64,
    #[serde(serialize_with = "serialize_number")]
    pub base_mrl: f64,
    /// `None` when the tissue has no usable base MRL.
    pub risk_percent: Option<f64>,
    pub risk_category: RiskCategory,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResiduePrediction {
    pub tissues: Vec<TissuePrediction>,
    pub worst_tissue: String,
    pub overall_risk_category: RiskCategory,
    pub predicted_mrl: f64,
    pub predicted_withdrawal_days: u64,
    pub safe_date: NaiveDate,
}

#[derive(Debug, Clone, Deserialize)]
struct TissueProfile {
    #[serde(default = "one")]
    partition_factor: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    base_mrl: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct PkParameters {
    half_life_days: Option<f64>,
    #[serde(default = "one")]
    dose_conversion_factor: f64,
    #[serde(default = "one")]
    species_factor: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RiskThresholds {
    safe: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SafeRange {
    max: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RecommendedDoses {
    safe: Option<SafeRange>,
}

#[derive(Debug, Clone, Deserialize)]
struct MedicineProfile {
    #[serde(default)]
    mrl_by_matrix: Map<String, Value>,
    #[serde(default)]
    pk_parameters: PkParameters,
    #[serde(default)]
    risk_thresholds: RiskThresholds,
    recommended_dose_mg_per_kg: Option<f64>,
    recommended_doses: Option<RecommendedDoses>,
}

fn one() -> f64 {
    1.0
}

impl Default for PkParameters {
    fn default() -> Self {
        Self {
            half_life_days: None,
            dose_conversion_factor: 1.0,
            species_factor: 1.0,
        }
    }
}

fn lenient_number<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<f64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    })
}

fn medicine_profile(
    document: &Value,
    species: &str,
    category: &str,
    medicine: &str,
) -> Result<Option<MedicineProfile>> {
    let Some(raw) = document
        .get(species)
        .and_then(|s| s.get(category))
        .and_then(|c| c.get(medicine))
    else {
        return Ok(None);
    };

    let profile = serde_json::from_value(raw.clone()).map_err(|e| {
        MrlError::malformed(format!("{}/{}/{}: {}", species, category, medicine, e))
    })?;
    Ok(Some(profile))
}

impl PkParameters {
    fn elimination_rate(&self) -> f64 {
        let half_life = match self.half_life_days {
            Some(days) if days > 0.0 && days.is_finite() => days,
            _ => DEFAULT_HALF_LIFE_DAYS,
        };
        std::f64::consts::LN_2 / half_life
    }

    fn initial_concentration(&self, dose: f64, partition_factor: f64) -> f64 {
        dose * self.dose_conversion_factor * partition_factor * self.species_factor
    }
}

fn risk_rank(prediction: &TissuePrediction) -> f64 {
    match prediction.risk_percent {
        Some(percent) => percent,
        None if prediction.predicted_mrl > 0.0 => f64::INFINITY,
        None => 0.0,
    }
}

/// Predicts per-tissue residues for a dosing course.
///
/// Returns `Ok(None)` when the medicine is not in the reference or the matrix
/// is not `meat`.
pub fn predict_tissue_residue(
    document: &Value,
    request: &DoseRequest,
) -> Result<Option<ResiduePrediction>> {
    validate_non_negative("dose", request.dose_mg_per_kg)?;

    if request.matrix != DERIVED_MATRIX {
        return Ok(None);
    }
    let Some(profile) =
        medicine_profile(document, &request.species, &request.category, &request.medicine)?
    else {
        return Ok(None);
    };

    let tissues = profile
        .mrl_by_matrix
        .get(DERIVED_MATRIX)
        .and_then(|meat| meat.get("tissues"))
        .and_then(Value::as_object)
        .filter(|tissues| !tissues.is_empty())
        .ok_or_else(|| {
            MrlError::malformed(format!(
                "{}/{}/{} has no meat tissue data",
                request.species, request.category, request.medicine
            ))
        })?;

    let pk = &profile.pk_parameters;
    let k = pk.elimination_rate();
    let days_since_end = (request.current_date - request.end_date).num_days().max(0) as f64;

    let mut predictions = Vec::with_capacity(tissues.len());
    let mut initial = Vec::with_capacity(tissues.len());

    for (name, raw) in tissues {
        let tissue: TissueProfile = serde_json::from_value(raw.clone())
            .map_err(|e| MrlError::malformed(format!("tissue '{}': {}", name, e)))?;

        let c0 = pk.initial_concentration(request.dose_mg_per_kg, tissue.partition_factor);
        let predicted = c0 * (-k * days_since_end).exp();

        let risk_percent = (tissue.base_mrl > 0.0).then(|| predicted / tissue.base_mrl * 100.0);
        let risk_category = match risk_percent {
            Some(p) if p > 100.0 => RiskCategory::Unsafe,
            Some(p) if profile.risk_thresholds.safe.is_some_and(|safe| p > safe) => {
                RiskCategory::Borderline
            }
            Some(_) => RiskCategory::Safe,
            None if predicted > 0.0 => RiskCategory::Unsafe,
            None => RiskCategory::Safe,
        };

        initial.push((c0, tissue.base_mrl));
        predictions.push(TissuePrediction {
            tissue: name.clone(),
            predicted_mrl: predicted,
            base_mrl: tissue.base_mrl,
            risk_percent,
            risk_category,
        });
    }

    // 第一個組織為預設值，風險相同時不替換
    let mut worst = 0;
    for (index, prediction) in predictions.iter().enumerate().skip(1) {
        if risk_rank(prediction) > risk_rank(&predictions[worst]) {
            worst = index;
        }
    }

    let (c0_worst, base_worst) = initial[worst];
    let withdrawal_days = if c0_worst > 0.0 && base_worst > 0.0 && c0_worst > base_worst {
        ((c0_worst.ln() - base_worst.ln()) / k).ceil().max(0.0) as u64
    } else {
        0
    };

    let safe_on = safe_date(request.end_date, withdrawal_days).ok_or_else(|| {
        MrlError::ProcessingError {
            message: format!("withdrawal of {} days overflows the calendar", withdrawal_days),
        }
    })?;

    let worst_prediction = &predictions[worst];
    tracing::debug!(
        "Worst tissue {} at {:?}% of MRL, withdrawal {} days",
        worst_prediction.tissue,
        worst_prediction.risk_percent,
        withdrawal_days
    );

    Ok(Some(ResiduePrediction {
        worst_tissue: worst_prediction.tissue.clone(),
        overall_risk_category: worst_prediction.risk_category,
        predicted_mrl: worst_prediction.predicted_mrl,
        predicted_withdrawal_days: withdrawal_days,
        safe_date: safe_on,
        tissues: predictions,
    }))
}

/// True when the daily dose exceeds the recommended dose; false when it cannot be determined.
pub fn check_overdosage(
    document: &Value,
    species: &str,
    category: &str,
    medicine: &str,
    dose_mg_per_kg: f64,
    frequency_per_day: u32,
) -> Result<bool> {
    validate_range("frequency_per_day", frequency_per_day, 1, 24)?;

    let Some(profile) = medicine_profile(document, species, category, medicine)? else {
        return Ok(false);
    };

    // 0 means "not set" in the reference data
    let explicit = profile
        .recommended_dose_mg_per_kg
        .filter(|dose| dose.is_finite() && *dose != 0.0);
    let recommended = explicit.or_else(|| {
        profile
            .recommended_doses
            .as_ref()
            .and_then(|doses| doses.safe.as_ref())
            .and_then(|safe| safe.max)
    });

    match recommended {
        Some(recommended) => Ok(dose_mg_per_kg * f64::from(frequency_per_day) > recommended),
        None => {
            tracing::debug!("No recommended dose for {}/{}/{}", species, category, medicine);
            Ok(false)
        }
    }
}

pub fn safe_date(start: NaiveDate, withdrawal_days: u64) -> Option<NaiveDate> {
    start.checked_add_days(Days::new(withdrawal_days))
}
