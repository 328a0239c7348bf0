use crate::core::deriver::{DERIVED_MATRIX, TISSUES_KEY};
use crate::domain::model::{
    serialize_number, ReferenceDocument, RiskCategory, TissueEntry, TissueKind, TissueSet,
};
use crate::utils::error::Result;
use crate::utils::validation::validate_non_negative;
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComplianceReport {
    pub compliant: Option<bool>,
    pub message: String,
    pub mrl_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(serialize_with = "serialize_number")]
    pub measured: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_category: Option<RiskCategory>,
}

impl TissueEntry {
    pub fn classify(&self, measured: f64) -> RiskCategory {
        if measured <= self.safe_threshold {
            RiskCategory::Safe
        } else if measured <= self.borderline_threshold {
            RiskCategory::Borderline
        } else {
            RiskCategory::Unsafe
        }
    }
}

impl ReferenceDocument {
    /// Species and medicine names match case-insensitively.
    pub fn tissue_entry(
        &self,
        species: &str,
        medicine: &str,
        tissue: TissueKind,
    ) -> Option<TissueEntry> {
        let record = find_ignore_case(self.species(), species)?;
        let medicines = record.get("medicines")?.as_object()?;
        let meat = find_ignore_case(medicines, medicine)?
            .get("matrix")?
            .get(DERIVED_MATRIX)?
            .as_object()?;

        // 已衍生的文件直接取用 tissues
        if let Some(existing) = meat.get(TISSUES_KEY) {
            match serde_json::from_value::<TissueSet>(existing.clone()) {
                Ok(tissues) => return Some(tissues.get(tissue).clone()),
                Err(e) => tracing::debug!("Ignoring unreadable tissues block: {}", e),
            }
        }

        Some(TissueEntry::from_matrix_entry(meat))
    }
}

fn find_ignore_case<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    map.get(key).or_else(|| {
        map.iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, value)| value)
    })
}

pub fn check_compliance(
    document: &ReferenceDocument,
    species: &str,
    medicine: &str,
    tissue: TissueKind,
    measured: f64,
) -> Result<ComplianceReport> {
    validate_non_negative("measured level", measured)?;

    let Some(entry) = document.tissue_entry(species, medicine, tissue) else {
        tracing::info!("No MRL data for {}/{}/{}", species, medicine, tissue);
        return Ok(ComplianceReport {
            compliant: None,
            message: "No MRL data available for this combination".to_string(),
            mrl_value: None,
            unit: None,
            measured,
            risk_category: None,
        });
    };

    let compliant = measured <= entry.base_mrl;
    let message = if compliant {
        "Within safe MRL limits"
    } else {
        "EXCEEDS MRL - Product may not be safe for consumption"
    };

    Ok(ComplianceReport {
        compliant: Some(compliant),
        message: message.to_string(),
        mrl_value: Some(entry.base_mrl),
        unit: Some(entry.mrl_unit.clone()),
        measured,
        risk_category: Some(entry.classify(measured)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::MrlError;
    use serde_json::json;

    fn document() -> ReferenceDocument {
        ReferenceDocument::try_from(json!({
            "cow": {"medicines": {
                "Amoxicillin": {"matrix": {"meat": {"base_mrl": 50, "mrl_unit": "ug/kg"}}},
                "Oxytetracycline": {"matrix": {"milk": {"base_mrl": 100}}}
            }}
        }))
        .unwrap()
    }

    #[test]
    fn test_classify_bands() {
        let mut entry = Map::new();
        entry.insert("base_mrl".to_string(), json!(100));
        let tissue = TissueEntry::from_matrix_entry(&entry);

        assert_eq!(tissue.classify(0.0), RiskCategory::Safe);
        assert_eq!(tissue.classify(80.0), RiskCategory::Safe);
        assert_eq!(tissue.classify(80.5), RiskCategory::Borderline);
        assert_eq!(tissue.classify(100.0), RiskCategory::Borderline);
        assert_eq!(tissue.classify(100.1), RiskCategory::Unsafe);
        assert_eq!(tissue.classify(500.0), RiskCategory::Unsafe);
    }

    #[test]
    fn test_lookup_is_case_insensitive_and_works_before_derivation() {
        let doc = document();
        let entry = doc.tissue_entry("COW", "amoxicillin", TissueKind::Kidney).unwrap();
        assert_eq!(entry.base_mrl, 50.0);
        assert_eq!(entry.unsafe_threshold, 60.0);
    }

    #[test]
    fn test_lookup_prefers_existing_tissues_block() {
        let mut doc = document();
        doc.derive();
        let entry = doc.tissue_entry("cow", "Amoxicillin", TissueKind::Fat).unwrap();
        assert_eq!(entry.safe_threshold, 40.0);
    }

    #[test]
    fn test_check_compliance() {
        let doc = document();

        let within = check_compliance(&doc, "cow", "Amoxicillin", TissueKind::Muscle, 45.0).unwrap();
        assert_eq!(within.compliant, Some(true));
        assert_eq!(within.risk_category, Some(RiskCategory::Borderline));
        assert_eq!(within.unit.as_deref(), Some("ug/kg"));

        let over = check_compliance(&doc, "cow", "Amoxicillin", TissueKind::Liver, 75.0).unwrap();
        assert_eq!(over.compliant, Some(false));
        assert_eq!(over.risk_category, Some(RiskCategory::Unsafe));
        assert!(over.message.starts_with("EXCEEDS MRL"));
    }

    #[test]
    fn test_check_compliance_without_data() {
        let doc = document();
        let report =
            check_compliance(&doc, "cow", "Oxytetracycline", TissueKind::Muscle, 1.0).unwrap();
        assert_eq!(report.compliant, None);
        assert_eq!(report.mrl_value, None);
        assert_eq!(report.message, "No MRL data available for this combination");

        let report = check_compliance(&doc, "goat", "Amoxicillin", TissueKind::Muscle, 1.0).unwrap();
        assert_eq!(report.compliant, None);
    }

    #[test]
    fn test_negative_measurement_is_rejected() {
        let err = check_compliance(&document(), "cow", "Amoxicillin", TissueKind::Muscle, -1.0)
            .unwrap_err();
        assert!(matches!(err, MrlError::ValidationError { .. }));
    }
}
