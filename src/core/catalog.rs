//! Read-only listings over the dosage reference data.

use crate::domain::model::json_kind;
use crate::utils::error::{MrlError, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt::Write as _;

pub const DEFAULT_SPECIES: [&str; 5] = ["cow", "goat", "sheep", "pig", "chicken"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteEntry {
    pub medicine: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryListing {
    pub key: String,
    pub label: String,
    pub medicines: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeciesCatalog {
    pub species: String,
    pub categories: Vec<CategoryListing>,
}

fn as_mapping<'a>(value: &'a Value, what: &str) -> Result<&'a Map<String, Value>> {
    value.as_object().ok_or_else(|| {
        MrlError::malformed(format!("expected {} to be a mapping, found {}", what, json_kind(value)))
    })
}

fn entries(value: Option<&Value>) -> impl Iterator<Item = (&String, &Value)> {
    value
        .and_then(Value::as_object)
        .into_iter()
        .flat_map(|map| map.iter())
}

/// Groups medicines by category and species together with their recommended route.
///
/// Input shape: `{categories: {cat: {medicines: {med: {species: {sp: {recommended_route}}}}}}}`.
pub fn extract_routes(document: &Value) -> Result<Map<String, Value>> {
    let root = as_mapping(document, "the dosage reference")?;
    let mut result = Map::new();

    if !root.contains_key("categories") {
        tracing::warn!("Dosage reference has no 'categories' section");
    }

    for (category, record) in entries(root.get("categories")) {
        let mut by_species: Map<String, Value> = Map::new();

        for (medicine, profile) in entries(record.get("medicines")) {
            for (species, dosing) in entries(profile.get("species")) {
                let entry = RouteEntry {
                    medicine: medicine.clone(),
                    route: dosing
                        .get("recommended_route")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                };
                let listed = by_species
                    .entry(species.clone())
                    .or_insert_with(|| Value::Array(Vec::new()));
                if let Value::Array(items) = listed {
                    items.push(serde_json::to_value(&entry)?);
                }
            }
        }

        result.insert(category.clone(), Value::Object(by_species));
    }

    Ok(result)
}

pub fn category_label(key: &str) -> String {
    let label = match key {
        "anti-inflammatory" => "Anti-inflammatory",
        "antibiotic" => "Antibiotic",
        "anticoccidial" => "Anticoccidial",
        "antiparasitic" => "Antiparasitic",
        "hormonal" => "Hormonal",
        "nsaid" => "NSAID",
        "vaccine" => "Vaccine",
        "vitamin" => "Vitamin",
        other => other,
    };
    label.to_string()
}

/// Lists medicine names per category for each requested species.
///
/// Input shape: `{species: {category: {medicine: …}}}`. Species missing from
/// the document are listed with no categories.
pub fn medicine_catalog<S: AsRef<str>>(
    document: &Value,
    species: &[S],
) -> Result<Vec<SpeciesCatalog>> {
    let root = as_mapping(document, "the dosage reference")?;

    let catalog = species
        .iter()
        .map(|name| {
            let name = name.as_ref();
            let categories = entries(root.get(name))
                .filter_map(|(key, medicines)| {
                    let medicines: Vec<String> =
                        entries(Some(medicines)).map(|(med, _)| med.clone()).collect();
                    (!medicines.is_empty()).then(|| CategoryListing {
                        key: key.clone(),
                        label: category_label(key),
                        medicines,
                    })
                })
                .collect();

            SpeciesCatalog {
                species: name.to_string(),
                categories,
            }
        })
        .collect();

    Ok(catalog)
}

pub fn render_catalog_markdown(catalog: &[SpeciesCatalog]) -> String {
    let mut out = String::from("=== MEDICINES AND CATEGORIES BY SPECIES ===\n\n");

    for species in catalog {
        let _ = writeln!(out, "## {}", species.species.to_uppercase());
        for category in &species.categories {
            let _ = writeln!(
                out,
                "### {} ({} medicines)",
                category.label,
                category.medicines.len()
            );
            for medicine in &category.medicines {
                let _ = writeln!(out, "- {}", medicine);
            }
            out.push('\n');
        }
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_routes_groups_by_category_and_species() {
        let doc = json!({
            "categories": {
                "antibiotic": {"medicines": {
                    "Amoxicillin": {"species": {
                        "cow": {"recommended_route": "IM"},
                        "goat": {"recommended_route": "oral"}
                    }},
                    "Tylosin": {"species": {"cow": {}}}
                }},
                "vitamin": {}
            }
        });

        let routes = extract_routes(&doc).unwrap();

        assert_eq!(
            Value::Object(routes),
            json!({
                "antibiotic": {
                    "cow": [
                        {"medicine": "Amoxicillin", "route": "IM"},
                        {"medicine": "Tylosin"}
                    ],
                    "goat": [{"medicine": "Amoxicillin", "route": "oral"}]
                },
                "vitamin": {}
            })
        );
    }

    #[test]
    fn test_extract_routes_without_categories() {
        assert!(extract_routes(&json!({"version": 2})).unwrap().is_empty());
        assert!(extract_routes(&json!([])).is_err());
    }

    #[test]
    fn test_medicine_catalog_and_markdown() {
        let doc = json!({
            "cow": {
                "antibiotic": {"Amoxicillin": {}, "Penicillin": {}},
                "nsaid": {"Meloxicam": {}},
                "vaccine": {}
            },
            "pig": {"growth-promoter": {"Ractopamine": {}}}
        });

        let catalog = medicine_catalog(&doc, &["cow", "goat", "pig"]).unwrap();

        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog[0].categories.len(), 2);
        assert_eq!(catalog[0].categories[1].label, "NSAID");
        assert!(catalog[1].categories.is_empty());
        assert_eq!(catalog[2].categories[0].label, "growth-promoter");

        let markdown = render_catalog_markdown(&catalog);
        let expected = "=== MEDICINES AND CATEGORIES BY SPECIES ===\n\n\
## COW\n\
### Antibiotic (2 medicines)\n\
- Amoxicillin\n\
- Penicillin\n\
\n\
### NSAID (1 medicines)\n\
- Meloxicam\n\
\n\
\n\
## GOAT\n\
\n\
## PIG\n\
### growth-promoter (1 medicines)\n\
- Ractopamine\n\
\n\
\n";
        assert_eq!(markdown, expected);
    }
}
