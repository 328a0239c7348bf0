use crate::core::deriver::{DERIVED_MATRIX, TISSUES_KEY};
use crate::core::{ConfigProvider, DerivedDocument, Pipeline, ReferenceDocument, Storage};
use crate::domain::model::{serialize_number, TissueSet};
use crate::utils::error::{MrlError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// Reads a reference document, derives tissue thresholds and writes the result.
pub struct MrlPipeline<S: Storage, C: ConfigProvider> {
    storage: S,
    config: C,
}

#[derive(Debug, Serialize)]
struct ThresholdRow<'a> {
    species: &'a str,
    medicine: &'a str,
    tissue: &'static str,
    #[serde(serialize_with = "serialize_number")]
    base_mrl: f64,
    #[serde(serialize_with = "serialize_number")]
    base_withdrawal_days: f64,
    mrl_unit: &'a str,
    #[serde(serialize_with = "serialize_number")]
    safe_threshold: f64,
    #[serde(serialize_with = "serialize_number")]
    borderline_threshold: f64,
    #[serde(serialize_with = "serialize_number")]
    unsafe_threshold: f64,
}

impl<S: Storage, C: ConfigProvider> MrlPipeline<S, C> {
    pub fn new(storage: S, config: C) -> Self {
        Self { storage, config }
    }

    pub fn config(&self) -> &C {
        &self.config
    }

    fn csv_path(&self) -> String {
        csv_output_path(self.config.output_path())
    }

    async fn write_output(&self, path: &str, data: &[u8]) -> Result<()> {
        self.storage
            .write_file(path, data)
            .await
            .map_err(|e| match e {
                MrlError::IoError(source) => MrlError::WriteError {
                    path: path.to_string(),
                    source,
                },
                other => other,
            })
    }
}

/// Where the threshold table lands for a given JSON output path.
pub fn csv_output_path(output_path: &str) -> String {
    Path::new(output_path)
        .with_extension("csv")
        .to_string_lossy()
        .into_owned()
}

/// One row per (species, medicine, tissue) of every derived `tissues` block.
pub fn threshold_table(document: &ReferenceDocument) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    for (species, record) in document.species() {
        let Some(medicines) = record.get("medicines").and_then(Value::as_object) else {
            continue;
        };
        for (medicine, entry) in medicines {
            let Some(tissues) = entry
                .get("matrix")
                .and_then(|matrix| matrix.get(DERIVED_MATRIX))
                .and_then(|meat| meat.get(TISSUES_KEY))
            else {
                continue;
            };
            let tissues = TissueSet::deserialize(tissues).map_err(|e| {
                MrlError::ProcessingError {
                    message: format!("{}/{}: unreadable tissues block: {}", species, medicine, e),
                }
            })?;

            for (kind, tissue) in tissues.iter() {
                writer.serialize(ThresholdRow {
                    species,
                    medicine,
                    tissue: kind.as_str(),
                    base_mrl: tissue.base_mrl,
                    base_withdrawal_days: tissue.base_withdrawal_days,
                    mrl_unit: &tissue.mrl_unit,
                    safe_threshold: tissue.safe_threshold,
                    borderline_threshold: tissue.borderline_threshold,
                    unsafe_threshold: tissue.unsafe_threshold,
                })?;
            }
        }
    }

    writer.into_inner().map_err(|e| MrlError::ProcessingError {
        message: format!("Failed to flush CSV table: {}", e),
    })
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for MrlPipeline<S, C> {
    async fn extract(&self) -> Result<ReferenceDocument> {
        let input_path = self.config.input_path();
        tracing::debug!("Reading reference document from: {}", input_path);

        let raw = self.storage.read_file(input_path).await?;
        tracing::debug!("Read {} bytes", raw.len());

        ReferenceDocument::from_json_slice(&raw)
    }

    async fn transform(&self, mut document: ReferenceDocument) -> Result<DerivedDocument> {
        let summary = document.derive();
        tracing::debug!(
            "Derived tissues for {} of {} medicines across {} species",
            summary.augmented,
            summary.medicines,
            summary.species
        );
        Ok(DerivedDocument { document, summary })
    }

    async fn load(&self, result: &DerivedDocument) -> Result<Vec<String>> {
        let mut written = Vec::new();

        if self.config.wants_format("json") {
            let output_path = self.config.output_path();
            let json = if self.config.pretty() {
                serde_json::to_vec_pretty(&result.document)?
            } else {
                serde_json::to_vec(&result.document)?
            };

            tracing::debug!("Writing JSON document ({} bytes) to {}", json.len(), output_path);
            self.write_output(output_path, &json).await?;
            written.push(output_path.to_string());
        }

        if self.config.wants_format("csv") {
            let csv_path = self.csv_path();
            let table = threshold_table(&result.document)?;

            tracing::debug!("Writing threshold table ({} bytes) to {}", table.len(), csv_path);
            self.write_output(&csv_path, &table).await?;
            written.push(csv_path);
        }

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Clone)]
    struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
        read_only: bool,
    }

    impl MockStorage {
        fn new() -> Self {
            Self {
                files: Arc::new(Mutex::new(HashMap::new())),
                read_only: false,
            }
        }

        async fn put_file(&self, path: &str, data: &str) {
            let mut files = self.files.lock().await;
            files.insert(path.to_string(), data.as_bytes().to_vec());
        }

        async fn get_file(&self, path: &str) -> Option<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned()
        }
    }

    impl Storage for MockStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned().ok_or_else(|| {
                MrlError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", path),
                ))
            })
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            if self.read_only {
                return Err(MrlError::IoError(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "read-only storage",
                )));
            }
            let mut files = self.files.lock().await;
            files.insert(path.to_string(), data.to_vec());
            Ok(())
        }
    }

    struct MockConfig {
        formats: Vec<String>,
        pretty: bool,
    }

    impl MockConfig {
        fn new(formats: &[&str]) -> Self {
            Self {
                formats: formats.iter().map(|f| f.to_string()).collect(),
                pretty: true,
            }
        }
    }

    impl ConfigProvider for MockConfig {
        fn input_path(&self) -> &str {
            "reference.json"
        }

        fn output_path(&self) -> &str {
            "out/updated.json"
        }

        fn output_formats(&self) -> &[String] {
            &self.formats
        }

        fn pretty(&self) -> bool {
            self.pretty
        }
    }

    const REFERENCE: &str = r#"{
        "cow": {"medicines": {
            "Amoxicillin": {"matrix": {"meat": {"base_mrl": 50, "base_withdrawal_days": 28}}},
            "Oxytocin": {"matrix": {"milk": {"base_mrl": 0}}}
        }}
    }"#;

    #[tokio::test]
    async fn test_extract_rejects_non_mapping() {
        let storage = MockStorage::new();
        storage.put_file("reference.json", "[1, 2]").await;
        let pipeline = MrlPipeline::new(storage, MockConfig::new(&["json"]));

        let err = pipeline.extract().await.unwrap_err();
        assert!(matches!(err, MrlError::MalformedInput { .. }));
    }

    #[tokio::test]
    async fn test_extract_missing_input() {
        let pipeline = MrlPipeline::new(MockStorage::new(), MockConfig::new(&["json"]));
        let err = pipeline.extract().await.unwrap_err();
        assert!(matches!(err, MrlError::IoError(_)));
    }

    #[tokio::test]
    async fn test_pipeline_writes_json_and_csv() {
        let storage = MockStorage::new();
        storage.put_file("reference.json", REFERENCE).await;
        let pipeline = MrlPipeline::new(storage.clone(), MockConfig::new(&["json", "csv"]));

        let document = pipeline.extract().await.unwrap();
        let derived = pipeline.transform(document).await.unwrap();
        assert_eq!(derived.summary.augmented, 1);

        let written = pipeline.load(&derived).await.unwrap();
        assert_eq!(written, vec!["out/updated.json", "out/updated.csv"]);

        let json: Value =
            serde_json::from_slice(&storage.get_file("out/updated.json").await.unwrap()).unwrap();
        assert_eq!(
            json["cow"]["medicines"]["Amoxicillin"]["matrix"]["meat"]["tissues"]["fat"]
                ["unsafe_threshold"],
            serde_json::json!(60)
        );

        let csv = String::from_utf8(storage.get_file("out/updated.csv").await.unwrap()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "species,medicine,tissue,base_mrl,base_withdrawal_days,mrl_unit,safe_threshold,borderline_threshold,unsafe_threshold"
        );
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[1], "cow,Amoxicillin,muscle,50,28,ug/kg,40,50,60");
    }

    #[tokio::test]
    async fn test_compact_output() {
        let storage = MockStorage::new();
        storage.put_file("reference.json", REFERENCE).await;
        let mut config = MockConfig::new(&["json"]);
        config.pretty = false;
        let pipeline = MrlPipeline::new(storage.clone(), config);

        let derived = pipeline
            .transform(pipeline.extract().await.unwrap())
            .await
            .unwrap();
        pipeline.load(&derived).await.unwrap();

        let written = storage.get_file("out/updated.json").await.unwrap();
        assert!(!written.contains(&b'\n'));
        assert!(storage.get_file("out/updated.csv").await.is_none());
    }

    #[tokio::test]
    async fn test_write_failure_keeps_document() {
        let mut storage = MockStorage::new();
        storage.put_file("reference.json", REFERENCE).await;
        storage.read_only = true;
        let pipeline = MrlPipeline::new(storage, MockConfig::new(&["json"]));

        let derived = pipeline
            .transform(pipeline.extract().await.unwrap())
            .await
            .unwrap();
        let err = pipeline.load(&derived).await.unwrap_err();

        assert!(matches!(err, MrlError::WriteError { ref path, .. } if path == "out/updated.json"));
        assert_eq!(derived.summary.augmented, 1);
    }
}
