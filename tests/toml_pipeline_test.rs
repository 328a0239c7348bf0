use anyhow::Result;
use mrl_etl::core::Pipeline;
use mrl_etl::utils::validation::Validate;
use mrl_etl::{EtlEngine, LocalStorage, MrlPipeline, TomlConfig};
use tempfile::TempDir;

/// TOML 配置驅動的完整流程
#[tokio::test]
async fn test_toml_configured_run() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let temp_path = temp_dir.path().to_str().unwrap().replace('\\', "/");

    tokio::fs::write(
        format!("{}/reference.json", temp_path),
        r#"{"sheep": {"medicines": {"Albendazole": {"matrix": {"meat": {"base_mrl": 25.5, "mrl_unit": "mg/kg"}}}}}}"#,
    )
    .await?;

    let config_content = format!(
        r#"
[pipeline]
name = "toml-test"
description = "TOML driven derivation"
version = "1.0.0"

[source]
path = "{0}/reference.json"

[load]
output_path = "{0}/derived/updated.json"
output_formats = ["json"]
pretty = false
"#,
        temp_path
    );

    let config_path = format!("{}/mrl-config.toml", temp_path);
    tokio::fs::write(&config_path, config_content).await?;

    let config = TomlConfig::from_file(&config_path)?;
    config.validate()?;

    let pipeline = MrlPipeline::new(LocalStorage::default(), config);
    let report = EtlEngine::new(pipeline).run().await?;
    assert_eq!(report.summary.augmented, 1);

    let written = tokio::fs::read_to_string(format!("{}/derived/updated.json", temp_path)).await?;
    assert!(!written.contains('\n'));

    let value: serde_json::Value = serde_json::from_str(&written)?;
    let muscle = &value["sheep"]["medicines"]["Albendazole"]["matrix"]["meat"]["tissues"]["muscle"];
    assert_eq!(muscle["mrl_unit"], "mg/kg");
    assert!((muscle["safe_threshold"].as_f64().unwrap() - 20.4).abs() < 1e-9);
    assert!((muscle["unsafe_threshold"].as_f64().unwrap() - 30.6).abs() < 1e-9);

    Ok(())
}

/// Dry run 只在記憶體中衍生，不寫出檔案
#[tokio::test]
async fn test_extract_and_transform_without_load() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let temp_path = temp_dir.path().to_str().unwrap().replace('\\', "/");

    tokio::fs::write(
        format!("{}/reference.json", temp_path),
        r#"{"pig": {"medicines": {"Tiamulin": {"matrix": {"milk": {}}}}}, "chicken": {}}"#,
    )
    .await?;

    let config = TomlConfig::from_toml_str(&format!(
        r#"
[pipeline]
name = "dry"

[source]
path = "{0}/reference.json"

[load]
output_path = "{0}/updated.json"
"#,
        temp_path
    ))?;

    let pipeline = MrlPipeline::new(LocalStorage::default(), config);
    let document = pipeline.extract().await?;
    let derived = pipeline.transform(document).await?;

    assert_eq!(derived.summary.species, 2);
    assert_eq!(derived.summary.medicines, 1);
    assert_eq!(derived.summary.augmented, 0);
    assert_eq!(derived.summary.passed_through, 1);
    assert!(!temp_dir.path().join("updated.json").exists());

    Ok(())
}
