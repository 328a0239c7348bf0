pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
use crate::core::ConfigProvider;
#[cfg(feature = "cli")]
use crate::utils::error::Result;
#[cfg(feature = "cli")]
use crate::utils::validation::{self, Validate};
#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use serde::{Deserialize, Serialize};

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "mrl-etl")]
#[command(about = "Derive tissue-level MRL thresholds from a dosage reference document")]
pub struct CliConfig {
    #[arg(long, default_value = "dosage_reference_full_extended.json")]
    pub input_path: String,

    #[arg(long, default_value = "updated_mrl_per_species_matrix_refined6_UPDATED.json")]
    pub output_path: String,

    #[arg(long, value_delimiter = ',', default_value = "json")]
    pub output_formats: Vec<String>,

    #[arg(long, help = "Write the JSON document without indentation")]
    pub compact: bool,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log CPU and memory usage per phase")]
    pub monitor: bool,
}

#[cfg(feature = "cli")]
impl ConfigProvider for CliConfig {
    fn input_path(&self) -> &str {
        &self.input_path
    }

    fn output_path(&self) -> &str {
        &self.output_path
    }

    fn output_formats(&self) -> &[String] {
        &self.output_formats
    }

    fn pretty(&self) -> bool {
        !self.compact
    }
}

#[cfg(feature = "cli")]
impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_path("input_path", &self.input_path)?;
        validation::validate_file_extensions("input_path", &[self.input_path.as_str()], &["json"])?;
        validation::validate_path("output_path", &self.output_path)?;
        validation::validate_output_formats("output_formats", &self.output_formats)?;
        validation::validate_output_targets("output_path", &self.output_path, &self.output_formats)?;
        Ok(())
    }
}
