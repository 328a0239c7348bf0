use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use mrl_etl::core::catalog::{self, DEFAULT_SPECIES};
use mrl_etl::core::compliance::check_compliance;
use mrl_etl::core::prediction::{check_overdosage, predict_tissue_residue, DoseRequest};
use mrl_etl::utils::logger;
use mrl_etl::utils::validation::validate_range;
use mrl_etl::{ReferenceDocument, TissueKind};
use serde_json::Value;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "reference-tools")]
#[command(about = "Query and list the dosage / MRL reference data")]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Group medicines and recommended routes by category and species
    Routes {
        #[arg(long, default_value = "data/dosage_reference_full_extended_with_mrl.json")]
        input: PathBuf,
    },
    /// List medicines per category for each species (markdown)
    Medicines {
        #[arg(long, default_value = "dosage_reference_full_extended.json")]
        input: PathBuf,
        /// Species to list, comma separated
        #[arg(long, value_delimiter = ',')]
        species: Vec<String>,
    },
    /// Check a measured residue against the derived tissue thresholds
    Check {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        species: String,
        #[arg(long)]
        medicine: String,
        #[arg(long, default_value = "muscle")]
        tissue: String,
        /// Measured residue, in the entry's MRL unit
        #[arg(long)]
        measured: f64,
    },
    /// Predict tissue residues and the withdrawal period after a treatment course
    Predict {
        #[arg(long, default_value = "data/dosage_reference_full_extended_with_mrl.json")]
        input: PathBuf,
        #[arg(long)]
        species: String,
        #[arg(long)]
        category: String,
        #[arg(long)]
        medicine: String,
        /// Dose in mg/kg
        #[arg(long)]
        dose: f64,
        #[arg(long, default_value = "1")]
        frequency_per_day: u32,
        #[arg(long, default_value = "meat")]
        matrix: String,
        /// Last treatment day (YYYY-MM-DD)
        #[arg(long)]
        end_date: NaiveDate,
        /// Defaults to today
        #[arg(long)]
        current_date: Option<NaiveDate>,
    },
}

async fn read_json(path: &Path) -> anyhow::Result<Value> {
    let raw = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_slice(&raw).with_context(|| format!("{} is not valid JSON", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logger::init_stderr_logger(cli.verbose);

    match cli.command {
        Command::Routes { input } => {
            let document = read_json(&input).await?;
            let routes = catalog::extract_routes(&document)?;
            println!("{}", serde_json::to_string_pretty(&routes)?);
        }
        Command::Medicines { input, species } => {
            let document = read_json(&input).await?;
            let species = if species.is_empty() {
                DEFAULT_SPECIES.iter().map(|s| s.to_string()).collect()
            } else {
                species
            };
            let listing = catalog::medicine_catalog(&document, &species)?;
            print!("{}", catalog::render_catalog_markdown(&listing));
        }
        Command::Check {
            input,
            species,
            medicine,
            tissue,
            measured,
        } => {
            let document = ReferenceDocument::try_from(read_json(&input).await?)?;
            let tissue: TissueKind = tissue.parse()?;
            let report = check_compliance(&document, &species, &medicine, tissue, measured)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Predict {
            input,
            species,
            category,
            medicine,
            dose,
            frequency_per_day,
            matrix,
            end_date,
            current_date,
        } => {
            validate_range("frequency_per_day", frequency_per_day, 1, 24)?;
            let document = read_json(&input).await?;
            let request = DoseRequest {
                species,
                category,
                medicine,
                dose_mg_per_kg: dose,
                frequency_per_day,
                matrix,
                end_date,
                current_date: current_date.unwrap_or_else(|| chrono::Local::now().date_naive()),
            };

            let prediction = predict_tissue_residue(&document, &request)?;
            let overdosage = check_overdosage(
                &document,
                &request.species,
                &request.category,
                &request.medicine,
                request.dose_mg_per_kg,
                request.frequency_per_day,
            )?;

            if prediction.is_none() {
                tracing::warn!(
                    "No tissue data for {}/{}/{} ({})",
                    request.species,
                    request.category,
                    request.medicine,
                    request.matrix
                );
            }

            let output = serde_json::json!({
                "prediction": prediction,
                "overdosage": overdosage,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
