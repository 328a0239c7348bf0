pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::{cli::LocalStorage, toml_config::TomlConfig};

pub use core::{
    deriver::derive,
    etl::{EtlEngine, RunReport},
    pipeline::MrlPipeline,
};
pub use domain::model::{
    DerivationSummary, DerivedDocument, ReferenceDocument, RiskCategory, TissueEntry, TissueKind,
    TissueSet,
};
pub use utils::error::{MrlError, Result};
