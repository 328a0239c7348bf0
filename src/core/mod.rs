pub mod catalog;
pub mod compliance;
pub mod deriver;
pub mod etl;
pub mod pipeline;
pub mod prediction;

pub use crate::domain::model::{DerivationSummary, DerivedDocument, ReferenceDocument};
pub use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
pub use crate::utils::error::Result;
