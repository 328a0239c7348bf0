use crate::domain::model::{DerivedDocument, ReferenceDocument};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn input_path(&self) -> &str;
    fn output_path(&self) -> &str;
    fn output_formats(&self) -> &[String];
    fn pretty(&self) -> bool;

    fn wants_format(&self, format: &str) -> bool {
        self.output_formats().iter().any(|f| f == format)
    }
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<ReferenceDocument>;
    async fn transform(&self, document: ReferenceDocument) -> Result<DerivedDocument>;
    /// Borrows the derived document so a failed write can be retried by the caller.
    async fn load(&self, result: &DerivedDocument) -> Result<Vec<String>>;
}
