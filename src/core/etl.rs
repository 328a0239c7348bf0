use crate::core::{DerivationSummary, Pipeline};
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub output_paths: Vec<String>,
    pub summary: DerivationSummary,
}

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub async fn run(&self) -> Result<RunReport> {
        tracing::info!("Starting MRL derivation...");
        self.monitor.start();

        // Extract
        tracing::info!("Extracting reference document...");
        let document = self.pipeline.extract().await?;
        tracing::info!("Extracted {} species", document.len());
        self.monitor
            .log_phase("Extract", &format!("{} species", document.len()));

        // Transform
        tracing::info!("Deriving tissue thresholds...");
        let derived = self.pipeline.transform(document).await?;
        tracing::info!(
            "Augmented {} medicines, passed through {}",
            derived.summary.augmented,
            derived.summary.passed_through
        );
        self.monitor.log_phase(
            "Transform",
            &format!("{} medicines", derived.summary.medicines),
        );

        // Load
        tracing::info!("Writing output...");
        let output_paths = self.pipeline.load(&derived).await?;
        for path in &output_paths {
            tracing::info!("Output saved to: {}", path);
        }
        self.monitor
            .log_phase("Load", &format!("{} files", output_paths.len()));
        self.monitor.log_run_total(&derived.summary);

        Ok(RunReport {
            output_paths,
            summary: derived.summary,
        })
    }
}
