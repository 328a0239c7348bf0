use clap::Parser;
use mrl_etl::utils::{logger, validation::Validate};
use mrl_etl::{CliConfig, EtlEngine, LocalStorage, MrlPipeline};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = CliConfig::parse();

    // 初始化日誌
    logger::init_cli_logger(config.verbose);

    tracing::info!("Starting mrl-etl CLI");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let monitor_enabled = config.monitor;
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    // 創建存儲和管道
    let pipeline = MrlPipeline::new(LocalStorage::default(), config);
    let engine = EtlEngine::new_with_monitoring(pipeline, monitor_enabled);

    match engine.run().await {
        Ok(report) => {
            tracing::info!(
                "✅ Derived thresholds for {} medicines across {} species",
                report.summary.augmented,
                report.summary.species
            );
            println!("✅ MRL derivation completed successfully!");
            for path in &report.output_paths {
                println!("📁 Output saved to: {}", path);
            }
        }
        Err(e) => {
            tracing::error!(
                "❌ MRL derivation failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

            // 根據錯誤嚴重程度決定退出碼
            if let Some(exit_code) = e.exit_code() {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}
