use clap::Parser;
use mrl_etl::core::pipeline::csv_output_path;
use mrl_etl::core::{ConfigProvider, Pipeline};
use mrl_etl::utils::{logger, validation::Validate};
use mrl_etl::{EtlEngine, LocalStorage, MrlPipeline, TomlConfig};

#[derive(Parser)]
#[command(name = "toml-etl")]
#[command(about = "MRL threshold derivation with TOML configuration support")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "mrl-config.toml")]
    config: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Override monitoring setting from config
    #[arg(long)]
    monitor: Option<bool>,

    /// Dry run - derive in memory and report without writing any output
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // 載入 TOML 配置（日誌格式由配置決定）
    let config = match TomlConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", args.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    // 初始化日誌
    if config.json_logs() {
        logger::init_json_logger(args.verbose, config.log_level());
    } else {
        logger::init_compact_logger(args.verbose, config.log_level());
    }

    tracing::info!("🚀 Starting TOML-based MRL derivation");
    tracing::info!("📁 Loaded configuration from: {}", args.config);

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    tracing::info!("✅ Configuration loaded and validated successfully");
    display_config_summary(&config, &args);

    let monitor_enabled = args.monitor.unwrap_or_else(|| config.monitoring_enabled());
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let pipeline = MrlPipeline::new(LocalStorage::default(), config);

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - No output will be written");
        perform_dry_run(&pipeline).await?;
        return Ok(());
    }

    let engine = EtlEngine::new_with_monitoring(pipeline, monitor_enabled);

    match engine.run().await {
        Ok(report) => {
            tracing::info!("✅ MRL derivation completed successfully!");
            println!("✅ MRL derivation completed successfully!");
            for path in &report.output_paths {
                tracing::info!("📁 Output saved to: {}", path);
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

            if let Some(exit_code) = e.exit_code() {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}

fn display_config_summary(config: &TomlConfig, args: &Args) {
    println!("📋 Configuration Summary:");
    println!(
        "  Pipeline: {} v{}",
        config.pipeline.name,
        config.pipeline.version.as_deref().unwrap_or("-")
    );
    if let Some(description) = &config.pipeline.description {
        println!("  Description: {}", description);
    }
    println!("  Source: {}", config.input_path());
    println!("  Output: {}", config.output_path());
    println!("  Formats: {}", config.output_formats().join(", "));
    println!("  Pretty JSON: {}", config.pretty());

    if args.dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }

    println!();
}

async fn perform_dry_run(
    pipeline: &MrlPipeline<LocalStorage, TomlConfig>,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Dry Run Analysis:");
    println!();

    let document = pipeline.extract().await?;
    println!("📖 Reference document: {} species", document.len());

    let derived = pipeline.transform(document).await?;
    let summary = derived.summary;
    println!();
    println!("⚙️ Derivation:");
    println!("  Medicines visited: {}", summary.medicines);
    println!("  Meat entries augmented: {}", summary.augmented);
    println!("  Passed through unchanged: {}", summary.passed_through);

    println!();
    println!("💾 Would write:");
    let config = pipeline.config();
    if config.wants_format("json") {
        println!("  {}", config.output_path());
    }
    if config.wants_format("csv") {
        println!("  {}", csv_output_path(config.output_path()));
    }

    println!();
    println!("✅ Dry run analysis complete. Use --verbose for more details during actual run.");

    Ok(())
}
