use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn default_filter(verbose: bool, level: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| match (verbose, level) {
        (true, _) => EnvFilter::new("mrl_etl=debug,info"),
        (false, Some(level)) => EnvFilter::new(format!("mrl_etl={}", level)),
        (false, None) => EnvFilter::new("mrl_etl=info"),
    })
}

pub fn init_cli_logger(verbose: bool) {
    init_compact_logger(verbose, None);
}

pub fn init_compact_logger(verbose: bool, level: Option<&str>) {
    tracing_subscriber::registry()
        .with(default_filter(verbose, level))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .init();
}

/// JSON lines on stdout, for runs whose logs are collected by another tool.
pub fn init_json_logger(verbose: bool, level: Option<&str>) {
    tracing_subscriber::registry()
        .with(default_filter(verbose, level))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .json(),
        )
        .init();
}

/// Logs go to stderr so stdout stays clean for JSON or markdown output.
pub fn init_stderr_logger(verbose: bool) {
    tracing_subscriber::registry()
        .with(default_filter(verbose, Some("warn")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .init();
}
