use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, fmt, EnvFilter};

pub mod settings;
pub mod validation;

pub use settings::{JupyterSettings, PythonSettings, QuestDbSettings, Settings, VolumeSettings};
pub use validation::{validate_configuration, ConfigurationValidator};

const DEFAULT_FILTER: &str = "questplay=info,reqwest=warn,hyper=warn,tokio=warn";

/// Initialize logging system with structured output and environment-based level filtering.
///
/// An explicit `log_level` (from `--log-level`) wins over `RUST_LOG`.
pub fn init_logging(log_level: Option<&str>) -> anyhow::Result<()> {
    let env_filter = match log_level {
        Some(level) => EnvFilter::try_new(format!("questplay={},reqwest=warn,hyper=warn", level))?,
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_names(false)
                .with_file(false)
                .with_line_number(false)
                .with_level(true)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .try_init()?;

    tracing::debug!("Structured logging initialized");
    Ok(())
}

/// Initialize logging for testing with reduced verbosity
pub fn init_test_logging() -> anyhow::Result<()> {
    let env_filter = EnvFilter::new("questplay=debug");

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_test_writer().compact())
        .try_init()
        .or_else(|_| Ok(())) // Ignore if already initialized
}
