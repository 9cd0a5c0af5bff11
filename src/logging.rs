use tracing_subscriber::EnvFilter;

pub const ENV_LOG: &str = "ROBOFLOW_LOG";
const DEFAULT_DIRECTIVES: &str = "info";

/// Installs a compact stdout subscriber filtered by `ROBOFLOW_LOG`, which takes
/// `EnvFilter` directives such as `debug` or `roboflow=trace,reqwest=warn`.
/// Unset or unparsable values fall back to `info`. A no-op when the host
/// already installed a global subscriber.
pub fn setup_logging() {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var(ENV_LOG).ok().as_deref()))
        .with_target(false)
        .compact()
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|value| EnvFilter::try_new(value).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVES))
}
