use tracing_subscriber::{prelude::*, EnvFilter, Registry};

use crate::util::config::LogFormat;

/// Initialize tracing
pub fn init(format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_default();

    let logger = match format {
        LogFormat::Compact => tracing_subscriber::fmt::layer().compact().boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer().json().boxed(),
    };

    let collector = Registry::default().with(logger).with(env_filter);

    if let Err(e) = tracing::subscriber::set_global_default(collector) {
        eprintln!("tracing subscriber already installed: {e}");
    }
}
