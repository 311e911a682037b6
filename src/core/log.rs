use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    EnvFilter, filter::Targets, fmt, prelude::__tracing_subscriber_SubscriberExt,
    util::SubscriberInitExt,
};

/// Debug output for this crate, only when `verbose` is set.
fn app_filter(verbose: bool) -> Option<Targets> {
    verbose.then(|| Targets::new().with_target("tickerfolio", LevelFilter::DEBUG))
}

/// Installs the global subscriber. `verbose` turns on debug output for this crate;
/// otherwise only `RUST_LOG` enables logging.
pub fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "off" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().pretty().without_time().with_writer(std::io::stderr))
        .with(app_filter(verbose))
        .with(env_filter)
        .init();
}
