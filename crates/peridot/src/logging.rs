//! Structured logging for the command line.
//!
//! Events go to stderr so command output on stdout stays machine readable.
//! Records emitted through the `log` facade by the library crates are
//! forwarded into the same subscriber.

use tracing_subscriber::EnvFilter;

use crate::config::Config;

fn filter_from_config(config: &Config) -> EnvFilter {
    EnvFilter::new(config.log_level.as_filter_str())
}

/// Install the global subscriber at the configured level.
///
/// The first subscriber wins; later calls are ignored.
pub(crate) fn init_logging(config: &Config) {
    let result = tracing_subscriber::fmt()
        .with_env_filter(filter_from_config(config))
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
    if result.is_err() {
        tracing::debug!("logging already initialised");
    }
}
