//! Command configuration parsed from environment variables.
//!
//! Every setting can be supplied through a `PERIDOT_` environment variable
//! and overridden by the matching global command line option.

use std::env;
use std::str::FromStr;

use camino::Utf8PathBuf;
use thiserror::Error;

/// State file used when neither `--state` nor `PERIDOT_STATE` is given.
pub(crate) const DEFAULT_STATE_FILE: &str = "peridot-state.json";

const LOG_LEVEL_VAR: &str = "PERIDOT_LOG_LEVEL";
const STATE_VAR: &str = "PERIDOT_STATE";
const LICENSE_LIST_VAR: &str = "PERIDOT_LICENSE_LIST";

/// Invalid configuration values.
#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum ConfigError {
    /// The log level is not one of the known names.
    #[error("unknown log level '{0}', expected one of: trace, debug, info, warn, error")]
    UnknownLogLevel(String),
}

/// Log level names matching the tracing levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(ConfigError::UnknownLogLevel(s.to_owned())),
        }
    }
}

impl LogLevel {
    /// The tracing filter directive for this level.
    pub(crate) fn as_filter_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Settings shared by every command.
///
/// # Environment Variables
///
/// - `PERIDOT_LOG_LEVEL`: trace, debug, info, warn or error
/// - `PERIDOT_STATE`: path of the JSON state file
/// - `PERIDOT_LICENSE_LIST`: directory holding `licenses.json`
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Config {
    pub(crate) log_level: LogLevel,
    pub(crate) state_path: Utf8PathBuf,
    pub(crate) license_list: Option<Utf8PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            state_path: Utf8PathBuf::from(DEFAULT_STATE_FILE),
            license_list: None,
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a variable holds an invalid value.
    pub(crate) fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let log_level = match lookup(LOG_LEVEL_VAR) {
            Some(val) => val.parse()?,
            None => defaults.log_level,
        };
        Ok(Self {
            log_level,
            state_path: lookup(STATE_VAR).map_or(defaults.state_path, Utf8PathBuf::from),
            license_list: lookup(LICENSE_LIST_VAR).map(Utf8PathBuf::from),
        })
    }

    /// Apply command line values, which take precedence over the environment.
    #[must_use]
    pub(crate) fn apply_overrides(
        mut self,
        log_level: Option<LogLevel>,
        state_path: Option<Utf8PathBuf>,
        license_list: Option<Utf8PathBuf>,
    ) -> Self {
        if let Some(level) = log_level {
            self.log_level = level;
        }
        if let Some(path) = state_path {
            self.state_path = path;
        }
        if license_list.is_some() {
            self.license_list = license_list;
        }
        self
    }
}
