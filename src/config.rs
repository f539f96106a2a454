use rand::Rng;
use rand::distributions::Alphanumeric;
use std::env;
use std::path::PathBuf;
use thiserror::Error;

use crate::report::CURRENT_VERSION;
use crate::timestamp;

pub const ROOT_ENV: &str = "JAKARTA_CENSUS_ROOT";
pub const OUTPUT_ENV: &str = "JAKARTA_CENSUS_OUTPUT";
pub const THREADS_ENV: &str = "JAKARTA_CENSUS_THREADS";

/// Problems that stop a command before any archive is read. Each has its own
/// process exit code.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no repository root given (use --root or JAKARTA_CENSUS_ROOT)")]
    MissingRoot,
    #[error("no archives found in the given inputs")]
    NoArchives,
    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

impl ConfigError {
    pub fn exit_code(&self) -> u8 {
        match self {
            ConfigError::MissingRoot => 3,
            ConfigError::NoArchives => 4,
            ConfigError::Invalid { .. } => 1,
        }
    }
}

/// Where a report is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportTarget {
    Stdout,
    File(PathBuf),
}

fn env_value(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

pub fn resolve_root(flag: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
    layered_root(flag, env_value(ROOT_ENV))
}

fn layered_root(flag: Option<PathBuf>, env: Option<String>) -> Result<PathBuf, ConfigError> {
    flag.or_else(|| env.map(PathBuf::from))
        .ok_or(ConfigError::MissingRoot)
}

pub fn resolve_threads(flag: Option<usize>) -> Result<Option<usize>, ConfigError> {
    layered_threads(flag, env_value(THREADS_ENV))
}

fn layered_threads(flag: Option<usize>, env: Option<String>) -> Result<Option<usize>, ConfigError> {
    if flag.is_some() {
        return Ok(flag);
    }
    match env {
        None => Ok(None),
        Some(value) => match value.trim().parse::<usize>() {
            Ok(n) if n > 0 => Ok(Some(n)),
            _ => Err(ConfigError::Invalid {
                name: THREADS_ENV,
                value,
            }),
        },
    }
}

/// `-` means stdout; with neither flag nor environment a fresh, date-stamped
/// file name in the working directory is used.
pub fn resolve_output(flag: Option<PathBuf>) -> ReportTarget {
    layered_output(flag, env_value(OUTPUT_ENV))
}

fn layered_output(flag: Option<PathBuf>, env: Option<String>) -> ReportTarget {
    match flag.or_else(|| env.map(PathBuf::from)) {
        Some(p) if p.as_os_str() == "-" => ReportTarget::Stdout,
        Some(p) => ReportTarget::File(p),
        None => ReportTarget::File(PathBuf::from(default_report_name(
            &timestamp::today(),
            &random_suffix(),
        ))),
    }
}

pub fn default_report_name(date: &str, suffix: &str) -> String {
    format!("jakarta-census-{date}-{suffix}-v{CURRENT_VERSION}.tsv")
}

fn random_suffix() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect()
}
