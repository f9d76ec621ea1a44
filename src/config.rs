use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use confique::Config;

/// Probe settings. Loaded from an optional YAML file and `HTTPROBE_*`
/// environment variables; command line flags are applied on top.
#[derive(Debug, Config)]
pub struct Configuration {
    /// URLs to probe.
    #[config(default = [])]
    pub hosts: Vec<String>,
    /// File with one URL per line; takes precedence over `hosts`.
    #[config(env = "HTTPROBE_HOSTS_FILE")]
    pub hosts_file: Option<PathBuf>,
    /// Requests per host.
    #[config(env = "HTTPROBE_COUNT", default = 1)]
    pub count: usize,
    #[config(env = "HTTPROBE_TIMEOUT_SECS", default = 5)]
    pub timeout_secs: u64,
    #[config(env = "HTTPROBE_PROGRESS_INTERVAL_MS", default = 500)]
    pub progress_interval_ms: u64,
    /// Report destination, HTML unless the name ends in `.json`.
    #[config(env = "HTTPROBE_OUTPUT")]
    pub output: Option<PathBuf>,
    /// HTML template replacing the built-in one.
    #[config(env = "HTTPROBE_TEMPLATE")]
    pub template: Option<PathBuf>,
    /// Directory receiving a timestamped log file.
    #[config(env = "HTTPROBE_LOG_DIR")]
    pub log_dir: Option<PathBuf>,
}

impl Configuration {
    /// A missing file is not an error; defaults and the environment apply.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        Configuration::builder()
            .env()
            .file(path)
            .load()
            .with_context(|| format!("error reading configuration file {}", path.display()))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    #[cfg(test)]
    pub(crate) fn default_for_tests() -> Self {
        Self {
            hosts: vec![],
            hosts_file: None,
            count: 1,
            timeout_secs: 5,
            progress_interval_ms: 500,
            output: None,
            template: None,
            log_dir: None,
        }
    }
}
