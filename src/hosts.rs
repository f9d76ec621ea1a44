use std::path::Path;
use std::sync::OnceLock;

use anyhow::{bail, Context};
use regex::Regex;
use tracing::{debug, warn};

use crate::config::Configuration;

const URL_PATTERN: &str = concat!(
    r"(?iu)^https?://",
    r"[-\w@:%._+~#=]+",
    r"\.[a-zа-яё]{2,6}",
    r"(?:[/?][-\wа-яё@:%_+.~#?&/=]*)?$",
);

static URL_REGEX: OnceLock<Regex> = OnceLock::new();

pub(crate) fn is_valid_url(url: &str) -> bool {
    URL_REGEX
        .get_or_init(|| Regex::new(URL_PATTERN).expect("URL pattern must compile"))
        .is_match(url)
}

/// Keeps the valid URLs, warning about every rejected one.
fn keep_valid<'a>(candidates: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    candidates
        .into_iter()
        .filter_map(|candidate| {
            if is_valid_url(candidate) {
                debug!("`{candidate}` successfully added");
                Some(candidate.to_owned())
            } else {
                warn!("URL `{candidate}` is invalid!");
                None
            }
        })
        .collect()
}

/// Splits a comma separated list without validating it.
pub(crate) fn split_list(entry: &str) -> Vec<String> {
    entry
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Reads one URL per line; blank lines are skipped.
pub(crate) fn parse_hosts_file(path: &Path) -> anyhow::Result<Vec<String>> {
    if !path.exists() {
        bail!("file with hosts was not found: {}", path.display());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("error reading {}", path.display()))?;
    Ok(keep_valid(
        content.lines().map(str::trim).filter(|line| !line.is_empty()),
    ))
}

/// Picks the hosts to probe: a hosts file wins over an inline list.
pub(crate) fn resolve_hosts(conf: &Configuration) -> anyhow::Result<Vec<String>> {
    let hosts = if let Some(file) = &conf.hosts_file {
        parse_hosts_file(file).context("Failed to get URLs from file")?
    } else if !conf.hosts.is_empty() {
        keep_valid(conf.hosts.iter().map(String::as_str))
    } else {
        bail!("Not found any hosts - pass them via -F or -H argument");
    };

    if hosts.is_empty() {
        bail!("Not found any URL - ensure that URLs passed via -F or -H are valid!");
    }
    Ok(hosts)
}
