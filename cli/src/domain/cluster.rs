//! Pure helpers for reading k3d and docker output.

use std::sync::LazyLock;

use regex::Regex;

static ANSI_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"\x1b\[[0-9;]*[a-zA-Z]").expect("valid regex")
});

static LOG_LEVEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^[A-Z]{4}\[").expect("valid regex")
});

/// Health of a previously created k3d registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryHealth {
    Healthy,
    /// The registry no longer has a live backing container.
    Stale,
    /// A lookup was inconclusive.
    Unknown,
}

/// Drop leveled log lines (`DEBU[0000] ...`) and any line carrying ANSI
/// escapes; every other line is kept verbatim and in order.
#[must_use]
pub fn strip_debug_output(output: &str) -> String {
    output
        .split('\n')
        .filter(|line| !ANSI_RE.is_match(line) && !LOG_LEVEL_RE.is_match(line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Non-empty trimmed lines.
#[must_use]
pub fn parse_names(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Whether `k3d cluster list` output has a row for `name`.
#[must_use]
pub fn cluster_listed(output: &str, name: &str) -> bool {
    output
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .any(|first| first == name)
}

/// Whether a k3d registry listing contains `host`.
#[must_use]
pub fn registry_listed(names: &[String], host: &str) -> bool {
    names.iter().any(|n| n == host || n.ends_with(host))
}

/// Whether a live container backs `host`: exact name, `k3d-` prefixed
/// name, or a single container whose name ends with `host`.
#[must_use]
pub fn container_live(names: &[String], host: &str) -> bool {
    let prefixed = format!("k3d-{host}");
    if names.iter().any(|n| *n == host || *n == prefixed) {
        return true;
    }
    names.iter().filter(|n| n.ends_with(host)).count() == 1
}
