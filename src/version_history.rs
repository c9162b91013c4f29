//! Version history
//!
//! Upgrades into releases that changed how clients are counted are surfaced
//! alongside the report: 1.9 introduced per-month client tracking and 1.10
//! introduced mount-level attribution. A 1.10 upgrade inside the window means
//! mount numbers before the upgrade date are incomplete.

use crate::billing::BillingPeriod;
use crate::error::{Endpoint, Error, Result};
use crate::timestamp_parser::TimestampParser;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Release lines whose arrival changes how counts should be read.
pub const NOTABLE_LINES: [ReleaseLine; 2] = [
    ReleaseLine { major: 1, minor: 9 },
    ReleaseLine { major: 1, minor: 10 },
];

/// The release that added mount attribution.
pub const MOUNT_ATTRIBUTION_LINE: ReleaseLine = ReleaseLine { major: 1, minor: 10 };

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VersionInfo {
    pub timestamp_installed: String,
    #[serde(default)]
    pub previous_version: Option<String>,
    #[serde(default)]
    pub build_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VersionHistoryData {
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default)]
    pub key_info: BTreeMap<String, VersionInfo>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VersionHistoryResponse {
    pub data: VersionHistoryData,
}

/// `major.minor` of a version string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ReleaseLine {
    pub major: u32,
    pub minor: u32,
}

impl ReleaseLine {
    /// Parses `1.10.1`, `1.10.1+ent`, `v1.9.0-rc1` and similar.
    pub fn parse(version: &str) -> Option<Self> {
        let core = version
            .trim()
            .trim_start_matches('v')
            .split(['+', '-'])
            .next()?;
        let mut parts = core.split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next()?.parse().ok()?;
        Some(Self { major, minor })
    }
}

impl fmt::Display for ReleaseLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VersionEntry {
    pub version: String,
    pub previous_version: Option<String>,
    pub timestamp_installed: DateTime<Utc>,
}

/// An install that moved the cluster onto a notable release line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VersionUpgrade {
    pub version: String,
    pub previous_version: Option<String>,
    pub timestamp_installed: DateTime<Utc>,
    pub line: ReleaseLine,
}

/// Entries ordered by install time.
pub fn parse(response: &VersionHistoryResponse) -> Result<Vec<VersionEntry>> {
    let mut entries = response
        .data
        .key_info
        .iter()
        .map(|(version, info)| {
            let installed = TimestampParser::parse(&info.timestamp_installed)
                .map_err(|e| e.for_endpoint(Endpoint::VersionHistory))?;
            Ok(VersionEntry {
                version: version.clone(),
                previous_version: info.previous_version.clone(),
                timestamp_installed: installed,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    if let Some(missing) = response
        .data
        .keys
        .iter()
        .find(|k| !response.data.key_info.contains_key(*k))
    {
        return Err(Error::malformed(
            Endpoint::VersionHistory,
            format!("key {missing} has no key_info entry"),
        ));
    }

    entries.sort_by_key(|e| e.timestamp_installed);
    Ok(entries)
}

/// The crossing this entry represents, if it lands on a notable line from an
/// earlier line (or from nothing, for a fresh install).
fn crossing(entry: &VersionEntry) -> Option<ReleaseLine> {
    let line = ReleaseLine::parse(&entry.version)?;
    if !NOTABLE_LINES.contains(&line) {
        return None;
    }
    match entry.previous_version.as_deref().and_then(ReleaseLine::parse) {
        Some(previous) if previous >= line => None,
        _ => Some(line),
    }
}

/// Notable upgrades installed within `[start, end]`, inclusive at both ends.
pub fn upgrades_between(
    entries: &[VersionEntry],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<VersionUpgrade> {
    entries
        .iter()
        .filter(|e| start <= e.timestamp_installed && e.timestamp_installed <= end)
        .filter_map(|e| {
            crossing(e).map(|line| VersionUpgrade {
                version: e.version.clone(),
                previous_version: e.previous_version.clone(),
                timestamp_installed: e.timestamp_installed,
                line,
            })
        })
        .collect()
}

pub fn upgrades_in_window(entries: &[VersionEntry], window: &BillingPeriod) -> Vec<VersionUpgrade> {
    upgrades_between(entries, window.start, window.end)
}

/// The upgrade that introduced mount attribution during the window, if any.
pub fn mount_attribution_upgrade(upgrades: &[VersionUpgrade]) -> Option<&VersionUpgrade> {
    upgrades.iter().find(|u| u.line == MOUNT_ATTRIBUTION_LINE)
}
