//! Core Data Models
//!
//! This module defines the data structures used throughout the client-count
//! pipeline, from the raw wire shapes the backend emits to the canonical value
//! objects the dashboard consumes.
//!
//! ## Data Flow
//!
//! 1. **Raw Data**: [`RawCounts`], [`RawNamespace`], [`RawMount`], [`RawMonth`] -
//!    deserialized verbatim from the activity payload, whatever schema version
//!    produced it
//! 2. **Canonical**: [`ClientCounts`], [`NamespaceBlock`], [`MountBlock`],
//!    [`MonthBlock`] - produced by [`crate::normalizer`], never mutated afterwards
//! 3. **Report**: [`UsageReport`] - the ranked, classified output
//!
//! ## Absent vs. zero
//!
//! Every "not reported" condition is an `Option`, never a zero:
//! - `NamespaceBlock::mounts == None` means the backend predates mount attribution
//! - `MonthBlock::counts == None` marks a month before tracking began
//! - `MonthBlock::new_clients == None` means no new-client data for that month
//! - `UsageReport::total == None` means no activity data was fetched at all

use crate::billing::BillingPeriod;
use crate::classifier::{Classification, ReportShape};
use crate::error::Error;
use crate::months::{self, MonthPoint};
use crate::ranking::{self, Attributable, Attribution, FilterSelection};
use crate::timestamp_parser::CalendarMonth;
use crate::version_history::VersionUpgrade;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Label shown for the root namespace, whose path is the empty string.
pub const ROOT_NAMESPACE_LABEL: &str = "root";

// ── Raw wire shapes ──────────────────────────────────────────────────────────

/// A counts object exactly as the backend sent it, keys and all.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawCounts(pub Map<String, Value>);

impl RawCounts {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

impl From<Map<String, Value>> for RawCounts {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<&ClientCounts> for RawCounts {
    fn from(counts: &ClientCounts) -> Self {
        match serde_json::to_value(counts) {
            Ok(Value::Object(map)) => Self(map),
            _ => Self::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMount {
    pub mount_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_type: Option<String>,
    pub counts: RawCounts,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawNamespace {
    #[serde(default)]
    pub namespace_id: String,
    pub namespace_path: String,
    pub counts: RawCounts,
    /// Missing entirely on backends that predate mount attribution.
    #[serde(default)]
    pub mounts: Option<Vec<RawMount>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawNewClients {
    #[serde(default)]
    pub counts: Option<RawCounts>,
    #[serde(default)]
    pub namespaces: Option<Vec<RawNamespace>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMonth {
    pub timestamp: String,
    #[serde(default)]
    pub counts: Option<RawCounts>,
    #[serde(default)]
    pub namespaces: Option<Vec<RawNamespace>>,
    #[serde(default)]
    pub new_clients: Option<RawNewClients>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityData {
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub total: Option<RawCounts>,
    #[serde(default)]
    pub by_namespace: Option<Vec<RawNamespace>>,
    /// Most-recent-first as sent by the backend.
    #[serde(default)]
    pub months: Option<Vec<RawMonth>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityResponse {
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub data: Option<ActivityData>,
}

/// Values of the config endpoint's `enabled` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Enablement {
    DefaultEnable,
    DefaultDisable,
    Enable,
    Disable,
}

impl Enablement {
    pub fn is_enabled(&self) -> bool {
        matches!(self, Enablement::DefaultEnable | Enablement::Enable)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityConfig {
    pub enabled: Enablement,
    #[serde(default)]
    pub queries_available: bool,
    #[serde(default)]
    pub retention_months: Option<u32>,
    #[serde(default)]
    pub default_report_months: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigResponse {
    pub data: ActivityConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LicenseInfo {
    pub start_time: String,
    #[serde(default)]
    pub expiration_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LicenseData {
    #[serde(default)]
    pub autoloaded: Option<LicenseInfo>,
    #[serde(default)]
    pub stored: Option<LicenseInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LicenseResponse {
    pub data: LicenseData,
}

impl LicenseResponse {
    /// The license that governs billing; an autoloaded license wins over a stored one.
    pub fn effective(&self) -> Option<&LicenseInfo> {
        self.data.autoloaded.as_ref().or(self.data.stored.as_ref())
    }
}

// ── Canonical value objects ──────────────────────────────────────────────────

/// Named counters for one scope, always under the modern field names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClientCounts {
    pub clients: u64,
    pub entity_clients: u64,
    pub non_entity_clients: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_syncs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acme_clients: Option<u64>,
}

/// Addressable counter fields, used for averages and per-field lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountField {
    Clients,
    EntityClients,
    NonEntityClients,
    SecretSyncs,
    AcmeClients,
}

impl CountField {
    pub const ALL: [CountField; 5] = [
        CountField::Clients,
        CountField::EntityClients,
        CountField::NonEntityClients,
        CountField::SecretSyncs,
        CountField::AcmeClients,
    ];
}

impl ClientCounts {
    pub fn get(&self, field: CountField) -> Option<u64> {
        match field {
            CountField::Clients => Some(self.clients),
            CountField::EntityClients => Some(self.entity_clients),
            CountField::NonEntityClients => Some(self.non_entity_clients),
            CountField::SecretSyncs => self.secret_syncs,
            CountField::AcmeClients => self.acme_clients,
        }
    }

    pub fn is_zero(&self) -> bool {
        CountField::ALL
            .iter()
            .all(|field| self.get(*field).unwrap_or(0) == 0)
    }

    /// The largest category counter; `clients` is never expected to be below it.
    pub fn largest_category(&self) -> u64 {
        [
            self.entity_clients,
            self.non_entity_clients,
            self.secret_syncs.unwrap_or(0),
            self.acme_clients.unwrap_or(0),
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MountBlock {
    pub path: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub mount_type: Option<String>,
    pub counts: ClientCounts,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamespaceBlock {
    pub id: String,
    pub path: String,
    /// Display label: the path, or [`ROOT_NAMESPACE_LABEL`] for the empty path.
    pub label: String,
    pub counts: ClientCounts,
    /// `None` when the backend did not report mount attribution.
    pub mounts: Option<Vec<MountBlock>>,
}

impl NamespaceBlock {
    pub fn has_mount_attribution(&self) -> bool {
        self.mounts.is_some()
    }

    pub fn mount(&self, label: &str) -> Option<&MountBlock> {
        self.mounts.as_ref()?.iter().find(|m| m.label() == label)
    }
}

/// Clients first seen during one month, as computed by the backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewClients {
    pub counts: ClientCounts,
    pub namespaces: Vec<NamespaceBlock>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthBlock {
    /// Timestamp as sent by the backend.
    pub timestamp: String,
    pub month: CalendarMonth,
    /// Chart label, e.g. `9/23`.
    pub label: String,
    /// `None` for a month that predates tracking.
    pub counts: Option<ClientCounts>,
    pub namespaces: Option<Vec<NamespaceBlock>>,
    pub new_clients: Option<NewClients>,
}

impl MonthBlock {
    pub fn is_tracked(&self) -> bool {
        self.counts.is_some()
    }

    pub fn has_new_clients(&self) -> bool {
        self.new_clients.is_some()
    }

    /// This month's totals for one namespace, looked up by label.
    pub fn namespace(&self, label: &str) -> Option<&NamespaceBlock> {
        self.namespaces.as_ref()?.iter().find(|ns| ns.label == label)
    }

    /// This month's new clients for one namespace, looked up by label.
    pub fn new_clients_for(&self, label: &str) -> Option<&NamespaceBlock> {
        self.new_clients
            .as_ref()?
            .namespaces
            .iter()
            .find(|ns| ns.label == label)
    }
}

/// Which aggregate views make sense for the resolved window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportView {
    /// Month-over-month charts.
    MonthlyTrend,
    /// Single-month stat totals; trend charts are suppressed.
    SingleMonth,
}

/// Pipeline output.
#[derive(Debug, Clone, Serialize)]
pub struct UsageReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Bounds the backend reported for the data it returned.
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// `None` when no activity data was available.
    pub total: Option<ClientCounts>,
    /// Every namespace, ranked by clients descending.
    pub by_namespace: Vec<NamespaceBlock>,
    /// Chronological, oldest first.
    pub by_month: Vec<MonthBlock>,
    pub resolved_window: Option<BillingPeriod>,
    pub state: Classification,
    pub upgrades_in_window: Vec<VersionUpgrade>,
    /// Mount-level numbers are incomplete for this window.
    pub mount_attribution_caveat: bool,
    pub source_errors: Vec<Error>,
}

impl UsageReport {
    /// Whether any scope reported a non-zero client count.
    pub fn has_clients(&self) -> bool {
        ReportShape::from_parts(self.total.as_ref(), &self.by_namespace, &self.by_month).has_clients
    }

    pub fn top_namespaces(&self, limit: usize) -> Vec<NamespaceBlock> {
        ranking::rank(&self.by_namespace, limit)
    }

    /// Counts for the selected scope; see [`ranking::selection_totals`].
    pub fn selection_totals(&self, selection: &FilterSelection) -> Option<ClientCounts> {
        ranking::selection_totals(self.total, &self.by_namespace, selection)
    }

    /// The month series projected onto the selected scope.
    pub fn selection_series(&self, selection: &FilterSelection) -> Vec<MonthPoint> {
        months::selection_series(&self.by_month, selection)
    }

    /// Top attribution for the current selection.
    pub fn attribution(&self, selection: &FilterSelection, limit: usize) -> Attribution {
        ranking::attribution(&self.by_namespace, selection, limit)
    }

    pub fn view(&self) -> ReportView {
        match &self.resolved_window {
            Some(window) if window.is_single_month() => ReportView::SingleMonth,
            _ => ReportView::MonthlyTrend,
        }
    }
}

impl Attributable for NamespaceBlock {
    fn label(&self) -> &str {
        &self.label
    }

    fn counts(&self) -> &ClientCounts {
        &self.counts
    }
}

impl Attributable for MountBlock {
    fn label(&self) -> &str {
        &self.path
    }

    fn counts(&self) -> &ClientCounts {
        &self.counts
    }
}
