//! Response Classifier
//!
//! Picks the one UI state a report should render from the normalized activity
//! plus the sibling signals (config, permission failures, billing start).
//!
//! Precedence lives in [`POLICY`], an ordered list of `(state, predicate)`
//! pairs evaluated top to bottom. The first match wins. The out-of-range
//! warning is not part of the table: it is an overlay carried next to
//! whichever state was chosen.

use crate::error::Endpoint;
use crate::models::{ActivityConfig, ClientCounts, MonthBlock, NamespaceBlock};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

/// The closed set of states a client-count view can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClientCountState {
    TrackingDisabled,
    NoDataTrackingEnabled,
    NoMonthlyHistory,
    AuthorizedWithData,
    PermissionDeniedNoBillingStart,
    PermissionDeniedAuthorizedView,
    OutOfRangeWarning,
}

impl ClientCountState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientCountState::TrackingDisabled => "tracking-disabled",
            ClientCountState::NoDataTrackingEnabled => "no-data-tracking-enabled",
            ClientCountState::NoMonthlyHistory => "no-monthly-history",
            ClientCountState::AuthorizedWithData => "authorized-with-data",
            ClientCountState::PermissionDeniedNoBillingStart => {
                "permission-denied-no-billing-start"
            }
            ClientCountState::PermissionDeniedAuthorizedView => "permission-denied-authorized-view",
            ClientCountState::OutOfRangeWarning => "out-of-range-warning",
        }
    }

    /// Headline shown for the state.
    pub fn headline(&self) -> &'static str {
        match self {
            ClientCountState::TrackingDisabled => "Data tracking is disabled",
            ClientCountState::NoDataTrackingEnabled => "No data received",
            ClientCountState::NoMonthlyHistory => "No monthly history",
            ClientCountState::AuthorizedWithData => "Client usage",
            ClientCountState::PermissionDeniedNoBillingStart => "No start date found",
            ClientCountState::PermissionDeniedAuthorizedView => "You are not authorized",
            ClientCountState::OutOfRangeWarning => {
                "Query starts before client counts were tracked"
            }
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ClientCountState::TrackingDisabled => {
                "Client count tracking is disabled. Enable it in the activity configuration to collect data."
            }
            ClientCountState::NoDataTrackingEnabled => {
                "Tracking is enabled, but no client activity was recorded for this date range."
            }
            ClientCountState::NoMonthlyHistory => {
                "Totals are available, but there is no monthly breakdown for this date range."
            }
            ClientCountState::AuthorizedWithData => "Client counts for the selected date range.",
            ClientCountState::PermissionDeniedNoBillingStart => {
                "The billing start date could not be read. Supply a start month to view client counts."
            }
            ClientCountState::PermissionDeniedAuthorizedView => {
                "You are not authorized to view client counts for this date range."
            }
            ClientCountState::OutOfRangeWarning => {
                "The start was moved to the earliest month with client counts."
            }
        }
    }

    /// Whether activity data should be rendered under this state.
    pub fn shows_data(&self) -> bool {
        matches!(
            self,
            ClientCountState::AuthorizedWithData | ClientCountState::NoMonthlyHistory
        )
    }
}

impl fmt::Display for ClientCountState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The config endpoint's answer, reduced to what classification needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigSignal {
    pub enabled: bool,
    pub queries_available: bool,
}

impl From<&ActivityConfig> for ConfigSignal {
    fn from(config: &ActivityConfig) -> Self {
        Self {
            enabled: config.enabled.is_enabled(),
            queries_available: config.queries_available,
        }
    }
}

/// What a usable activity report looked like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportShape {
    /// Some scope reported a non-zero counter.
    pub has_clients: bool,
    /// Some month carried tracked counts with new-client data.
    pub has_monthly_history: bool,
}

impl ReportShape {
    pub fn from_parts(
        total: Option<&ClientCounts>,
        by_namespace: &[NamespaceBlock],
        by_month: &[MonthBlock],
    ) -> Self {
        let has_clients = total.map(|t| !t.is_zero()).unwrap_or(false)
            || by_namespace.iter().any(|ns| !ns.counts.is_zero())
            || by_month
                .iter()
                .any(|m| m.counts.map(|c| !c.is_zero()).unwrap_or(false));

        let has_monthly_history = by_month
            .iter()
            .any(|m| m.is_tracked() && m.has_new_clients());

        Self {
            has_clients,
            has_monthly_history,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifierInputs {
    /// `None` when the config endpoint was denied, empty or unreadable.
    pub config: Option<ConfigSignal>,
    /// `None` when no usable activity report exists (204, failure or denial).
    pub report: Option<ReportShape>,
    pub permission_errors: BTreeSet<Endpoint>,
    /// A license start was read or the caller supplied an explicit range.
    pub billing_start_known: bool,
    /// The billing window was clamped to the counts floor.
    pub out_of_range: bool,
}

impl ClassifierInputs {
    fn denied(&self, endpoint: Endpoint) -> bool {
        self.permission_errors.contains(&endpoint)
    }

    /// An unknown config is treated as enabled.
    fn tracking_enabled(&self) -> bool {
        self.config.map(|c| c.enabled).unwrap_or(true)
    }
}

pub type Predicate = fn(&ClassifierInputs) -> bool;

fn denied_without_billing_start(inputs: &ClassifierInputs) -> bool {
    !inputs.billing_start_known
        && inputs
            .permission_errors
            .iter()
            .any(|endpoint| endpoint.determines_billing_start())
}

fn activity_denied(inputs: &ClassifierInputs) -> bool {
    inputs.denied(Endpoint::Activity)
}

/// Disabled config is authoritative, even over previously collected data.
fn tracking_disabled(inputs: &ClassifierInputs) -> bool {
    !inputs.tracking_enabled()
}

fn no_clients(inputs: &ClassifierInputs) -> bool {
    inputs.report.map(|r| !r.has_clients).unwrap_or(true)
}

fn no_monthly_history(inputs: &ClassifierInputs) -> bool {
    inputs.report.map(|r| !r.has_monthly_history).unwrap_or(false)
}

fn always(_: &ClassifierInputs) -> bool {
    true
}

/// Evaluated top to bottom; the first matching predicate picks the state.
pub const POLICY: &[(ClientCountState, Predicate)] = &[
    (
        ClientCountState::PermissionDeniedNoBillingStart,
        denied_without_billing_start,
    ),
    (
        ClientCountState::PermissionDeniedAuthorizedView,
        activity_denied,
    ),
    (ClientCountState::TrackingDisabled, tracking_disabled),
    (ClientCountState::NoDataTrackingEnabled, no_clients),
    (ClientCountState::NoMonthlyHistory, no_monthly_history),
    (ClientCountState::AuthorizedWithData, always),
];

/// The chosen state plus the out-of-range overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub state: ClientCountState,
    pub out_of_range_warning: bool,
}

impl Classification {
    /// Every state that applies, primary first.
    pub fn states(&self) -> Vec<ClientCountState> {
        let mut states = vec![self.state];
        if self.out_of_range_warning {
            states.push(ClientCountState::OutOfRangeWarning);
        }
        states
    }

    pub fn has(&self, state: ClientCountState) -> bool {
        self.state == state
            || (state == ClientCountState::OutOfRangeWarning && self.out_of_range_warning)
    }
}

pub fn classify(inputs: &ClassifierInputs) -> Classification {
    let state = POLICY
        .iter()
        .find(|(_, predicate)| predicate(inputs))
        .map(|(state, _)| *state)
        .unwrap_or(ClientCountState::AuthorizedWithData);

    debug!(
        state = %state,
        out_of_range = inputs.out_of_range,
        denied = ?inputs.permission_errors,
        "Classified client-count response"
    );

    Classification {
        state,
        out_of_range_warning: inputs.out_of_range,
    }
}
