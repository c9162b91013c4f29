//! Month Rollup Builder
//!
//! Turns the backend's per-month blocks into a chronological series. Months
//! before tracking began stay in the series (so chart axes have no gaps) but
//! keep `counts: None`; they are never filled in with zeros.
//!
//! `new_clients` is passed through from the backend after normalization. It is
//! not recomputed by differencing successive months.

use crate::error::Result;
use crate::models::{ClientCounts, CountField, MonthBlock, RawMonth};
use crate::normalizer::{normalize, normalize_namespaces, normalize_new_clients};
use crate::ranking::FilterSelection;
use crate::timestamp_parser::{CalendarMonth, TimestampParser};
use serde::Serialize;
use tracing::debug;

/// Normalize every month and order them oldest first.
///
/// The backend sends most-recent-first; a stable sort on the calendar month
/// reverses that and also tolerates payloads that arrive out of order.
pub fn build_series(months: &[RawMonth]) -> Result<Vec<MonthBlock>> {
    let mut series = months
        .iter()
        .map(normalize_month)
        .collect::<Result<Vec<_>>>()?;
    series.sort_by_key(|m| m.month);

    debug!(
        months = series.len(),
        untracked = series.iter().filter(|m| !m.is_tracked()).count(),
        "Built month series"
    );
    Ok(series)
}

pub fn normalize_month(raw: &RawMonth) -> Result<MonthBlock> {
    let month = TimestampParser::parse_month(&raw.timestamp)?;

    let Some(raw_counts) = raw.counts.as_ref() else {
        return Ok(placeholder(&raw.timestamp, month));
    };

    let namespaces = raw
        .namespaces
        .as_deref()
        .map(normalize_namespaces)
        .transpose()?;
    let new_clients = match raw.new_clients.as_ref() {
        Some(new) => normalize_new_clients(new)?,
        None => None,
    };

    Ok(MonthBlock {
        timestamp: raw.timestamp.clone(),
        month,
        label: month.label(),
        counts: Some(normalize(raw_counts)?),
        namespaces,
        new_clients,
    })
}

/// A month that predates tracking for the queried scope.
fn placeholder(timestamp: &str, month: CalendarMonth) -> MonthBlock {
    MonthBlock {
        timestamp: timestamp.to_string(),
        month,
        label: month.label(),
        counts: None,
        namespaces: None,
        new_clients: None,
    }
}

/// One month of the series for a single scope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthPoint {
    pub month: CalendarMonth,
    pub label: String,
    pub timestamp: String,
    /// False for pre-tracking months.
    pub tracked: bool,
    /// `None` when the scope has no record for the month.
    pub counts: Option<ClientCounts>,
    pub new_clients: Option<ClientCounts>,
}

/// Project the series onto the selected scope, one point per month.
pub fn selection_series(months: &[MonthBlock], selection: &FilterSelection) -> Vec<MonthPoint> {
    let scope = (selection.namespace.as_deref(), selection.mount.as_deref());
    months
        .iter()
        .map(|month| {
            let (counts, new_clients) = match scope {
                (None, _) => (month.counts, month.new_clients.as_ref().map(|n| n.counts)),
                (Some(ns), None) => (
                    month.namespace(ns).map(|n| n.counts),
                    month.new_clients_for(ns).map(|n| n.counts),
                ),
                (Some(ns), Some(mount)) => (
                    month
                        .namespace(ns)
                        .and_then(|n| n.mount(mount))
                        .map(|m| m.counts),
                    month
                        .new_clients_for(ns)
                        .and_then(|n| n.mount(mount))
                        .map(|m| m.counts),
                ),
            };

            MonthPoint {
                month: month.month,
                label: month.label.clone(),
                timestamp: month.timestamp.clone(),
                tracked: month.is_tracked(),
                counts,
                new_clients,
            }
        })
        .collect()
}

/// Rounded per-field average over the values present; `None` if there are none.
pub fn average<I>(values: I) -> Option<ClientCounts>
where
    I: IntoIterator<Item = ClientCounts>,
{
    let values: Vec<ClientCounts> = values.into_iter().collect();
    if values.is_empty() {
        return None;
    }

    let field_average = |field: CountField| -> Option<u64> {
        let present: Vec<u64> = values.iter().filter_map(|v| v.get(field)).collect();
        if present.is_empty() {
            return None;
        }
        let n = present.len() as u64;
        Some((present.iter().sum::<u64>() + n / 2) / n)
    };

    Some(ClientCounts {
        clients: field_average(CountField::Clients).unwrap_or(0),
        entity_clients: field_average(CountField::EntityClients).unwrap_or(0),
        non_entity_clients: field_average(CountField::NonEntityClients).unwrap_or(0),
        secret_syncs: field_average(CountField::SecretSyncs),
        acme_clients: field_average(CountField::AcmeClients),
    })
}

/// Average monthly totals across months with data.
pub fn average_counts(points: &[MonthPoint]) -> Option<ClientCounts> {
    average(points.iter().filter_map(|p| p.counts))
}

/// Average monthly new clients across months with new-client data.
pub fn average_new_clients(points: &[MonthPoint]) -> Option<ClientCounts> {
    average(points.iter().filter_map(|p| p.new_clients))
}
