//! Client Count Analysis Engine
//!
//! This module joins the independent source responses into a single
//! [`UsageReport`]. It is the only place that knows about every stage of the
//! pipeline; each stage below it is a pure function over immutable inputs.
//!
//! ## Pipeline
//!
//! 1. **Sources**: activity, config, license and version history, each already
//!    resolved to a [`Fetched`] value
//! 2. **Billing window**: [`BillingPeriodResolver`] picks `[start, end]` from the
//!    license start, an explicit query range, or the default window
//! 3. **Normalization**: totals, namespaces and months pass through
//!    [`crate::normalizer`] and [`crate::months`]
//! 4. **Ranking**: namespaces are kept in full, sorted by clients
//! 5. **Version history**: notable upgrades inside the window, and whether mount
//!    attribution is incomplete
//! 6. **Classification**: [`crate::classifier::classify`] chooses the UI state
//!
//! A failure in one source is recorded in [`UsageReport::source_errors`] and the
//! remaining sources are still used.
//!
//! ## Usage Example
//!
//! ```rust
//! use client_counts::{ClientCountAnalyzer, CapturePaths, ReportQuery};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let analyzer = ClientCountAnalyzer::default();
//! let paths = CapturePaths {
//!     activity: Some("activity.json".into()),
//!     ..Default::default()
//! };
//!
//! let report = analyzer.load_report(&paths, &ReportQuery::at(chrono::Utc::now())).await;
//! println!("{}", report.state.state);
//! # Ok(())
//! # }
//! ```

use crate::billing::{
    BillingPeriod, BillingPeriodResolver, QueryRange, DEFAULT_REPORT_MONTHS, REPORT_MONTHS_RANGE,
};
use crate::classifier::{classify, ClassifierInputs, ConfigSignal, ReportShape};
use crate::config::{get_config, Config};
use crate::error::{Endpoint, Error, Result};
use crate::logging::report_span;
use crate::models::{
    ActivityConfig, ActivityResponse, ClientCounts, MonthBlock, NamespaceBlock, UsageReport,
};
use crate::months::build_series;
use crate::normalizer::{normalize, normalize_namespaces};
use crate::ranking::{self, DEFAULT_LIMIT};
use crate::sources::{load_sources, CapturePaths, Fetched, SourceSet};
use crate::timestamp_parser::TimestampParser;
use crate::version_history::{self, VersionUpgrade};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Knobs that do not vary per request.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportSettings {
    /// Entries shown as top attribution.
    pub top_limit: usize,
    /// Window length when neither a license start nor a range is known.
    pub default_report_months: u32,
    /// Earliest instant for which client counts exist.
    pub counts_floor: Option<DateTime<Utc>>,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            top_limit: DEFAULT_LIMIT,
            default_report_months: DEFAULT_REPORT_MONTHS,
            counts_floor: None,
        }
    }
}

impl ReportSettings {
    pub fn from_config(config: &Config) -> Self {
        let counts_floor = match config.counts_floor() {
            Ok(floor) => floor,
            Err(e) => {
                warn!(error = %e, "Ignoring unparseable counts floor");
                None
            }
        };
        Self {
            top_limit: config.report.top_limit,
            default_report_months: config.report.default_report_months,
            counts_floor,
        }
    }
}

/// Per-request parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportQuery {
    pub explicit: Option<QueryRange>,
    pub now: DateTime<Utc>,
    /// Overrides [`ReportSettings::counts_floor`] when set.
    pub counts_floor: Option<DateTime<Utc>>,
}

impl ReportQuery {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            explicit: None,
            now,
            counts_floor: None,
        }
    }

    pub fn with_range(mut self, range: QueryRange) -> Self {
        self.explicit = Some(range);
        self
    }

    pub fn with_counts_floor(mut self, floor: DateTime<Utc>) -> Self {
        self.counts_floor = Some(floor);
        self
    }
}

/// Activity after normalization, before ranking and classification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedActivity {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub total: Option<ClientCounts>,
    /// In backend order.
    pub by_namespace: Vec<NamespaceBlock>,
    /// Chronological.
    pub by_month: Vec<MonthBlock>,
}

/// Normalize every counts object in an activity response.
///
/// `Ok(None)` for a response that carries no `data`.
pub fn normalize_activity(response: &ActivityResponse) -> Result<Option<NormalizedActivity>> {
    let Some(data) = response.data.as_ref() else {
        return Ok(None);
    };

    let parse_time = |value: &Option<String>| {
        value
            .as_deref()
            .map(TimestampParser::parse)
            .transpose()
    };

    Ok(Some(NormalizedActivity {
        request_id: response.request_id.clone(),
        start_time: parse_time(&data.start_time)?,
        end_time: parse_time(&data.end_time)?,
        total: data.total.as_ref().map(normalize).transpose()?,
        by_namespace: normalize_namespaces(data.by_namespace.as_deref().unwrap_or_default())?,
        by_month: build_series(data.months.as_deref().unwrap_or_default())?,
    }))
}

pub struct ClientCountAnalyzer {
    settings: ReportSettings,
}

impl Default for ClientCountAnalyzer {
    fn default() -> Self {
        Self::with_settings(ReportSettings::default())
    }
}

impl ClientCountAnalyzer {
    /// An analyzer configured from the global [`Config`].
    pub fn new() -> Self {
        Self::with_settings(ReportSettings::from_config(get_config()))
    }

    pub fn with_settings(settings: ReportSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ReportSettings {
        &self.settings
    }

    /// Load every capture concurrently and build the report.
    pub async fn load_report(&self, paths: &CapturePaths, query: &ReportQuery) -> UsageReport {
        let sources = load_sources(paths).await;
        self.build_report(&sources, query)
    }

    pub fn build_report(&self, sources: &SourceSet, query: &ReportQuery) -> UsageReport {
        let span = report_span();
        let _enter = span.enter();

        let mut errors = sources.errors();

        let config = sources.config.data().map(|response| &response.data);
        let license_start = self.license_start(sources, &mut errors);
        let window = self.resolve_window(config, license_start, query, &mut errors);

        let activity = match &sources.activity {
            Fetched::Data(response) => match normalize_activity(response) {
                Ok(activity) => activity,
                Err(e) => {
                    let err = e.for_endpoint(Endpoint::Activity);
                    warn!(error = %err, "Discarding activity response");
                    errors.push(err);
                    None
                }
            },
            Fetched::NoData | Fetched::Failed(_) => None,
        };

        let upgrades = self.upgrades(sources, window.as_ref(), &mut errors);

        let (request_id, start_time, end_time, total, by_namespace, by_month) = match activity {
            Some(a) => (
                a.request_id,
                a.start_time,
                a.end_time,
                a.total,
                ranking::sort_by_clients(&a.by_namespace),
                a.by_month,
            ),
            None => (None, None, None, None, Vec::new(), Vec::new()),
        };

        let mount_attribution_caveat = version_history::mount_attribution_upgrade(&upgrades)
            .is_some()
            || by_namespace.iter().any(|ns| !ns.has_mount_attribution());

        let report_present = matches!(&sources.activity, Fetched::Data(_))
            && (total.is_some() || !by_namespace.is_empty() || !by_month.is_empty());

        let inputs = ClassifierInputs {
            config: config.map(ConfigSignal::from),
            report: report_present
                .then(|| ReportShape::from_parts(total.as_ref(), &by_namespace, &by_month)),
            permission_errors: errors
                .iter()
                .filter(|e| e.is_permission_denied())
                .filter_map(Error::endpoint)
                .collect::<BTreeSet<_>>(),
            billing_start_known: license_start.is_some() || query.explicit.is_some(),
            out_of_range: window.map(|w| w.out_of_range).unwrap_or(false),
        };
        let state = classify(&inputs);

        info!(
            state = %state.state,
            out_of_range = state.out_of_range_warning,
            namespaces = by_namespace.len(),
            months = by_month.len(),
            source_errors = errors.len(),
            "Built client count report"
        );

        UsageReport {
            request_id,
            start_time,
            end_time,
            total,
            by_namespace,
            by_month,
            resolved_window: window,
            state,
            upgrades_in_window: upgrades,
            mount_attribution_caveat,
            source_errors: errors,
        }
    }

    fn license_start(&self, sources: &SourceSet, errors: &mut Vec<Error>) -> Option<DateTime<Utc>> {
        let license = sources.license.data()?.effective()?;
        match TimestampParser::parse(&license.start_time) {
            Ok(start) => Some(start),
            Err(e) => {
                errors.push(e.for_endpoint(Endpoint::License));
                None
            }
        }
    }

    fn resolve_window(
        &self,
        config: Option<&ActivityConfig>,
        license_start: Option<DateTime<Utc>>,
        query: &ReportQuery,
        errors: &mut Vec<Error>,
    ) -> Option<BillingPeriod> {
        let months = match config.and_then(|c| c.default_report_months) {
            Some(months) if REPORT_MONTHS_RANGE.contains(&months) => months,
            Some(months) => {
                let err = Error::malformed(
                    Endpoint::Config,
                    format!(
                        "default_report_months {months} is outside {}..={}",
                        REPORT_MONTHS_RANGE.start(),
                        REPORT_MONTHS_RANGE.end()
                    ),
                );
                warn!(error = %err, "Ignoring backend report length");
                errors.push(err);
                self.settings.default_report_months
            }
            None => self.settings.default_report_months,
        };
        let resolver = BillingPeriodResolver::new(months);
        let floor = query.counts_floor.or(self.settings.counts_floor);

        match resolver.resolve(license_start, query.explicit, floor, query.now) {
            Ok(window) => Some(window),
            Err(e) => {
                warn!(error = %e, "Falling back to the default billing window");
                errors.push(e);
                resolver.resolve(license_start, None, floor, query.now).ok()
            }
        }
    }

    fn upgrades(
        &self,
        sources: &SourceSet,
        window: Option<&BillingPeriod>,
        errors: &mut Vec<Error>,
    ) -> Vec<VersionUpgrade> {
        let (Some(response), Some(window)) = (sources.version_history.data(), window) else {
            return Vec::new();
        };
        match version_history::parse(response) {
            Ok(entries) => {
                let upgrades = version_history::upgrades_in_window(&entries, window);
                debug!(upgrades = upgrades.len(), "Checked version history");
                upgrades
            }
            Err(e) => {
                errors.push(e);
                Vec::new()
            }
        }
    }
}
