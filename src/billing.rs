//! Billing Period Resolver
//!
//! Decides the `[start, end]` window a report covers. Runs before the activity
//! fetch (to build query parameters) and again when rendering the window.
//!
//! Month boundaries are UTC calendar months; see [`CalendarMonth`].

use crate::error::{Error, Result};
use crate::timestamp_parser::CalendarMonth;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::ops::RangeInclusive;
use tracing::{debug, warn};

/// Backend default for how many months a report spans without a license start.
pub const DEFAULT_REPORT_MONTHS: u32 = 12;

/// Accepted range for a report length in months, wherever it comes from.
pub const REPORT_MONTHS_RANGE: RangeInclusive<u32> = 1..=120;

/// Where a window's start came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PeriodSource {
    /// Start of the month the license (billing period) began.
    License,
    /// A month range the caller asked for.
    ExplicitQuery,
    /// No license start was available; the backend's default window.
    Default,
}

/// An inclusive month range chosen by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueryRange {
    pub start: CalendarMonth,
    pub end: CalendarMonth,
}

impl QueryRange {
    pub fn new(start: CalendarMonth, end: CalendarMonth) -> Self {
        Self { start, end }
    }

    pub fn single(month: CalendarMonth) -> Self {
        Self::new(month, month)
    }
}

/// The resolved reporting window. Computed once per report and never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BillingPeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub source: PeriodSource,
    /// The explicit query started before counts were tracked and was clamped.
    pub out_of_range: bool,
}

impl BillingPeriod {
    pub fn start_month(&self) -> CalendarMonth {
        CalendarMonth::containing(self.start)
    }

    pub fn end_month(&self) -> CalendarMonth {
        CalendarMonth::containing(self.end)
    }

    pub fn is_single_month(&self) -> bool {
        self.start_month() == self.end_month()
    }

    /// Inclusive, in calendar months.
    pub fn span_months(&self) -> u32 {
        let (s, e) = (self.start_month(), self.end_month());
        let diff = (e.year() - s.year()) * 12 + e.month() as i32 - s.month() as i32;
        diff.max(0) as u32 + 1
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BillingPeriodResolver {
    default_report_months: u32,
}

impl Default for BillingPeriodResolver {
    fn default() -> Self {
        Self::new(DEFAULT_REPORT_MONTHS)
    }
}

impl BillingPeriodResolver {
    /// `default_report_months` is clamped into [`REPORT_MONTHS_RANGE`].
    pub fn new(default_report_months: u32) -> Self {
        Self {
            default_report_months: default_report_months
                .clamp(*REPORT_MONTHS_RANGE.start(), *REPORT_MONTHS_RANGE.end()),
        }
    }

    /// Resolve the reporting window.
    ///
    /// - No explicit range: `[start-of-month(license_start), now]`, or the
    ///   default window ending now when no license start is known.
    /// - Explicit range: from the first instant of its start month to the last
    ///   instant of its end month. A start before `counts_floor` is clamped to
    ///   the floor and flagged as out of range.
    pub fn resolve(
        &self,
        license_start: Option<DateTime<Utc>>,
        explicit: Option<QueryRange>,
        counts_floor: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<BillingPeriod> {
        let period = match explicit {
            Some(range) => Self::resolve_explicit(range, counts_floor)?,
            None => self.resolve_default(license_start, now),
        };

        debug!(
            start = %period.start,
            end = %period.end,
            source = ?period.source,
            out_of_range = period.out_of_range,
            "Resolved billing period"
        );
        Ok(period)
    }

    fn resolve_explicit(
        range: QueryRange,
        counts_floor: Option<DateTime<Utc>>,
    ) -> Result<BillingPeriod> {
        if range.start > range.end {
            return Err(Error::InvalidRange {
                start: range.start.to_string(),
                end: range.end.to_string(),
            });
        }

        let mut start = range.start.first_instant();
        let mut end = range.end.last_instant();
        let mut out_of_range = false;

        if let Some(floor) = counts_floor {
            if start < floor {
                warn!(
                    requested_start = %start,
                    counts_floor = %floor,
                    "Query starts before client counts were tracked, clamping"
                );
                start = floor;
                out_of_range = true;
                // A range entirely before the floor still shows the first tracked month.
                end = end.max(CalendarMonth::containing(floor).last_instant());
            }
        }

        Ok(BillingPeriod {
            start,
            end,
            source: PeriodSource::ExplicitQuery,
            out_of_range,
        })
    }

    fn resolve_default(
        &self,
        license_start: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> BillingPeriod {
        let (start, source) = match license_start {
            Some(license) => (
                CalendarMonth::containing(license).first_instant(),
                PeriodSource::License,
            ),
            None => {
                let back = 1 - self.default_report_months as i32;
                (
                    CalendarMonth::containing(now).add_months(back).first_instant(),
                    PeriodSource::Default,
                )
            }
        };

        BillingPeriod {
            start,
            end: now.max(start),
            source,
            out_of_range: false,
        }
    }
}
