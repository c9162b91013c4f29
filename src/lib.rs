//! Client Counts Library
//!
//! Turns the versioned client-count telemetry a secrets backend emits into a
//! canonical, ranked and classified [`UsageReport`] for usage dashboards.
//!
//! ## Core Features
//!
//! - **Schema normalization**: deprecated counter names are rewritten once, at
//!   the boundary, through a single rename table
//! - **Month rollups**: chronological series that keep pre-tracking months as
//!   explicit gaps rather than zeros
//! - **Attribution ranking**: stable top-N ranking of namespaces and mounts
//! - **Billing windows**: license, explicit-query and default windows with
//!   clamping to the earliest tracked month
//! - **Response classification**: one of a closed set of UI states, chosen by
//!   an ordered policy table
//!
//! ## Architecture Overview
//!
//! - [`models`] - Raw wire shapes and canonical value objects
//! - [`normalizer`] - Field renames and counter validation
//! - [`months`] - Month series, per-selection projections and averages
//! - [`ranking`] - Attribution ranking and [`FilterSelection`] totals
//! - [`billing`] - Billing period resolution
//! - [`classifier`] - Response classification
//! - [`version_history`] - Upgrade detection inside the billing window
//! - [`sources`] - Per-endpoint fetch outcomes and captured responses
//! - [`analyzer`] - Joins the sources into a report
//! - [`display`] - Terminal and JSON output
//! - [`config`] - Configuration management with environment variable support
//! - [`logging`] - Structured logging with JSON and pretty-print formats
//!
//! ## Main Entry Point
//!
//! ```rust
//! use client_counts::{ClientCountAnalyzer, ReportQuery, SourceSet};
//!
//! let analyzer = ClientCountAnalyzer::default();
//! let report = analyzer.build_report(&SourceSet::default(), &ReportQuery::at(chrono::Utc::now()));
//! assert_eq!(report.state.state.as_str(), "no-data-tracking-enabled");
//! ```

pub mod analyzer;
pub mod billing;
pub mod classifier;
pub mod config;
pub mod display;
pub mod error;
pub mod logging;
pub mod models;
pub mod months;
pub mod normalizer;
pub mod ranking;
pub mod sources;
pub mod timestamp_parser;
pub mod version_history;

pub use analyzer::{ClientCountAnalyzer, ReportQuery, ReportSettings};
pub use billing::{BillingPeriod, BillingPeriodResolver, PeriodSource, QueryRange};
pub use classifier::{classify, Classification, ClientCountState};
pub use error::{Endpoint, Error};
pub use models::*;
pub use ranking::{rank, Attribution, FilterSelection};
pub use sources::{CapturePaths, Fetched, SourceSet};
