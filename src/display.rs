//! Output Formatting and Display Management
//!
//! Renders a [`UsageReport`] either as colored terminal text or as a JSON
//! document for programmatic consumption.
//!
//! ## What is shown
//!
//! - The classified state and, when applicable, the out-of-range overlay
//! - The resolved billing window and where its start came from
//! - Totals for the current [`FilterSelection`]
//! - Top attribution (namespaces, or the mounts of the selected namespace)
//! - The month series with averages, or single-month totals when the window
//!   covers one calendar month
//! - Upgrades in the window and the mount attribution caveat
//! - Sources that failed, each tagged with its endpoint
//!
//! States that carry no data (disabled, denied, empty) print only their
//! headline and description.
//!
//! ## JSON Output
//!
//! ```json
//! {
//!   "state": "authorized-with-data",
//!   "states": ["authorized-with-data"],
//!   "window": {"start": "...", "end": "...", "source": "license", "out_of_range": false},
//!   "view": "monthly-trend",
//!   "totals": {"clients": 300, "entity_clients": 200, "non_entity_clients": 100},
//!   "attribution": {"kind": "namespaces", "top": [...]},
//!   "months": [...],
//!   "averages": {"clients": {...}, "new_clients": {...}}
//! }
//! ```

use crate::billing::{BillingPeriod, PeriodSource};
use crate::classifier::ClientCountState;
use crate::config::Config;
use crate::models::{ClientCounts, ReportView, UsageReport};
use crate::months::{average_counts, average_new_clients, MonthPoint};
use crate::ranking::{Attributable, Attribution, FilterSelection};
use colored::Colorize;
use serde_json::{json, Value};
use std::fmt::Write;

pub struct DisplayManager {
    json_pretty: bool,
    timestamp_format: String,
}

impl Default for DisplayManager {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplayManager {
    pub fn new() -> Self {
        Self {
            json_pretty: true,
            timestamp_format: "%Y-%m-%d".to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            json_pretty: config.output.json_pretty,
            timestamp_format: config.output.timestamp_format.clone(),
        }
    }

    pub fn display_report(
        &self,
        report: &UsageReport,
        selection: &FilterSelection,
        limit: usize,
        json_output: bool,
    ) {
        if json_output {
            let output = self.report_json(report, selection, limit);
            self.print_json(&output);
            return;
        }
        print!("{}", self.render_text(report, selection, limit));
    }

    pub fn print_json(&self, value: &Value) {
        let rendered = if self.json_pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        match rendered {
            Ok(json_str) => println!("{}", json_str),
            Err(e) => eprintln!("Error serializing report to JSON: {}", e),
        }
    }

    pub fn report_json(
        &self,
        report: &UsageReport,
        selection: &FilterSelection,
        limit: usize,
    ) -> Value {
        let view = report.view();
        let shows_data = report.state.state.shows_data();
        let points = report.selection_series(selection);

        let (months, averages, single_month) = match (shows_data, view) {
            (false, _) => (Value::Null, Value::Null, Value::Null),
            (true, ReportView::MonthlyTrend) => (
                json!(points),
                json!({
                    "clients": average_counts(&points),
                    "new_clients": average_new_clients(&points),
                }),
                Value::Null,
            ),
            (true, ReportView::SingleMonth) => (
                Value::Null,
                Value::Null,
                json!({"new_clients": points.iter().rev().find_map(|p| p.new_clients)}),
            ),
        };

        let (totals, attribution) = if shows_data {
            (
                json!(report.selection_totals(selection)),
                json!(report.attribution(selection, limit)),
            )
        } else {
            (Value::Null, Value::Null)
        };

        let source_errors: Vec<Value> = report
            .source_errors
            .iter()
            .map(|e| json!({"endpoint": e.endpoint(), "message": e.to_string(), "error": e}))
            .collect();

        json!({
            "request_id": report.request_id,
            "state": report.state.state,
            "states": report.state.states(),
            "headline": report.state.state.headline(),
            "window": report.resolved_window,
            "view": view,
            "selection": selection,
            "totals": totals,
            "attribution": attribution,
            "months": months,
            "averages": averages,
            "single_month": single_month,
            "upgrades_in_window": report.upgrades_in_window,
            "mount_attribution_caveat": report.mount_attribution_caveat,
            "source_errors": source_errors,
        })
    }

    pub fn render_text(
        &self,
        report: &UsageReport,
        selection: &FilterSelection,
        limit: usize,
    ) -> String {
        let mut out = String::new();
        let state = report.state.state;

        let _ = writeln!(out, "\n{}", "=".repeat(80).bright_cyan());
        let _ = writeln!(out, "{}", state.headline().bright_white().bold());
        let _ = writeln!(out, "{}", "=".repeat(80).bright_cyan());

        if let Some(window) = &report.resolved_window {
            let _ = writeln!(out, "\n{} {}", "📅".bright_blue(), self.window_line(window));
        }
        if report.state.out_of_range_warning {
            let _ = writeln!(
                out,
                "{} {}",
                "⚠".bright_yellow(),
                ClientCountState::OutOfRangeWarning.description().yellow()
            );
        }

        if !state.shows_data() {
            let _ = writeln!(out, "\n{}", state.description());
            self.write_source_errors(&mut out, report);
            return out;
        }

        let _ = writeln!(out, "\n{} {}", "Scope:".bright_white().bold(), scope_label(selection));
        match report.selection_totals(selection) {
            Some(totals) => {
                let _ = writeln!(out, "   {}", counts_line(&totals));
            }
            None => {
                let _ = writeln!(out, "   {}", "No data for this selection".dimmed());
            }
        }

        self.write_attribution(&mut out, &report.attribution(selection, limit));

        let points = report.selection_series(selection);
        match report.view() {
            ReportView::MonthlyTrend => self.write_months(&mut out, &points),
            ReportView::SingleMonth => {
                let new = points.iter().rev().find_map(|p| p.new_clients);
                let _ = writeln!(out, "\n{}", "New clients this month".bright_white().bold());
                match new {
                    Some(counts) => {
                        let _ = writeln!(out, "   {}", counts_line(&counts));
                    }
                    None => {
                        let _ = writeln!(out, "   {}", "No new clients".dimmed());
                    }
                }
            }
        }

        for upgrade in &report.upgrades_in_window {
            let _ = writeln!(
                out,
                "\n{} Upgraded to {} on {}{}",
                "⬆".bright_blue(),
                upgrade.version.bright_white().bold(),
                upgrade.timestamp_installed.format(&self.timestamp_format),
                upgrade
                    .previous_version
                    .as_deref()
                    .map(|p| format!(" (from {p})"))
                    .unwrap_or_default()
            );
        }
        if report.mount_attribution_caveat {
            let _ = writeln!(
                out,
                "{} {}",
                "⚠".bright_yellow(),
                "Mount attribution is incomplete for this date range.".yellow()
            );
        }

        self.write_source_errors(&mut out, report);
        out
    }

    fn window_line(&self, window: &BillingPeriod) -> String {
        let source = match window.source {
            PeriodSource::License => "billing start",
            PeriodSource::ExplicitQuery => "query",
            PeriodSource::Default => "default window",
        };
        format!(
            "{} → {} ({})",
            window.start.format(&self.timestamp_format).to_string().bright_white(),
            window.end.format(&self.timestamp_format).to_string().bright_white(),
            source
        )
    }

    fn write_attribution(&self, out: &mut String, attribution: &Attribution) {
        match attribution {
            Attribution::Namespaces { top } => {
                let _ = writeln!(out, "\n{}", "Top namespaces".bright_white().bold());
                write_ranked(out, top);
            }
            Attribution::Mounts { namespace, top } => {
                let _ = writeln!(
                    out,
                    "\n{} {}",
                    "Top mounts in".bright_white().bold(),
                    namespace.bright_cyan()
                );
                write_ranked(out, top);
            }
            Attribution::MountsUnavailable { namespace } => {
                let _ = writeln!(
                    out,
                    "\n{} {}",
                    "Mount attribution unavailable for".dimmed(),
                    namespace.bright_cyan()
                );
            }
            Attribution::UnknownNamespace { namespace } => {
                let _ = writeln!(
                    out,
                    "\n{} {}",
                    "No namespace named".dimmed(),
                    namespace.bright_cyan()
                );
            }
        }
    }

    fn write_months(&self, out: &mut String, points: &[MonthPoint]) {
        if points.is_empty() {
            return;
        }
        let _ = writeln!(out, "\n{}", "Monthly activity".bright_white().bold());
        for point in points {
            let counts = match (point.tracked, point.counts) {
                (false, _) => "not tracked".dimmed().to_string(),
                (true, None) => "-".dimmed().to_string(),
                (true, Some(c)) => format!("{} clients", c.clients.to_string().bright_white()),
            };
            let new = match point.new_clients {
                Some(c) => format!(", {} new", c.clients.to_string().bright_green()),
                None if point.tracked => ", no new clients".dimmed().to_string(),
                None => String::new(),
            };
            let _ = writeln!(out, "   {:>6}  {}{}", point.label, counts, new);
        }

        if let Some(avg) = average_counts(points) {
            let _ = writeln!(out, "   Average total clients per month: {}", avg.clients);
        }
        if let Some(avg) = average_new_clients(points) {
            let _ = writeln!(out, "   Average new clients per month: {}", avg.clients);
        }
    }

    fn write_source_errors(&self, out: &mut String, report: &UsageReport) {
        for err in &report.source_errors {
            let _ = writeln!(out, "{} {}", "✗".bright_red(), err.to_string().red());
        }
    }
}

fn scope_label(selection: &FilterSelection) -> String {
    match (&selection.namespace, &selection.mount) {
        (None, _) => "all namespaces".to_string(),
        (Some(ns), None) => ns.clone(),
        (Some(ns), Some(mount)) => format!("{ns} › {mount}"),
    }
}

fn counts_line(counts: &ClientCounts) -> String {
    let mut line = format!(
        "{} clients • {} entity • {} non-entity",
        counts.clients.to_string().bright_white().bold(),
        counts.entity_clients,
        counts.non_entity_clients
    );
    if let Some(syncs) = counts.secret_syncs {
        let _ = write!(line, " • {syncs} secret syncs");
    }
    if let Some(acme) = counts.acme_clients {
        let _ = write!(line, " • {acme} ACME");
    }
    line
}

fn write_ranked<T: Attributable>(out: &mut String, ranked: &[T]) {
    let total: u64 = ranked.iter().map(|b| b.counts().clients).sum();
    for block in ranked {
        let clients = block.counts().clients;
        let percentage = if total > 0 {
            clients as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        let _ = writeln!(
            out,
            "   {}: {} ({}%)",
            block.label().bright_cyan(),
            clients.to_string().bright_white(),
            format!("{:.0}", percentage).bright_yellow()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::BillingPeriodResolver;
    use crate::classifier::Classification;
    use crate::models::NamespaceBlock;
    use crate::timestamp_parser::TimestampParser;

    fn counts(clients: u64) -> ClientCounts {
        ClientCounts {
            clients,
            ..Default::default()
        }
    }

    fn report(state: ClientCountState) -> UsageReport {
        let now = TimestampParser::parse("2024-03-04T00:00:00Z").unwrap();
        let window = BillingPeriodResolver::default()
            .resolve(TimestampParser::parse("2023-07-02T00:00:00Z").ok(), None, None, now)
            .unwrap();
        UsageReport {
            request_id: None,
            start_time: None,
            end_time: None,
            total: Some(counts(300)),
            by_namespace: vec![
                NamespaceBlock {
                    id: "root".into(),
                    path: String::new(),
                    label: "root".into(),
                    counts: counts(155),
                    mounts: None,
                },
                NamespaceBlock {
                    id: "a1".into(),
                    path: "ns1/".into(),
                    label: "ns1/".into(),
                    counts: counts(145),
                    mounts: Some(vec![]),
                },
            ],
            by_month: vec![],
            resolved_window: Some(window),
            state: Classification {
                state,
                out_of_range_warning: false,
            },
            upgrades_in_window: vec![],
            mount_attribution_caveat: true,
            source_errors: vec![],
        }
    }

    #[test]
    fn test_json_includes_ranked_attribution() {
        let json = DisplayManager::new().report_json(
            &report(ClientCountState::NoMonthlyHistory),
            &FilterSelection::all(),
            10,
        );
        assert_eq!(json["state"], "no-monthly-history");
        assert_eq!(json["window"]["source"], "license");
        assert_eq!(json["attribution"]["kind"], "namespaces");
        assert_eq!(json["attribution"]["top"][0]["label"], "root");
        assert_eq!(json["totals"]["clients"], 300);
    }

    #[test]
    fn test_json_hides_data_for_empty_states() {
        let json = DisplayManager::new().report_json(
            &report(ClientCountState::TrackingDisabled),
            &FilterSelection::all(),
            10,
        );
        assert_eq!(json["state"], "tracking-disabled");
        assert!(json["totals"].is_null());
        assert!(json["attribution"].is_null());
    }

    #[test]
    fn test_text_lists_namespaces_and_caveat() {
        colored::control::set_override(false);
        let text = DisplayManager::new().render_text(
            &report(ClientCountState::NoMonthlyHistory),
            &FilterSelection::all(),
            10,
        );
        assert!(text.contains("Top namespaces"));
        assert!(text.find("root").unwrap() < text.find("ns1/").unwrap());
        assert!(text.contains("Mount attribution is incomplete"));
    }

    #[test]
    fn test_text_for_unavailable_mounts() {
        colored::control::set_override(false);
        let text = DisplayManager::new().render_text(
            &report(ClientCountState::NoMonthlyHistory),
            &FilterSelection::namespace("root"),
            10,
        );
        assert!(text.contains("Mount attribution unavailable for root"));
    }
}
