//! Rendering of reconciliation results
//!
//! Two renditions of the same [`FleetReconciliationResult`]:
//!
//! - [`ReportFormatter::detailed`]: the full report, for email and the change log
//! - [`ReportFormatter::summary`]: one short line per source, for SMS
//!
//! Rendering is pure; callers decide where the text goes.

use std::fmt::Write;

use crate::reconciler::{FleetReconciliationResult, SourceReport};
use crate::source_state::format_delta;

/// Context printed at the top of a detailed report
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportHeader {
    pub server_url: String,
    pub server_version: Option<String>,
}

impl ReportHeader {
    /// A blank version counts as unknown
    pub fn new(server_url: impl Into<String>, server_version: Option<String>) -> Self {
        Self {
            server_url: server_url.into(),
            server_version: server_version.filter(|v| !v.trim().is_empty()),
        }
    }
}

/// Renders reconciliation results as text
#[derive(Debug, Clone, Default)]
pub struct ReportFormatter {
    header: ReportHeader,
}

impl ReportFormatter {
    pub fn new(header: ReportHeader) -> Self {
        Self { header }
    }

    /// Full multi-section report
    ///
    /// Returns an empty string when the result has no changes.
    pub fn detailed(&self, result: &FleetReconciliationResult) -> String {
        let mut out = String::new();
        if !result.has_changes() {
            return out;
        }

        let _ = write!(out, "Channels DVR server: {}", self.header.server_url);
        if let Some(version) = &self.header.server_version {
            let _ = write!(out, " (version {})", version);
        }
        out.push_str("\n\n");

        for name in &result.deleted_sources {
            let _ = writeln!(out, "====== Deleted source: {} ======\n", name);
        }

        for source in result.reportable_sources() {
            if source.is_new {
                render_new_source(&mut out, source);
            } else {
                render_changed_source(&mut out, source);
            }
        }

        out
    }

    /// Condensed report, one line per source
    ///
    /// Source names are shortened to their first word to fit length-limited
    /// channels such as SMS.
    pub fn summary(&self, result: &FleetReconciliationResult) -> String {
        let mut lines = Vec::new();

        for name in &result.deleted_sources {
            lines.push(format!("{}: deleted", short_name(name)));
        }

        for source in result.reportable_sources() {
            let count = source.diff.channel_count;
            if source.is_new {
                lines.push(format!("{}: new, {}", short_name(&source.name), count));
            } else {
                lines.push(format!(
                    "{}: {} ({})",
                    short_name(&source.name),
                    count,
                    format_delta(source.diff.count_delta)
                ));
            }
        }

        lines.join("\n")
    }
}

fn short_name(name: &str) -> &str {
    name.split_whitespace().next().unwrap_or(name)
}

fn render_source_title(out: &mut String, title: &str, source: &SourceReport) {
    let _ = writeln!(out, "====== {} ======", title);
    if let Some(url) = &source.source_url {
        let _ = writeln!(out, "URL: {}", url);
    }
    out.push('\n');
}

fn render_new_source(out: &mut String, source: &SourceReport) {
    render_source_title(out, &format!("New source: {}", source.name), source);

    for record in source.lineup.records() {
        let _ = writeln!(out, "    {} : {}", record.number, record.name);
    }
    if !source.lineup.is_empty() {
        out.push('\n');
    }

    let _ = writeln!(out, "Channel count: {}\n", source.diff.channel_count);
}

fn render_changed_source(out: &mut String, source: &SourceReport) {
    let diff = &source.diff;
    render_source_title(out, &source.name, source);

    if !diff.removed_by_number.is_empty()
        || !diff.added_by_number.is_empty()
        || !diff.modified_by_number.is_empty()
    {
        out.push_str("--- By number ---\n");
        for record in diff.removed_by_number.values() {
            let _ = writeln!(out, "  - {} : {}", record.number, record.name);
        }
        for record in diff.added_by_number.values() {
            let _ = writeln!(out, "  + {} : {}", record.number, record.name);
        }
        for (number, (old, new)) in &diff.modified_by_number {
            let _ = writeln!(out, "  * {} : {} -> {}", number, old.name, new.name);
        }
        out.push('\n');
    }

    if !diff.removed_by_name.is_empty() || !diff.added_by_name.is_empty() {
        out.push_str("--- By name ---\n");
        for name in diff.removed_by_name.keys() {
            let _ = writeln!(out, "  - {}", name);
        }
        for name in diff.added_by_name.keys() {
            let _ = writeln!(out, "  + {}", name);
        }
        out.push('\n');
    }

    if !diff.duplicates.is_empty() {
        out.push_str("--- Duplicates ---\n");
        for (name, numbers) in &diff.duplicates {
            let numbers: Vec<&str> = numbers.iter().map(|n| n.as_str()).collect();
            let _ = writeln!(out, "  {} : {}", name, numbers.join(", "));
        }
        out.push('\n');
    }

    let _ = writeln!(
        out,
        "Channel count: {} ({})\n",
        diff.channel_count,
        format_delta(diff.count_delta)
    );
}
