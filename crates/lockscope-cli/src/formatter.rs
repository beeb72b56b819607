//! Output formatting for diagnostic reports.
//!
//! Supports table and JSON output formats.

use anyhow::{bail, Context, Result};
use comfy_table::{Cell, ContentArrangement, Table};
use lockscope_txn::{LiveTransactionsReport, PendingLockRequestsReport};
use serde::Serialize;

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Formatted table output.
    Table,
    /// JSON output, exactly as the diagnostic command returns it.
    Json,
}

impl OutputFormat {
    /// Parses a format name from the config file.
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            other => bail!("unknown output format '{other}'"),
        }
    }
}

/// Formats a live transactions report.
pub fn format_live(report: &LiveTransactionsReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => format_json(report),
        OutputFormat::Table => {
            let mut table = new_table();
            table.set_header(vec![
                Cell::new("txn"),
                Cell::new("row locks"),
                Cell::new("boundary keys"),
                Cell::new("first key"),
            ]);
            for txn in &report.transactions {
                let first = txn
                    .row_locks
                    .first()
                    .map(ToString::to_string)
                    .unwrap_or_default();
                table.add_row(vec![
                    Cell::new(txn.id),
                    Cell::new(txn.lock_count()),
                    Cell::new(txn.row_locks.len()),
                    Cell::new(first),
                ]);
            }
            Ok(with_footer(table, report.transactions.len(), "transaction", report.is_truncated()))
        }
    }
}

/// Formats a pending lock requests report.
pub fn format_pending(report: &PendingLockRequestsReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => format_json(report),
        OutputFormat::Table => {
            let mut table = new_table();
            table.set_header(vec![
                Cell::new("key"),
                Cell::new("mode"),
                Cell::new("requester"),
                Cell::new("enqueuedAt"),
            ]);
            for request in &report.requests {
                table.add_row(vec![
                    Cell::new(&request.key),
                    Cell::new(request.mode),
                    Cell::new(request.requester),
                    Cell::new(request.enqueued_at),
                ]);
            }
            Ok(with_footer(table, report.requests.len(), "request", report.is_truncated()))
        }
    }
}

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .set_content_arrangement(ContentArrangement::Dynamic)
        .load_preset(comfy_table::presets::UTF8_FULL)
        .apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS);
    table
}

fn with_footer(table: Table, rows: usize, noun: &str, truncated: bool) -> String {
    let plural = if rows == 1 { "" } else { "s" };
    let suffix = if truncated { ", truncated at size limit" } else { "" };
    format!("{table}\n({rows} {noun}{plural}{suffix})")
}

fn format_json<T: Serialize>(report: &T) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to encode report as JSON")
}
