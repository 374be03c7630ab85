//! Output formats reconcile results for the terminal: `comfy-table` for
//! `table`/`wide`, `serde_json`/`serde_yaml` for `json`/`yaml`, per §4.10.
use comfy_table::{presets::UTF8_FULL, Table};
use opm_reconcile::diff::{Entry as DiffEntry, Status as DiffStatus};
use opm_reconcile::events::{Entry as EventEntry, EventType};
use opm_reconcile::status::{Entry as StatusEntry, Health};
use serde::Serialize;

use crate::{cli::OutputFormat, error::Result};

fn health_str(h: Health) -> &'static str {
    match h {
        Health::Ready => "Ready",
        Health::NotReady => "NotReady",
        Health::Unknown => "Unknown",
    }
}

fn diff_status_str(s: DiffStatus) -> &'static str {
    match s {
        DiffStatus::Modified => "Modified",
        DiffStatus::Added => "Added",
        DiffStatus::Orphaned => "Orphaned",
        DiffStatus::Unchanged => "Unchanged",
    }
}

fn event_type_str(t: EventType) -> &'static str {
    match t {
        EventType::Normal => "Normal",
        EventType::Warning => "Warning",
    }
}

#[derive(Serialize)]
struct StatusRow<'a> {
    kind: &'a str,
    namespace: &'a str,
    name: &'a str,
    health: &'static str,
    detail: Option<&'a str>,
}

/// Status_report renders a status report in `format`.
pub fn status_report(entries: &[StatusEntry], format: OutputFormat) -> Result<String> {
    let rows: Vec<StatusRow<'_>> = entries
        .iter()
        .map(|e| StatusRow {
            kind: &e.kind,
            namespace: &e.namespace,
            name: &e.name,
            health: health_str(e.health),
            detail: e.detail.as_deref(),
        })
        .collect();

    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&rows)?),
        OutputFormat::Yaml => Ok(serde_yaml::to_string(&rows)?),
        OutputFormat::Table => {
            let mut table = Table::new();
            table.load_preset(UTF8_FULL).set_header(vec!["KIND", "NAME", "HEALTH"]);
            for e in &rows {
                table.add_row(vec![e.kind, e.name, e.health]);
            }
            Ok(table.to_string())
        }
        OutputFormat::Wide => {
            let mut table = Table::new();
            table.load_preset(UTF8_FULL).set_header(vec!["KIND", "NAMESPACE", "NAME", "HEALTH", "DETAIL"]);
            for e in &rows {
                table.add_row(vec![e.kind, e.namespace, e.name, e.health, e.detail.unwrap_or("")]);
            }
            Ok(table.to_string())
        }
    }
}

/// Diff_report renders a diff report as a table (diff has no JSON/YAML mode
/// in §6's CLI surface).
pub fn diff_report(entries: &[DiffEntry]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec!["STATUS", "KIND", "NAMESPACE", "NAME"]);
    for e in entries {
        table.add_row(vec![diff_status_str(e.status), e.kind.as_str(), e.namespace.as_str(), e.name.as_str()]);
    }
    table.to_string()
}

/// Events_report renders an events report as a table, ascending by the
/// order `events::run` already sorted them in.
pub fn events_report(entries: &[EventEntry]) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["TYPE", "INVOLVED", "REASON", "MESSAGE"]);
    for e in entries {
        table.add_row(vec![
            event_type_str(e.event_type).to_string(),
            format!("{}/{}", e.involved_kind, e.involved_name),
            e.reason.clone(),
            e.message.clone(),
        ]);
    }
    table.to_string()
}
