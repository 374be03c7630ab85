//! Status evaluates cluster health for every resource tracked by a
//! release's inventory, per §4.9 "Status flow" 's kind-category table, and
//! drives the `--watch` 2-second polling loop.
use std::time::Duration;

use kube::{api::DynamicObject, discovery::Discovery, Client};
use opm_core::resource::InventoryEntry;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{instrument, trace};

use crate::{dynamic, error::Result};

/// Health is one resource's evaluated health state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    /// The resource satisfies its category's readiness rule.
    Ready,
    /// The resource exists but does not yet satisfy its readiness rule.
    NotReady,
    /// The resource could not be evaluated (e.g. missing on cluster).
    Unknown,
}

/// Entry is one resource's status report.
#[derive(Debug, Clone)]
pub struct Entry {
    /// Kind.
    pub kind: String,
    /// Namespace, empty if cluster-scoped.
    pub namespace: String,
    /// Name.
    pub name: String,
    /// Evaluated health.
    pub health: Health,
    /// Human-readable detail, e.g. the unmet condition's reason/message.
    pub detail: Option<String>,
}

/// Report is one status evaluation's full result.
#[derive(Debug, Clone, Default)]
pub struct Report {
    /// Per-resource entries, in inventory order.
    pub entries: Vec<Entry>,
}

impl Report {
    /// Exit_code maps this report to the CLI exit code table: 0 when every
    /// entry is ready, 2 when any entry is NotReady/Unknown, 5 when the
    /// inventory had no entries at all.
    pub fn exit_code(&self) -> i32 {
        if self.entries.is_empty() {
            return 5;
        }
        if self.entries.iter().any(|e| e.health != Health::Ready) {
            return 2;
        }
        0
    }
}

/// Run evaluates health for every `entries` once against the live cluster.
#[instrument(skip(client, discovery, entries))]
pub async fn run(client: Client, discovery: &Discovery, entries: &[InventoryEntry], default_namespace: &str) -> Result<Report> {
    let mut out = Vec::with_capacity(entries.len());
    for entry in entries {
        out.push(evaluate(client.clone(), discovery, entry, default_namespace).await);
    }
    Ok(Report { entries: out })
}

/// Watch polls `run` every two seconds until `cancel` fires, invoking
/// `on_report` after each poll. Returns cleanly (without an error) on
/// cancellation, matching the concurrency model's "long-running loops exit
/// cleanly with status 0 on context cancellation".
pub async fn watch<F>(
    client: Client,
    discovery: &Discovery,
    entries: &[InventoryEntry],
    default_namespace: &str,
    cancel: &CancellationToken,
    mut on_report: F,
) -> Result<()>
where
    F: FnMut(&Report),
{
    let mut interval = tokio::time::interval(Duration::from_secs(2));
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            _ = interval.tick() => {
                let report = run(client.clone(), discovery, entries, default_namespace).await?;
                on_report(&report);
            }
        }
    }
}

async fn evaluate(client: Client, discovery: &Discovery, entry: &InventoryEntry, default_namespace: &str) -> Entry {
    let namespace = if entry.namespace.is_empty() { default_namespace } else { &entry.namespace };
    let base = Entry {
        kind: entry.kind.clone(),
        namespace: namespace.to_string(),
        name: entry.name.clone(),
        health: Health::Unknown,
        detail: None,
    };

    let (ar, scope) = match dynamic::resolve_entry(discovery, entry) {
        Ok(v) => v,
        Err(e) => {
            return Entry {
                detail: Some(e.to_string()),
                ..base
            };
        }
    };
    let api = dynamic::api_for(client, &ar, scope, namespace);
    let obj: Option<DynamicObject> = match api.get_opt(&entry.name).await {
        Ok(v) => v,
        Err(e) => {
            return Entry {
                detail: Some(e.to_string()),
                ..base
            };
        }
    };
    let Some(obj) = obj else {
        return Entry {
            health: Health::NotReady,
            detail: Some("not found".into()),
            ..base
        };
    };

    let value = serde_json::to_value(&obj).unwrap_or(Value::Null);
    evaluate_category(&entry.group, &entry.kind, &value, base)
}

fn evaluate_category(group: &str, kind: &str, obj: &Value, base: Entry) -> Entry {
    match (group, kind) {
        ("apps", "Deployment") | ("apps", "StatefulSet") | ("apps", "DaemonSet") => condition_health(obj, "Ready", base),
        ("batch", "Job") => condition_health(obj, "Complete", base),
        ("batch", "CronJob") => Entry { health: Health::Ready, detail: None, ..base },
        ("", "ConfigMap") | ("", "Secret") | ("", "Service") | ("", "PersistentVolumeClaim") => {
            Entry { health: Health::Ready, detail: None, ..base }
        }
        _ => {
            // Custom resources: Ready-if-present-else-passive, per §4.9's
            // "Custom" category.
            if has_conditions(obj) {
                condition_health(obj, "Ready", base)
            } else {
                Entry { health: Health::Ready, detail: None, ..base }
            }
        }
    }
}

fn has_conditions(obj: &Value) -> bool {
    obj.pointer("/status/conditions").is_some()
}

fn condition_health(obj: &Value, condition_type: &str, base: Entry) -> Entry {
    let Some(conditions) = obj.pointer("/status/conditions").and_then(Value::as_array) else {
        return Entry {
            health: Health::Unknown,
            detail: Some("no status.conditions reported yet".to_string()),
            ..base
        };
    };
    let found = conditions.iter().find(|c| c.get("type").and_then(Value::as_str) == Some(condition_type));
    match found {
        Some(c) if c.get("status").and_then(Value::as_str) == Some("True") => Entry { health: Health::Ready, detail: None, ..base },
        Some(c) => {
            let detail = c
                .get("message")
                .and_then(Value::as_str)
                .or_else(|| c.get("reason").and_then(Value::as_str))
                .map(str::to_string);
            Entry { health: Health::NotReady, detail, ..base }
        }
        None => Entry {
            health: Health::Unknown,
            detail: Some(format!("{condition_type} condition not yet reported")),
            ..base
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cronjob_is_always_ready() {
        let e = evaluate_category("batch", "CronJob", &Value::Null, Entry {
            kind: "CronJob".into(),
            namespace: "default".into(),
            name: "nightly".into(),
            health: Health::Unknown,
            detail: None,
        });
        assert_eq!(e.health, Health::Ready);
    }

    #[test]
    fn deployment_ready_condition_true_is_ready() {
        let obj = serde_json::json!({"status": {"conditions": [{"type": "Ready", "status": "True"}]}});
        let e = evaluate_category("apps", "Deployment", &obj, Entry {
            kind: "Deployment".into(),
            namespace: "default".into(),
            name: "web".into(),
            health: Health::Unknown,
            detail: None,
        });
        assert_eq!(e.health, Health::Ready);
    }

    #[test]
    fn deployment_missing_condition_is_unknown() {
        let obj = serde_json::json!({"status": {}});
        let e = evaluate_category("apps", "Deployment", &obj, Entry {
            kind: "Deployment".into(),
            namespace: "default".into(),
            name: "web".into(),
            health: Health::Unknown,
            detail: None,
        });
        assert_eq!(e.health, Health::Unknown);
    }

    #[test]
    fn passive_kinds_are_ready_on_existence() {
        let e = evaluate_category("", "Service", &Value::Null, Entry {
            kind: "Service".into(),
            namespace: "default".into(),
            name: "web".into(),
            health: Health::Unknown,
            detail: None,
        });
        assert_eq!(e.health, Health::Ready);
    }

    #[test]
    fn report_exit_code_empty_is_five() {
        let r = Report::default();
        assert_eq!(r.exit_code(), 5);
    }

    #[test]
    fn report_exit_code_not_ready_is_two() {
        let r = Report {
            entries: vec![Entry {
                kind: "Deployment".into(),
                namespace: "default".into(),
                name: "web".into(),
                health: Health::NotReady,
                detail: None,
            }],
        };
        assert_eq!(r.exit_code(), 2);
    }
}
