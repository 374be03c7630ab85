//! Diff compares a render's resources against live cluster state, per §4.9
//! "Diff flow": GET the live object, project it down to only the fields the
//! rendered object declares (so server-defaulted fields never read as
//! drift), then semantically compare what's left.
use kube::{api::DynamicObject, discovery::Discovery, Client};
use opm_core::resource::Resource;
use serde_json::Value;
use tracing::instrument;

use crate::{dynamic, error::Result};

/// Status categorizes one resource's diff result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Present on cluster but no longer declared by the current render.
    Orphaned,
    /// Not present on cluster yet.
    Added,
    /// Present on both sides but with differing declared-field values.
    Modified,
    /// Present on both sides and identical on every declared field.
    Unchanged,
}

/// Entry is one resource's diff outcome.
#[derive(Debug, Clone)]
pub struct Entry {
    /// The resource's kind.
    pub kind: String,
    /// The resource's namespace, empty if cluster-scoped.
    pub namespace: String,
    /// The resource's name.
    pub name: String,
    /// The categorized diff status.
    pub status: Status,
    /// The declared fields as rendered, projected down from the live object
    /// when present (`None` for [`Status::Added`]).
    pub live: Option<Value>,
    /// The rendered object's declared fields.
    pub declared: Value,
}

/// Run diffs every resource in `resources` against live cluster state, plus
/// every `previous` inventory entry absent from `resources` (reported as
/// [`Status::Orphaned`]).
#[instrument(skip(client, discovery, resources, previous))]
pub async fn run(
    client: Client,
    discovery: &Discovery,
    resources: &[Resource],
    previous: &[opm_core::resource::InventoryEntry],
    default_namespace: &str,
) -> Result<Vec<Entry>> {
    let mut entries = Vec::with_capacity(resources.len());
    let current: std::collections::BTreeSet<_> = resources
        .iter()
        .map(|r| opm_core::resource::InventoryEntry::from_resource(r).k8s_identity())
        .collect();

    for resource in resources {
        entries.push(diff_one(client.clone(), discovery, resource, default_namespace).await?);
    }

    for entry in previous {
        if current.contains(&entry.k8s_identity()) {
            continue;
        }
        entries.push(Entry {
            kind: entry.kind.clone(),
            namespace: entry.namespace.clone(),
            name: entry.name.clone(),
            status: Status::Orphaned,
            live: None,
            declared: Value::Null,
        });
    }

    Ok(entries)
}

async fn diff_one(client: Client, discovery: &Discovery, resource: &Resource, default_namespace: &str) -> Result<Entry> {
    let namespace = resource.namespace.as_deref().unwrap_or(default_namespace);
    let kind = resource.gvk.kind.clone();
    let name = resource.name.clone();

    let (ar, scope) = match dynamic::resolve(discovery, &resource.gvk) {
        Ok(v) => v,
        Err(_) => {
            return Ok(Entry {
                kind,
                namespace: namespace.to_string(),
                name,
                status: Status::Added,
                live: None,
                declared: resource.payload.clone(),
            });
        }
    };
    let api = dynamic::api_for(client, &ar, scope, namespace);

    let live: Option<DynamicObject> = api.get_opt(&name).await?;
    match live {
        None => Ok(Entry {
            kind,
            namespace: namespace.to_string(),
            name,
            status: Status::Added,
            live: None,
            declared: resource.payload.clone(),
        }),
        Some(obj) => {
            let live_value = serde_json::to_value(&obj).unwrap_or(Value::Null);
            let projected = project(&live_value, &resource.payload);
            let status = if semantically_equal(&projected, &resource.payload) {
                Status::Unchanged
            } else {
                Status::Modified
            };
            Ok(Entry {
                kind,
                namespace: namespace.to_string(),
                name,
                status,
                live: Some(projected),
                declared: resource.payload.clone(),
            })
        }
    }
}

/// Project keeps only the keys present in `declared`, recursively, so
/// server-populated fields (status, defaulted spec fields, managedFields,
/// resourceVersion, ...) never show up as drift.
fn project(live: &Value, declared: &Value) -> Value {
    match (live, declared) {
        (Value::Object(live_map), Value::Object(declared_map)) => {
            let mut out = serde_json::Map::new();
            for key in declared_map.keys() {
                if let Some(live_value) = live_map.get(key) {
                    out.insert(key.clone(), project(live_value, &declared_map[key]));
                }
            }
            Value::Object(out)
        }
        (Value::Array(live_items), Value::Array(declared_items)) => {
            let out: Vec<Value> = live_items
                .iter()
                .zip(declared_items.iter())
                .map(|(l, d)| project(l, d))
                .collect();
            Value::Array(out)
        }
        (live_leaf, _) => live_leaf.clone(),
    }
}

fn semantically_equal(a: &Value, b: &Value) -> bool {
    a == b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_drops_undeclared_fields() {
        let live = serde_json::json!({
            "metadata": {"name": "web", "resourceVersion": "123", "uid": "abc"},
            "spec": {"replicas": 3, "strategy": {"type": "RollingUpdate"}},
            "status": {"readyReplicas": 3},
        });
        let declared = serde_json::json!({
            "metadata": {"name": "web"},
            "spec": {"replicas": 3},
        });
        let projected = project(&live, &declared);
        assert_eq!(
            projected,
            serde_json::json!({"metadata": {"name": "web"}, "spec": {"replicas": 3}})
        );
    }

    #[test]
    fn project_then_compare_flags_drift() {
        let live = serde_json::json!({"spec": {"replicas": 5}});
        let declared = serde_json::json!({"spec": {"replicas": 3}});
        let projected = project(&live, &declared);
        assert!(!semantically_equal(&projected, &declared));
    }
}
