//! Events discovers the child objects of OPM-managed resources and reports
//! Kubernetes Events scoped to them, per §4.9 "Discovery for child events":
//! an `ownerReferences` BFS over a small static parent→child table, then an
//! Event list filtered by involved-object UID membership, `--since`, and
//! `--type`.
use std::collections::{BTreeSet, VecDeque};

use k8s_openapi::api::core::v1::Event as CoreEvent;
use kube::{api::DynamicObject, discovery::Discovery, Api, Client, ResourceExt};
use opm_core::resource::{Gvk, InventoryEntry};
use tracing::instrument;

use crate::{dynamic, error::Result};

/// EventType mirrors the two values the Kubernetes API server emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    /// A routine, informational event.
    Normal,
    /// An event worth operator attention.
    Warning,
}

/// Entry is one reported Event.
#[derive(Debug, Clone)]
pub struct Entry {
    /// The involved object's kind.
    pub involved_kind: String,
    /// The involved object's name.
    pub involved_name: String,
    /// `Normal` or `Warning`.
    pub event_type: EventType,
    /// The event's `reason`.
    pub reason: String,
    /// The event's `message`.
    pub message: String,
    /// Unix seconds of the event's last-seen timestamp, used for sorting
    /// and the `--since` filter.
    pub last_seen_unix: i64,
}

/// CHILD_TABLE lists, for each OPM-managed workload kind, the chain of child
/// kinds reachable by following `ownerReferences` downward, grounded in the
/// teacher's `.owns(...)` parent/child registrations (`matchers::controller`,
/// `indexers::controller`) used here for a one-shot lookup.
const CHILD_TABLE: &[(&str, &str, &[(&str, &str, &str)])] = &[
    ("apps", "Deployment", &[("apps", "v1", "ReplicaSet"), ("", "v1", "Pod")]),
    ("apps", "StatefulSet", &[("", "v1", "Pod")]),
    ("apps", "DaemonSet", &[("", "v1", "Pod")]),
    ("batch", "Job", &[("", "v1", "Pod")]),
    ("batch", "CronJob", &[("batch", "v1", "Job"), ("", "v1", "Pod")]),
];

fn child_kinds(group: &str, kind: &str) -> &'static [(&'static str, &'static str, &'static str)] {
    CHILD_TABLE.iter().find(|(g, k, _)| *g == group && *k == kind).map_or(&[], |(_, _, chain)| chain)
}

/// Run collects every Event touching `parents` or their discovered
/// children, filtered by `since_unix` (inclusive, when set) and `type_filter`
/// (when set), sorted ascending by last-seen time.
#[instrument(skip(client, discovery, parents))]
pub async fn run(
    client: Client,
    discovery: &Discovery,
    parents: &[InventoryEntry],
    namespace: &str,
    since_unix: Option<i64>,
    type_filter: Option<EventType>,
) -> Result<Vec<Entry>> {
    let mut uids: BTreeSet<String> = BTreeSet::new();

    for parent in parents {
        collect_uids(client.clone(), discovery, parent, namespace, &mut uids).await;
    }

    let api: Api<CoreEvent> = Api::namespaced(client, namespace);
    let list = api.list(&kube::api::ListParams::default()).await?;

    let mut entries: Vec<Entry> = list
        .items
        .into_iter()
        .filter_map(|ev| {
            let uid = ev.involved_object.uid.clone()?;
            if !uids.contains(&uid) {
                return None;
            }
            let event_type = match ev.type_.as_deref() {
                Some("Warning") => EventType::Warning,
                _ => EventType::Normal,
            };
            if let Some(filter) = type_filter {
                if filter != event_type {
                    return None;
                }
            }
            let last_seen_unix = ev
                .last_timestamp
                .as_ref()
                .map(|t| t.0.as_second())
                .or_else(|| ev.event_time.as_ref().map(|t| t.0.as_second()))
                .unwrap_or(0);
            if let Some(since) = since_unix {
                if last_seen_unix < since {
                    return None;
                }
            }
            Some(Entry {
                involved_kind: ev.involved_object.kind.clone().unwrap_or_default(),
                involved_name: ev.involved_object.name.clone().unwrap_or_default(),
                event_type,
                reason: ev.reason.clone().unwrap_or_default(),
                message: ev.message.clone().unwrap_or_default(),
                last_seen_unix,
            })
        })
        .collect();

    entries.sort_by_key(|e| e.last_seen_unix);
    Ok(entries)
}

async fn collect_uids(client: Client, discovery: &Discovery, parent: &InventoryEntry, namespace: &str, uids: &mut BTreeSet<String>) {
    let parent_namespace = if parent.namespace.is_empty() { namespace } else { &parent.namespace };
    let Ok((ar, scope)) = dynamic::resolve_entry(discovery, parent) else {
        return;
    };
    let api = dynamic::api_for(client.clone(), &ar, scope, parent_namespace);
    let Ok(Some(parent_obj)) = api.get_opt(&parent.name).await else {
        return;
    };
    let parent_uid = parent_obj.uid().unwrap_or_default();
    if parent_uid.is_empty() {
        return;
    }
    uids.insert(parent_uid.clone());

    let mut queue: VecDeque<(BTreeSet<String>, &[(&str, &str, &str)])> = VecDeque::new();
    queue.push_back(([parent_uid].into_iter().collect(), child_kinds(&parent.group, &parent.kind)));

    while let Some((owner_uids, chain)) = queue.pop_front() {
        let Some((group, version, kind)) = chain.first() else { continue };
        let gvk = Gvk::new(*group, *version, *kind);
        let Ok((child_ar, child_scope)) = dynamic::resolve(discovery, &gvk) else {
            continue;
        };
        let child_api = dynamic::api_for(client.clone(), &child_ar, child_scope, parent_namespace);
        let Ok(list) = child_api.list(&kube::api::ListParams::default()).await else {
            continue;
        };

        let mut next_owners = BTreeSet::new();
        for obj in list.items {
            if !is_owned_by(&obj, &owner_uids) {
                continue;
            }
            let uid = obj.uid().unwrap_or_default();
            if uid.is_empty() {
                continue;
            }
            uids.insert(uid.clone());
            next_owners.insert(uid);
        }

        if !next_owners.is_empty() && chain.len() > 1 {
            queue.push_back((next_owners, &chain[1..]));
        }
    }
}

fn is_owned_by(obj: &DynamicObject, owner_uids: &BTreeSet<String>) -> bool {
    obj.owner_references().iter().any(|o| owner_uids.contains(&o.uid))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_kinds_deployment_chain_ends_in_pod() {
        let chain = child_kinds("apps", "Deployment");
        assert_eq!(chain.last(), Some(&("", "v1", "Pod")));
    }

    #[test]
    fn child_kinds_unknown_parent_is_empty() {
        assert!(child_kinds("example.com", "Widget").is_empty());
    }
}
