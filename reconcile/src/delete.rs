//! Delete implements the delete flow: when an inventory exists, delete
//! exactly its tracked resources (descending weight) then the inventory
//! Secret itself; otherwise fall back to a label-selector scan across every
//! discovered resource kind, per §4.9 "Delete".
use kube::{api::DynamicObject, discovery::Discovery, Client, ResourceExt};
use opm_core::resource::InventoryEntry;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    dynamic,
    error::{Error, Result},
    prune,
};

/// Target identifies the release to delete: by name (with its namespace) or
/// by release id alone. Exactly one must be set; the CLI layer enforces
/// this before constructing a `Target`.
pub struct Target {
    /// Namespace the release lives in.
    pub namespace: String,
    /// Release name, when known.
    pub release_name: Option<String>,
    /// Release UUID, when known directly (`--release-id`).
    pub release_uuid: Option<Uuid>,
}

/// Outcome summarizes one delete run.
#[derive(Debug, Default)]
pub struct Outcome {
    /// Resources deleted.
    pub deleted: Vec<InventoryEntry>,
    /// Whether deletion used the inventory (`true`) or the label-scan
    /// fallback (`false`).
    pub used_inventory: bool,
}

/// Run executes the delete flow for `target`.
#[instrument(skip(client, store, discovery), fields(namespace = %target.namespace))]
pub async fn run(
    client: Client,
    store: &opm_inventory::store::Store,
    discovery: &Discovery,
    target: Target,
) -> Result<Outcome> {
    if target.release_name.is_none() && target.release_uuid.is_none() {
        return Err(Error::AmbiguousRelease);
    }

    let release_uuid = match target.release_uuid {
        Some(uuid) => uuid,
        None => {
            // Release UUID is a pure function of (fqn, name, namespace); the
            // delete path doesn't have the module fqn, so a name-only
            // target resolves purely through the label-selector fallback
            // inside `Store::get`, which doesn't require the UUID to match
            // a direct name lookup first.
            return delete_by_label_scan(client, discovery, &target.namespace, &target.release_name.unwrap(), None).await;
        }
    };

    match store.get(target.release_name.as_deref(), &release_uuid).await? {
        Some((body, _)) => {
            let entries = body.latest_entries().to_vec();
            let mut deleted = Vec::new();
            let mut failures = Vec::new();
            for entry in prune::sorted_descending(&entries) {
                match dynamic::delete_entry(client.clone(), discovery, entry, &target.namespace).await {
                    Ok(()) => deleted.push(entry.clone()),
                    Err(e) => failures.push(e),
                }
            }
            if !failures.is_empty() {
                return Err(Error::Delete(failures));
            }
            store.delete(&body.metadata.name, &release_uuid).await?;
            info!(count = deleted.len(), "deleted release via inventory");
            Ok(Outcome {
                deleted,
                used_inventory: true,
            })
        }
        None => {
            delete_by_label_scan(
                client,
                discovery,
                &target.namespace,
                target.release_name.as_deref().unwrap_or_default(),
                Some(release_uuid),
            )
            .await
        }
    }
}

async fn delete_by_label_scan(
    client: Client,
    discovery: &Discovery,
    namespace: &str,
    release_name: &str,
    release_uuid: Option<Uuid>,
) -> Result<Outcome> {
    warn!(release_name, "no inventory found, falling back to label-selector discovery");
    let selector = match release_uuid {
        Some(uuid) => format!("{}={uuid}", opm_core::labels::RELEASE_UUID),
        None => format!("{}={release_name}", opm_core::labels::RELEASE_NAME),
    };

    let mut deleted = Vec::new();
    let mut found_any = false;
    for group in discovery.groups() {
        for (ar, caps) in group.recommended_resources() {
            if ar.kind == "Secret" {
                // Skip: avoids deleting a release's own inventory Secret
                // (or unrelated application Secrets) via blind label scan.
                continue;
            }
            if caps.scope != kube::discovery::Scope::Namespaced {
                continue;
            }
            let api: kube::Api<DynamicObject> = kube::Api::namespaced_with(client.clone(), namespace, &ar);
            let list = match api.list(&kube::api::ListParams::default().labels(&selector)).await {
                Ok(list) => list,
                Err(_) => continue,
            };
            for obj in list.items {
                found_any = true;
                let name = obj.name_any();
                if api.delete(&name, &kube::api::DeleteParams::default()).await.is_ok() {
                    deleted.push(InventoryEntry {
                        group: ar.group.clone(),
                        kind: ar.kind.clone(),
                        namespace: namespace.to_string(),
                        name,
                        component: String::new(),
                    });
                }
            }
        }
    }

    if !found_any {
        return Err(Error::NotFound(release_name.to_string()));
    }
    Ok(Outcome {
        deleted,
        used_inventory: false,
    })
}

