//! Apply executes the apply flow: digest/change-id, previous-inventory
//! lookup, server-side apply in ascending weight order, prune, and
//! inventory write, per §4.8/§4.9 "Apply".
use chrono::Utc;
use kube::{
    api::{Patch, PatchParams},
    discovery::Discovery,
    Client,
};
use opm_core::resource::{InventoryEntry, Resource};
use opm_inventory::model::{Body, ChangeEntry, ModuleMetadata as InvModuleMetadata, ReleaseMetadata as InvReleaseMetadata};
use opm_render::pipeline::RenderResult;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::{
    dynamic,
    error::{Error, ResourceError, Result},
    prune,
};

const FIELD_MANAGER: &str = "open-platform-model";

/// Options configures one apply run.
#[derive(Debug, Clone, Copy, Default)]
pub struct Options {
    /// Force confirms pruning every previously tracked resource when the
    /// new render produced none.
    pub force: bool,
    /// MaxHistory bounds the inventory's retained change count.
    pub max_history: usize,
}

/// Outcome summarizes one apply run.
#[derive(Debug)]
pub struct Outcome {
    /// Whether this apply was a no-op (change id already at inventory head).
    pub noop: bool,
    /// The computed change id for this render.
    pub change_id: String,
    /// Resources actually applied.
    pub applied: Vec<InventoryEntry>,
    /// Resources pruned because they're no longer produced by the release.
    pub pruned: Vec<InventoryEntry>,
}

/// Run executes the apply algorithm against an already-succeeded
/// [`RenderResult`] (callers must reject a result with non-empty
/// `errors` before calling this).
#[instrument(skip(client, render, store, discovery, cancel), fields(release = %render.release.name))]
pub async fn run(
    client: Client,
    render: &RenderResult,
    store: &opm_inventory::store::Store,
    discovery: &Discovery,
    opts: Options,
    cancel: &CancellationToken,
) -> Result<Outcome> {
    if !render.errors.is_empty() {
        return Err(Error::Apply(
            render
                .errors
                .iter()
                .map(|e| ResourceError {
                    operation: "render",
                    kind: e.transformer.clone(),
                    name: e.component.clone(),
                    cause: e.cause.clone(),
                })
                .collect(),
        ));
    }
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let manifest_digest = opm_inventory::digest::manifest_digest(&render.resources);
    let resolved_values = serde_json::to_string(&render.values).unwrap_or_default();
    let change_id = opm_inventory::digest::change_id(
        &render.module.fqn,
        &render.module.version,
        &resolved_values,
        &manifest_digest,
    );

    let previous = store.get(Some(&render.release.name), &render.release.uuid).await?;
    let previous_entries: Vec<InventoryEntry> = previous
        .as_ref()
        .map(|(body, _)| body.latest_entries().to_vec())
        .unwrap_or_default();

    if let Some((body, _)) = &previous {
        if body.head() == Some(change_id.as_str()) {
            info!(change_id, "apply is a no-op, change already at inventory head");
            return Ok(Outcome {
                noop: true,
                change_id,
                applied: previous_entries,
                pruned: Vec::new(),
            });
        }
    }

    if render.resources.is_empty() && !previous_entries.is_empty() && !opts.force {
        return Err(Error::PruneRequiresForce(previous_entries.len()));
    }

    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let mut applied = Vec::new();
    let mut failures = Vec::new();
    for resource in &render.resources {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        match apply_one(client.clone(), discovery, resource, &render.release.namespace).await {
            Ok(()) => applied.push(InventoryEntry::from_resource(resource)),
            Err(e) => failures.push(e),
        }
    }

    if !failures.is_empty() {
        warn!(failures = failures.len(), "apply accumulated resource failures, skipping inventory write");
        return Err(Error::Apply(failures));
    }

    let current_identities: std::collections::BTreeSet<_> = applied.iter().map(InventoryEntry::k8s_identity).collect();
    let pruned = prune::compute(&previous_entries, &current_identities);

    for entry in prune::sorted_descending(&pruned) {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if let Err(e) = dynamic::delete_entry(client.clone(), discovery, entry, &render.release.namespace).await {
            failures.push(e);
        }
    }
    if !failures.is_empty() {
        return Err(Error::Apply(failures));
    }

    let mut body = previous.map(|(b, _)| b).unwrap_or_else(|| Body {
        metadata: InvReleaseMetadata::new(
            render.release.name.clone(),
            render.release.namespace.clone(),
            render.release.uuid,
            render.release.labels.clone(),
        ),
        module_metadata: InvModuleMetadata {
            name: render.module.name.clone(),
            uuid: None,
            fqn: render.module.fqn.clone(),
            version: render.module.version.clone(),
        },
        index: Vec::new(),
        changes: std::collections::BTreeMap::new(),
    });

    let entry = ChangeEntry {
        module_path: render.module.fqn.clone(),
        module_version: render.module.version.clone(),
        resolved_values: resolved_values.clone(),
        manifest_digest: manifest_digest.clone(),
        timestamp: Utc::now(),
        entries: applied.clone(),
    };
    if body.push_change(change_id.clone(), entry, opts.max_history) {
        store.write(&body).await?;
    }

    debug!(applied = applied.len(), pruned = pruned.len(), "apply complete");
    Ok(Outcome {
        noop: false,
        change_id,
        applied,
        pruned,
    })
}

async fn apply_one(client: Client, discovery: &Discovery, resource: &Resource, namespace: &str) -> std::result::Result<(), ResourceError> {
    let (ar, scope) = dynamic::resolve(discovery, &resource.gvk).map_err(|e| ResourceError {
        operation: "apply",
        kind: resource.gvk.kind.clone(),
        name: resource.name.clone(),
        cause: e.to_string(),
    })?;
    let ns = resource.namespace.as_deref().unwrap_or(namespace);
    let api = dynamic::api_for(client, &ar, scope, ns);
    let obj = dynamic::to_dynamic_object(&ar, resource).map_err(|e| ResourceError {
        operation: "apply",
        kind: resource.gvk.kind.clone(),
        name: resource.name.clone(),
        cause: e.to_string(),
    })?;

    api.patch(&resource.name, &PatchParams::apply(FIELD_MANAGER).force(), &Patch::Apply(&obj))
        .await
        .map_err(|e| ResourceError {
            operation: "apply",
            kind: resource.gvk.kind.clone(),
            name: resource.name.clone(),
            cause: e.to_string(),
        })?;
    Ok(())
}

