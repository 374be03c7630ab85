//! Dynamic resolves an OPM [`Resource`]/[`InventoryEntry`] against cluster
//! API discovery and wraps it in a [`kube::Api<DynamicObject>`], since
//! rendered resources carry an arbitrary GVK unknown at compile time.
use kube::{
    api::{DynamicObject, GroupVersionKind},
    core::ApiResource,
    discovery::{verbs, Discovery, Scope},
    Api, Client,
};
use opm_core::resource::{Gvk, InventoryEntry, Resource};

use crate::error::{Error, ResourceError, Result};

/// Resolve looks up `gvk`'s [`ApiResource`] and scope in `discovery`.
pub fn resolve(discovery: &Discovery, gvk: &Gvk) -> Result<(ApiResource, Scope)> {
    let kube_gvk = GroupVersionKind::gvk(&gvk.group, &gvk.version, &gvk.kind);
    discovery
        .resolve_gvk(&kube_gvk)
        .map(|(ar, caps)| (ar, caps.scope))
        .ok_or_else(|| Error::Discovery(format!("{}/{} {}", gvk.group, gvk.version, gvk.kind)))
}

/// Resolve_entry looks up an [`InventoryEntry`]'s API resource by group and
/// kind alone, since inventory entries intentionally omit the API version.
/// Picks the lexicographically-first matching version if more than one
/// group/kind pair is ambiguous (a case the cluster's discovery data does
/// not normally produce for one well-formed API group).
pub fn resolve_entry(discovery: &Discovery, entry: &InventoryEntry) -> Result<(ApiResource, Scope)> {
    let mut candidates: Vec<(ApiResource, Scope)> = discovery
        .groups()
        .flat_map(|g| g.recommended_resources())
        .filter(|(ar, _)| ar.group == entry.group && ar.kind == entry.kind)
        .map(|(ar, caps)| (ar, caps.scope))
        .collect();
    candidates.sort_by(|a, b| a.0.api_version.cmp(&b.0.api_version));
    candidates
        .into_iter()
        .next()
        .ok_or_else(|| Error::Discovery(format!("{}/* {}", entry.group, entry.kind)))
}

/// Api_for builds the correctly-scoped dynamic API client for `ar`.
pub fn api_for(client: Client, ar: &ApiResource, scope: Scope, namespace: &str) -> Api<DynamicObject> {
    match scope {
        Scope::Namespaced => Api::namespaced_with(client, namespace, ar),
        Scope::Cluster => Api::all_with(client, ar),
    }
}

/// Supports_apply reports whether the resolved resource advertises the
/// `patch` verb, without which server-side apply is not possible.
pub fn supports_apply(discovery: &Discovery, gvk: &Gvk) -> bool {
    let kube_gvk = GroupVersionKind::gvk(&gvk.group, &gvk.version, &gvk.kind);
    discovery
        .resolve_gvk(&kube_gvk)
        .map(|(_, caps)| caps.supports_operation(verbs::PATCH))
        .unwrap_or(false)
}

/// To_dynamic_object converts a rendered [`Resource`] into the
/// [`DynamicObject`] server-side apply expects.
pub fn to_dynamic_object(ar: &ApiResource, resource: &Resource) -> Result<DynamicObject> {
    let mut obj: DynamicObject = serde_json::from_value(resource.payload.clone())
        .map_err(|e| Error::Discovery(format!("decoding rendered payload for apply: {e}")))?;
    obj.types = Some(kube::api::TypeMeta {
        api_version: ar.api_version.clone(),
        kind: ar.kind.clone(),
    });
    Ok(obj)
}

/// Delete_entry deletes one tracked [`InventoryEntry`], treating a 404 as
/// success. Shared by the apply flow's prune step and the delete flow's
/// inventory-driven teardown.
pub async fn delete_entry(
    client: Client,
    discovery: &Discovery,
    entry: &InventoryEntry,
    default_namespace: &str,
) -> std::result::Result<(), ResourceError> {
    let (ar, scope) = resolve_entry(discovery, entry).map_err(|e| ResourceError {
        operation: "delete",
        kind: entry.kind.clone(),
        name: entry.name.clone(),
        cause: e.to_string(),
    })?;
    let ns = if entry.namespace.is_empty() { default_namespace } else { &entry.namespace };
    let api = api_for(client, &ar, scope, ns);
    match api.delete(&entry.name, &kube::api::DeleteParams::default()).await {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(e)) if e.code == 404 => Ok(()),
        Err(e) => Err(ResourceError {
            operation: "delete",
            kind: entry.kind.clone(),
            name: entry.name.clone(),
            cause: e.to_string(),
        }),
    }
}
