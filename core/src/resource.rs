//! Resource is the rendered platform object model shared by the render
//! pipeline, the inventory, and the reconciler. `Weight` centralizes the
//! per-kind ordering table the design notes call out as needing one fixed,
//! central definition.
use std::{cmp::Ordering, collections::BTreeMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Gvk identifies a Kubernetes group/version/kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Gvk {
    /// API group, empty string for the core group.
    pub group: String,
    /// API version, e.g. `v1` or `v1alpha1`.
    pub version: String,
    /// Kind, e.g. `Deployment`.
    pub kind: String,
}

impl Gvk {
    /// New constructs a Gvk from its three parts.
    pub fn new(group: impl Into<String>, version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
        }
    }

    /// Weight looks up this kind's ordering weight in the central table,
    /// falling back to [`Weight::UNKNOWN`] for kinds not in the table (so an
    /// unrecognized CRD still sorts, just last among its neighbors).
    pub fn weight(&self) -> Weight {
        weight_for_kind(&self.group, &self.kind)
    }
}

/// Weight is the per-kind integer used to order apply (ascending) and delete
/// (descending) and to seed the permutation-invariant sort that feeds the
/// manifest digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Weight(pub i32);

impl Weight {
    /// CRDS sorts first: a CRD must exist before any CR it defines is applied.
    pub const CRDS: Weight = Weight(-1000);
    /// NAMESPACES sorts after CRDs, before anything placed inside them.
    pub const NAMESPACES: Weight = Weight(-900);
    /// CONFIG sorts before the workloads and services that consume it.
    pub const CONFIG: Weight = Weight(-100);
    /// STORAGE covers PersistentVolumeClaims.
    pub const STORAGE: Weight = Weight(-10);
    /// WORKLOADS covers Deployments, StatefulSets, DaemonSets, Jobs, CronJobs.
    pub const WORKLOADS: Weight = Weight(0);
    /// SERVICES sorts after the workloads they address.
    pub const SERVICES: Weight = Weight(10);
    /// ROUTING covers Ingress/Gateway API route objects.
    pub const ROUTING: Weight = Weight(100);
    /// AUTOSCALING covers HorizontalPodAutoscalers, which must follow their target.
    pub const AUTOSCALING: Weight = Weight(200);
    /// UNKNOWN is used for kinds absent from the table.
    pub const UNKNOWN: Weight = Weight(50);
    /// HOOK_OFFSET is added to a resource's base weight when it carries a hook
    /// annotation, so hooks sort last within their own kind's neighborhood.
    pub const HOOK_OFFSET: i32 = 10_000;
}

/// Weight_for_kind is the one central table mapping (group, kind) to a
/// [`Weight`]. Tests fix these as concrete constants per the design notes.
pub fn weight_for_kind(group: &str, kind: &str) -> Weight {
    match (group, kind) {
        ("apiextensions.k8s.io", "CustomResourceDefinition") => Weight::CRDS,
        ("", "Namespace") => Weight::NAMESPACES,
        ("", "ConfigMap") | ("", "Secret") => Weight::CONFIG,
        ("", "PersistentVolumeClaim") => Weight::STORAGE,
        ("apps", "Deployment")
        | ("apps", "StatefulSet")
        | ("apps", "DaemonSet")
        | ("batch", "Job")
        | ("batch", "CronJob") => Weight::WORKLOADS,
        ("", "Service") => Weight::SERVICES,
        ("networking.k8s.io", "Ingress") | ("gateway.networking.k8s.io", _) => Weight::ROUTING,
        ("autoscaling", "HorizontalPodAutoscaler") => Weight::AUTOSCALING,
        _ => Weight::UNKNOWN,
    }
}

/// Resource is a single rendered platform object plus the OPM-level
/// provenance needed to sort, label, apply, and track it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    /// Group/version/kind of the rendered object.
    pub gvk: Gvk,
    /// Object name.
    pub name: String,
    /// Object namespace; empty for cluster-scoped resources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Name of the component this resource was generated from.
    pub component: String,
    /// Whether this resource is a lifecycle hook (sorts after its kind's peers).
    #[serde(default)]
    pub hook: bool,
    /// The encoded object payload, as decoded from the transformer output.
    pub payload: Value,
}

impl Resource {
    /// Weight returns this resource's ordering weight, accounting for the
    /// hook offset.
    pub fn weight(&self) -> i32 {
        let base = self.gvk.weight().0;
        if self.hook {
            base.saturating_add(Weight::HOOK_OFFSET)
        } else {
            base
        }
    }

    /// Sort_key returns the `(weight, group, kind, namespace, name)` tuple
    /// the design requires for both resource ordering and digest input order.
    pub fn sort_key(&self) -> (i32, &str, &str, &str, &str) {
        (
            self.weight(),
            self.gvk.group.as_str(),
            self.gvk.kind.as_str(),
            self.namespace.as_deref().unwrap_or(""),
            self.name.as_str(),
        )
    }

    /// Labels returns a mutable view into `metadata.labels` of the payload,
    /// creating the path if absent. Used by the generator to stamp the six
    /// canonical labels after decoding a transformer's output.
    pub fn labels_mut(&mut self) -> &mut serde_json::Map<String, Value> {
        let meta = self
            .payload
            .as_object_mut()
            .expect("resource payload is always a JSON object")
            .entry("metadata")
            .or_insert_with(|| Value::Object(Default::default()));
        meta.as_object_mut()
            .expect("metadata is always a JSON object")
            .entry("labels")
            .or_insert_with(|| Value::Object(Default::default()))
            .as_object_mut()
            .expect("labels is always a JSON object")
    }

    /// Stamp_labels applies the six canonical labels to this resource.
    pub fn stamp_labels(&mut self, module: &str, namespace: &str, release: &str, uuid: &str) {
        let component = self.component.clone();
        let labels = crate::labels::resource_labels(module, namespace, release, uuid, &component);
        let map = self.labels_mut();
        for (k, v) in labels {
            map.insert(k, Value::String(v));
        }
    }
}

/// Sort_resources sorts `resources` in place by `(weight, group, kind,
/// namespace, name)` ascending, the canonical order used for render output,
/// apply, and digest input.
pub fn sort_resources(resources: &mut [Resource]) {
    resources.sort_by(|a, b| cmp_sort_key(a, b));
}

fn cmp_sort_key(a: &Resource, b: &Resource) -> Ordering {
    a.sort_key().cmp(&b.sort_key())
}

/// InventoryEntry identifies one tracked resource. The API version is
/// excluded from identity so that GVK promotions (e.g. `v1beta1` ->
/// `v1`) never read as orphans.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InventoryEntry {
    /// API group.
    pub group: String,
    /// Kind.
    pub kind: String,
    /// Namespace, empty for cluster-scoped.
    pub namespace: String,
    /// Object name.
    pub name: String,
    /// Component of origin.
    pub component: String,
}

impl InventoryEntry {
    /// From_resource builds an entry for a rendered [`Resource`].
    pub fn from_resource(r: &Resource) -> Self {
        Self {
            group: r.gvk.group.clone(),
            kind: r.gvk.kind.clone(),
            namespace: r.namespace.clone().unwrap_or_default(),
            name: r.name.clone(),
            component: r.component.clone(),
        }
    }

    /// K8s_identity is a coarser identity excluding both API version and
    /// component, used to detect component renames (the same cluster object
    /// re-attributed to a different component in a later render).
    pub fn k8s_identity(&self) -> (String, String, String, String) {
        (
            self.group.clone(),
            self.kind.clone(),
            self.namespace.clone(),
            self.name.clone(),
        )
    }
}

/// BTreeMap re-export point for downstream crates that only need the labels
/// map type without importing `std::collections` directly.
pub type Labels = BTreeMap<String, String>;

#[cfg(test)]
mod tests {
    use super::*;

    fn res(group: &str, kind: &str, ns: &str, name: &str) -> Resource {
        Resource {
            gvk: Gvk::new(group, "v1", kind),
            name: name.into(),
            namespace: Some(ns.into()),
            component: "c".into(),
            hook: false,
            payload: serde_json::json!({"metadata": {"name": name}}),
        }
    }

    #[test]
    fn sort_resources_orders_by_weight_then_name() {
        let mut rs = vec![
            res("", "Service", "default", "web"),
            res("apps", "Deployment", "default", "web"),
            res("apps", "Deployment", "default", "api"),
        ];
        sort_resources(&mut rs);
        let names: Vec<_> = rs.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["api", "web", "web"]);
        assert_eq!(rs[2].gvk.kind, "Service");
    }

    /// Pins the literal resource order from the "basic render" worked
    /// example: Deployment/api, Deployment/web, Service/web.
    #[test]
    fn basic_render_order_is_deployments_then_service() {
        let mut rs = vec![
            res("", "Service", "default", "web"),
            res("apps", "Deployment", "default", "web"),
            res("apps", "Deployment", "default", "api"),
        ];
        sort_resources(&mut rs);
        let order: Vec<_> = rs.iter().map(|r| (r.gvk.kind.as_str(), r.name.as_str())).collect();
        assert_eq!(order, vec![("Deployment", "api"), ("Deployment", "web"), ("Service", "web")]);
    }

    #[test]
    fn identity_excludes_api_version() {
        let a = InventoryEntry {
            group: "apps".into(),
            kind: "Deployment".into(),
            namespace: "default".into(),
            name: "web".into(),
            component: "web".into(),
        };
        let b = a.clone();
        assert_eq!(a, b);
        assert_eq!(a.k8s_identity(), b.k8s_identity());
    }
}
