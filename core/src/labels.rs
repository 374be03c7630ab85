//! Labels centralizes the canonical label keys OPM stamps on every resource
//! and the inventory Secret, mirroring the teacher's `k8s_label`/`clair_label`
//! helpers but generalized to the handful of label spaces OPM needs.
use std::collections::BTreeMap;

/// MANAGED_BY is the `app.kubernetes.io/managed-by` label key.
pub const MANAGED_BY: &str = "app.kubernetes.io/managed-by";
/// MANAGED_BY_VALUE is the value OPM stamps into [`MANAGED_BY`].
pub const MANAGED_BY_VALUE: &str = "open-platform-model";
/// MODULE_NAME is the `module.opmodel.dev/name` label key.
pub const MODULE_NAME: &str = "module.opmodel.dev/name";
/// MODULE_NAMESPACE is the `module.opmodel.dev/namespace` label key.
pub const MODULE_NAMESPACE: &str = "module.opmodel.dev/namespace";
/// RELEASE_NAME is the `module-release.opmodel.dev/name` label key.
pub const RELEASE_NAME: &str = "module-release.opmodel.dev/name";
/// RELEASE_UUID is the `module-release.opmodel.dev/uuid` label key.
pub const RELEASE_UUID: &str = "module-release.opmodel.dev/uuid";
/// COMPONENT_NAME is the `component.opmodel.dev/name` label key.
pub const COMPONENT_NAME: &str = "component.opmodel.dev/name";
/// INVENTORY_COMPONENT is the label distinguishing the inventory Secret from
/// application-owned Secrets.
pub const INVENTORY_COMPONENT: &str = "opmodel.dev/component";
/// INVENTORY_COMPONENT_VALUE is the value inventory Secrets carry for
/// [`INVENTORY_COMPONENT`].
pub const INVENTORY_COMPONENT_VALUE: &str = "inventory";

/// Release_labels returns the four canonical release-scoped labels (without
/// the component label, which is per-resource).
pub fn release_labels(module: &str, namespace: &str, release: &str, uuid: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (MANAGED_BY.to_string(), MANAGED_BY_VALUE.to_string()),
        (MODULE_NAME.to_string(), module.to_string()),
        (MODULE_NAMESPACE.to_string(), namespace.to_string()),
        (RELEASE_NAME.to_string(), release.to_string()),
        (RELEASE_UUID.to_string(), uuid.to_string()),
    ])
}

/// Resource_labels returns the six canonical labels every rendered resource
/// must carry, as specified for the `Resource` data model invariant.
pub fn resource_labels(
    module: &str,
    namespace: &str,
    release: &str,
    uuid: &str,
    component: &str,
) -> BTreeMap<String, String> {
    let mut labels = release_labels(module, namespace, release, uuid);
    labels.insert(COMPONENT_NAME.to_string(), component.to_string());
    labels
}

/// Inventory_labels returns the seven labels the inventory Secret carries:
/// the six canonical labels plus the component=inventory marker.
pub fn inventory_labels(module: &str, namespace: &str, release: &str, uuid: &str) -> BTreeMap<String, String> {
    let mut labels = release_labels(module, namespace, release, uuid);
    labels.insert(
        INVENTORY_COMPONENT.to_string(),
        INVENTORY_COMPONENT_VALUE.to_string(),
    );
    labels
}

/// Stamp merges the six canonical resource labels into `existing`, overwriting
/// any prior value for the same keys.
pub fn stamp(
    existing: &mut BTreeMap<String, String>,
    module: &str,
    namespace: &str,
    release: &str,
    uuid: &str,
    component: &str,
) {
    for (k, v) in resource_labels(module, namespace, release, uuid, component) {
        existing.insert(k, v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_labels_carries_all_six() {
        let l = resource_labels("blog", "default", "blog", "11111111-1111-5111-8111-111111111111", "web");
        assert_eq!(l.len(), 6);
        assert_eq!(l[MANAGED_BY], MANAGED_BY_VALUE);
        assert_eq!(l[COMPONENT_NAME], "web");
    }

    #[test]
    fn inventory_labels_carries_component_marker() {
        let l = inventory_labels("blog", "default", "blog", "uuid");
        assert_eq!(l[INVENTORY_COMPONENT], INVENTORY_COMPONENT_VALUE);
        assert_eq!(l.len(), 6);
    }
}
