//! Prune computes the set of previously tracked resources no longer
//! produced by the current render, per §4.9's identity-diff rule: a
//! resource is pruned when its `(group, kind, namespace, name)` identity
//! (excluding API version and component) is absent from the current set.
use std::collections::BTreeSet;

use opm_core::resource::InventoryEntry;

/// Compute returns every entry in `previous` whose [`InventoryEntry::k8s_identity`]
/// is absent from `current_identities`.
pub fn compute(
    previous: &[InventoryEntry],
    current_identities: &BTreeSet<(String, String, String, String)>,
) -> Vec<InventoryEntry> {
    previous
        .iter()
        .filter(|e| !current_identities.contains(&e.k8s_identity()))
        .cloned()
        .collect()
}

/// Sorted_descending orders `entries` by weight descending (the reverse of
/// apply order), so a Deployment is deleted before the Service it depends
/// on existing, and well before the Namespace that contains both.
pub fn sorted_descending(entries: &[InventoryEntry]) -> Vec<&InventoryEntry> {
    let mut out: Vec<&InventoryEntry> = entries.iter().collect();
    out.sort_by(|a, b| weight_for(b).cmp(&weight_for(a)));
    out
}

fn weight_for(entry: &InventoryEntry) -> i32 {
    opm_core::resource::weight_for_kind(&entry.group, &entry.kind).0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(kind: &str, name: &str) -> InventoryEntry {
        InventoryEntry {
            group: "apps".into(),
            kind: kind.into(),
            namespace: "default".into(),
            name: name.into(),
            component: "c".into(),
        }
    }

    #[test]
    fn compute_drops_entries_present_in_current() {
        let previous = vec![entry("Deployment", "web"), entry("Deployment", "api")];
        let mut current = BTreeSet::new();
        current.insert(entry("Deployment", "web").k8s_identity());
        let pruned = compute(&previous, &current);
        assert_eq!(pruned.len(), 1);
        assert_eq!(pruned[0].name, "api");
    }

    #[test]
    fn sorted_descending_reverses_apply_order() {
        let entries = vec![
            InventoryEntry {
                group: String::new(),
                kind: "Service".into(),
                namespace: "default".into(),
                name: "web".into(),
                component: "web".into(),
            },
            InventoryEntry {
                group: "apps".into(),
                kind: "Deployment".into(),
                namespace: "default".into(),
                name: "web".into(),
                component: "web".into(),
            },
        ];
        let sorted = sorted_descending(&entries);
        assert_eq!(sorted[0].kind, "Service");
        assert_eq!(sorted[1].kind, "Deployment");
    }
}
