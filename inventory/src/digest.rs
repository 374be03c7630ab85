//! Digest computes the permutation-invariant manifest digest and the stable
//! per-change id, per §4.8 "Digest computation" and §3 "Change ID".
use opm_core::resource::{sort_resources, Resource};
use sha1::Sha1;
use sha2::{Digest as _, Sha256};

/// Manifest_digest hashes `resources`, sorted by `(weight, group, kind,
/// namespace, name)`, each serialized to its canonical JSON form and joined
/// with a newline separator. Property: permutation-invariant; a
/// single-field mutation changes the digest.
pub fn manifest_digest(resources: &[Resource]) -> String {
    let mut sorted: Vec<Resource> = resources.to_vec();
    sort_resources(&mut sorted);

    let mut hasher = Sha256::new();
    for (i, r) in sorted.iter().enumerate() {
        if i > 0 {
            hasher.update(b"\n");
        }
        // `serde_json::Value::Object` is BTreeMap-backed (the `preserve_order`
        // feature is not enabled anywhere in this workspace), so
        // `to_string` already emits keys in sorted order. This canonical
        // form is therefore stable without any extra key-sorting pass.
        let canonical = serde_json::to_string(&r.payload).expect("resource payload is always serializable");
        hasher.update(canonical.as_bytes());
    }
    format!("sha256:{:x}", hasher.finalize())
}

/// Change_id computes the short stable id for one applied state:
/// `change-sha1-<8-hex>` over `<module-path>|<module-version>|<resolved-values>|<manifest-digest>`.
pub fn change_id(module_path: &str, module_version: &str, resolved_values: &str, manifest_digest: &str) -> String {
    let key = format!("{module_path}|{module_version}|{resolved_values}|{manifest_digest}");
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    let digest = hasher.finalize();
    format!("change-sha1-{:02x}{:02x}{:02x}{:02x}", digest[0], digest[1], digest[2], digest[3])
}

#[cfg(test)]
mod tests {
    use super::*;
    use opm_core::resource::Gvk;
    use serde_json::json;

    fn resource(kind: &str, name: &str, extra: serde_json::Value) -> Resource {
        let mut payload = json!({"apiVersion": "v1", "kind": kind, "metadata": {"name": name}});
        if let (Some(obj), Some(extra)) = (payload.as_object_mut(), extra.as_object()) {
            for (k, v) in extra {
                obj.insert(k.clone(), v.clone());
            }
        }
        Resource {
            gvk: Gvk::new("", "v1", kind),
            name: name.into(),
            namespace: Some("default".into()),
            component: "c".into(),
            hook: false,
            payload,
        }
    }

    #[test]
    fn digest_is_permutation_invariant() {
        let a = resource("Service", "web", json!({}));
        let b = resource("Deployment", "api", json!({}));
        let d1 = manifest_digest(&[a.clone(), b.clone()]);
        let d2 = manifest_digest(&[b, a]);
        assert_eq!(d1, d2);
    }

    #[test]
    fn digest_is_sensitive_to_a_single_field() {
        let a = resource("Deployment", "api", json!({"spec": {"replicas": 4}}));
        let mut b = a.clone();
        b.payload["spec"]["replicas"] = json!(5);
        assert_ne!(manifest_digest(&[a]), manifest_digest(&[b]));
    }

    #[test]
    fn change_id_differs_on_module_version_values_or_digest() {
        let base = change_id("example.com/mc", "v0", "{}", "sha256:aaaa");
        assert_ne!(base, change_id("example.com/mc", "v1", "{}", "sha256:aaaa"));
        assert_ne!(base, change_id("example.com/mc", "v0", "{\"a\":1}", "sha256:aaaa"));
        assert_ne!(base, change_id("example.com/mc", "v0", "{}", "sha256:bbbb"));
        assert!(base.starts_with("change-sha1-"));
        assert_eq!(base.len(), "change-sha1-".len() + 8);
    }
}
