//! Model defines the inventory Secret's JSON body, per §4.8 "Secret layout".
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use opm_core::resource::InventoryEntry;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// ReleaseMetadata is the release-level typed record stored under the
/// Secret's `metadata` key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseMetadata {
    /// Always `ModuleRelease`.
    pub kind: String,
    #[serde(rename = "apiVersion")]
    /// Always `core.opmodel.dev/v1alpha1`.
    pub api_version: String,
    /// Release name.
    pub name: String,
    /// Release namespace.
    pub namespace: String,
    /// Release UUID.
    pub uuid: Uuid,
    /// Release-level labels.
    pub labels: BTreeMap<String, String>,
}

impl ReleaseMetadata {
    /// New constructs release metadata with the fixed kind/apiVersion.
    pub fn new(name: String, namespace: String, uuid: Uuid, labels: BTreeMap<String, String>) -> Self {
        Self {
            kind: "ModuleRelease".into(),
            api_version: "core.opmodel.dev/v1alpha1".into(),
            name,
            namespace,
            uuid,
            labels,
        }
    }
}

/// ModuleMetadata is the module-level typed record stored under the
/// Secret's `moduleMetadata` key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleMetadata {
    /// Module name.
    pub name: String,
    /// Module UUID, if the module declares one (may be empty).
    #[serde(default)]
    pub uuid: Option<Uuid>,
    /// Module FQN.
    pub fqn: String,
    /// Module version.
    pub version: String,
}

/// ChangeEntry is the body of one `change-sha1-<8h>` key: the module
/// reference, resolved values, manifest digest, timestamp, and inventory
/// entries for that applied state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEntry {
    /// Module path or FQN at the time of this change.
    pub module_path: String,
    /// Module version at the time of this change.
    pub module_version: String,
    /// Resolved (concrete) values, serialized.
    pub resolved_values: String,
    /// Manifest digest for this change's rendered resources.
    pub manifest_digest: String,
    /// When this change was applied (preserved across idempotent re-applies).
    pub timestamp: DateTime<Utc>,
    /// Every resource tracked as of this change.
    pub entries: Vec<InventoryEntry>,
}

/// Body is the full JSON body of the inventory Secret's single data key
/// (the Secret itself stores this serialized form, typically base64-encoded
/// by the Kubernetes API as a `Secret.data` entry).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Body {
    /// Release-level metadata.
    pub metadata: ReleaseMetadata,
    /// Module-level metadata.
    #[serde(rename = "moduleMetadata")]
    pub module_metadata: ModuleMetadata,
    /// Change IDs, newest first.
    pub index: Vec<String>,
    /// Change id -> change entry.
    pub changes: BTreeMap<String, ChangeEntry>,
}

impl Body {
    /// Head returns the most recent change id, if any.
    pub fn head(&self) -> Option<&str> {
        self.index.first().map(String::as_str)
    }

    /// Latest_entries returns the inventory entries of the most recent
    /// change, or an empty slice for a brand new inventory.
    pub fn latest_entries(&self) -> &[InventoryEntry] {
        self.head()
            .and_then(|id| self.changes.get(id))
            .map(|c| c.entries.as_slice())
            .unwrap_or(&[])
    }

    /// Push_change records a new applied state, per the change-history
    /// management rules in §4.8:
    /// - A matching existing id is moved to the front, its timestamp
    ///   refreshed, rather than duplicated.
    /// - If the new id already occupies the head, this is a no-op that
    ///   preserves the original timestamp (property 4's idempotent re-apply).
    /// - The index is trimmed to `max_history` entries AFTER insertion.
    ///
    /// Returns `true` if the body was actually mutated (the caller should
    /// write the Secret only when this returns `true`).
    pub fn push_change(&mut self, id: String, entry: ChangeEntry, max_history: usize) -> bool {
        if self.head() == Some(id.as_str()) {
            return false;
        }
        self.index.retain(|existing| existing != &id);
        self.index.insert(0, id.clone());
        self.changes.insert(id, entry);

        while self.index.len() > max_history {
            if let Some(oldest) = self.index.pop() {
                self.changes.remove(&oldest);
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(id: &str, ts: i64) -> ChangeEntry {
        ChangeEntry {
            module_path: "example.com/blog".into(),
            module_version: "v0".into(),
            resolved_values: "{}".into(),
            manifest_digest: format!("sha256:{id}"),
            timestamp: Utc.timestamp_opt(ts, 0).unwrap(),
            entries: vec![],
        }
    }

    fn empty_body() -> Body {
        Body {
            metadata: ReleaseMetadata::new("blog".into(), "default".into(), Uuid::nil(), Default::default()),
            module_metadata: ModuleMetadata {
                name: "blog".into(),
                uuid: None,
                fqn: "example.com/blog@v0".into(),
                version: "v0".into(),
            },
            index: vec![],
            changes: BTreeMap::new(),
        }
    }

    #[test]
    fn idempotent_head_push_is_a_noop() {
        let mut body = empty_body();
        assert!(body.push_change("change-sha1-aaaaaaaa".into(), entry("a", 1), 10));
        assert!(!body.push_change("change-sha1-aaaaaaaa".into(), entry("a", 2), 10));
        assert_eq!(body.changes["change-sha1-aaaaaaaa"].timestamp.timestamp(), 1);
    }

    #[test]
    fn history_is_trimmed_after_insertion() {
        let mut body = empty_body();
        for i in 0..15 {
            let id = format!("change-sha1-{i:08}");
            body.push_change(id, entry(&i.to_string(), i), 10);
        }
        assert_eq!(body.index.len(), 10);
        assert_eq!(body.index[0], "change-sha1-00000014");
        assert!(!body.changes.contains_key("change-sha1-00000000"));
    }

    #[test]
    fn reapplying_an_older_change_moves_it_to_front() {
        let mut body = empty_body();
        body.push_change("a".into(), entry("a", 1), 10);
        body.push_change("b".into(), entry("b", 2), 10);
        assert_eq!(body.index, vec!["b", "a"]);
        body.push_change("a".into(), entry("a", 3), 10);
        assert_eq!(body.index, vec!["a", "b"]);
        assert_eq!(body.changes["a"].timestamp.timestamp(), 3);
    }
}
