//! Store implements inventory Secret CRUD against the Kubernetes API, per
//! §4.8 "Get / Write / Delete".
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube::{
    api::{DeleteParams, ListParams, ObjectMeta, Patch, PatchParams},
    Api, Client, ResourceExt,
};
use tracing::{debug, instrument, trace};
use uuid::Uuid;

use crate::{
    error::{Error, Result},
    model::Body,
};

const FIELD_MANAGER: &str = "open-platform-model";
const DATA_KEY: &str = "inventory.json";

fn secret_name(release_name: &str, release_uuid: &Uuid) -> String {
    format!("opm.{release_name}.{release_uuid}")
}

/// Store wraps a namespaced [`Api<Secret>`] with the inventory read/write/
/// delete algorithm.
pub struct Store {
    api: Api<Secret>,
    namespace: String,
}

impl Store {
    /// New builds a store scoped to `namespace`.
    pub fn new(client: Client, namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        Self {
            api: Api::namespaced(client, &namespace),
            namespace,
        }
    }

    /// Get fetches the inventory identified by `release_uuid`. When
    /// `release_name` is known, tries the conventional name first; on a
    /// miss (or when the caller only has a `--release-id`), falls back to a
    /// label selector scan by release UUID. Returns `None` for a release
    /// with no prior inventory at all.
    #[instrument(skip(self), fields(release = ?release_name, %release_uuid))]
    pub async fn get(&self, release_name: Option<&str>, release_uuid: &Uuid) -> Result<Option<(Body, String)>> {
        if let Some(release_name) = release_name {
            let name = secret_name(release_name, release_uuid);
            if let Some(secret) = self.api.get_opt(&name).await? {
                return Ok(Some(Self::decode(secret)?));
            }
        }

        trace!("direct lookup missed or unavailable, falling back to label selector");
        let selector = format!(
            "{}={release_uuid},{}={}",
            opm_core::labels::RELEASE_UUID,
            opm_core::labels::INVENTORY_COMPONENT,
            opm_core::labels::INVENTORY_COMPONENT_VALUE,
        );
        let list = self.api.list(&ListParams::default().labels(&selector)).await?;
        match list.items.into_iter().next() {
            Some(secret) => Ok(Some(Self::decode(secret)?)),
            None => Ok(None),
        }
    }

    fn decode(secret: Secret) -> Result<(Body, String)> {
        let resource_version = secret.resource_version().unwrap_or_default();
        let raw = secret
            .data
            .as_ref()
            .and_then(|d| d.get(DATA_KEY))
            .ok_or_else(|| Error::Malformed("inventory secret missing data key".into()))?;
        let body: Body = serde_json::from_slice(&raw.0)?;
        Ok((body, resource_version))
    }

    /// Write applies `body` as a full replacement via server-side apply
    /// under the fixed field manager, so repeated writes from the same
    /// release controller never conflict with themselves.
    #[instrument(skip(self, body), fields(release = %body.metadata.name))]
    pub async fn write(&self, body: &Body) -> Result<()> {
        let name = secret_name(&body.metadata.name, &body.metadata.uuid);
        let data = serde_json::to_vec(body)?;

        let secret = Secret {
            metadata: ObjectMeta {
                name: Some(name.clone()),
                namespace: Some(self.namespace.clone()),
                labels: Some(opm_core::labels::inventory_labels(
                    &body.module_metadata.name,
                    &body.metadata.namespace,
                    &body.metadata.name,
                    &body.metadata.uuid.to_string(),
                )),
                ..Default::default()
            },
            data: Some([(DATA_KEY.to_string(), ByteString(data))].into_iter().collect()),
            ..Default::default()
        };

        self.api
            .patch(&name, &PatchParams::apply(FIELD_MANAGER).force(), &Patch::Apply(&secret))
            .await?;
        debug!(name, "wrote inventory secret");
        Ok(())
    }

    /// Delete removes the inventory Secret. A 404 is treated as success: the
    /// end state the caller wants (no inventory) already holds.
    #[instrument(skip(self), fields(release = %release_name, %release_uuid))]
    pub async fn delete(&self, release_name: &str, release_uuid: &Uuid) -> Result<()> {
        let name = secret_name(release_name, release_uuid);
        match self.api.delete(&name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(e)) if e.code == 404 => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
