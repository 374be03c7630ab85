//! Client builds the [`kube::Client`] the reconciler drives every cluster
//! operation through, installing the [`WarningLayer`](crate::warnings::WarningLayer)
//! on its HTTP stack per §4.9's "API warning handler", the way the teacher's
//! `main::run` builds its client via `ClientBuilder::try_from(config)`.
use kube::{config::KubeConfigOptions, Client};
use opm_core::config::KubeSettings;
use tracing::instrument;

use crate::{error::Result, warnings::WarningLayer};

/// Build constructs a [`Client`] from the resolved Kubernetes settings,
/// reading `kubeconfig`/`context` when set and falling back to in-cluster
/// inference otherwise.
#[instrument(skip(kube))]
pub async fn build(kube: &KubeSettings) -> Result<Client> {
    let options = KubeConfigOptions {
        context: kube.context.value.clone(),
        cluster: None,
        user: None,
    };

    let config = if kube.kubeconfig.value.exists() {
        let kubeconfig = kube::config::Kubeconfig::read_from(&kube.kubeconfig.value)?;
        kube::Config::from_custom_kubeconfig(kubeconfig, &options).await?
    } else {
        kube::Config::infer().await?
    };

    let client = kube::client::ClientBuilder::try_from(config)?
        .with_layer(&WarningLayer::new(kube.api_warnings))
        .build();

    Ok(client)
}
