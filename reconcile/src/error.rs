//! Error is the `opm-reconcile` error type, covering render failure,
//! inventory failure, and cluster apply/delete/diff failure.

/// ResourceError is one resource's apply/delete failure, accumulated rather
/// than fatal so a partial apply still reports every failure it hit.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{operation} failed for {kind} \"{name}\": {cause}")]
pub struct ResourceError {
    /// `apply` or `delete`.
    pub operation: &'static str,
    /// Resource kind.
    pub kind: String,
    /// Resource name.
    pub name: String,
    /// Underlying cause.
    pub cause: String,
}

/// Error is the top-level reconcile error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Render wraps a render pipeline failure.
    #[error("render: {0}")]
    Render(#[from] opm_render::error::Error),
    /// Inventory wraps an inventory store failure.
    #[error("inventory: {0}")]
    Inventory(#[from] opm_inventory::error::Error),
    /// Kube wraps a raw Kubernetes API client failure outside the
    /// resource-level apply/delete loop (e.g. discovery, Get during diff).
    #[error("kubernetes api: {0}")]
    Kube(#[from] kube::Error),
    /// Kubeconfig wraps a failure reading or parsing a kubeconfig file.
    #[error("kubeconfig: {0}")]
    Kubeconfig(#[from] kube::config::KubeconfigError),
    /// InferConfig wraps a failure inferring the cluster config (neither an
    /// explicit kubeconfig nor an in-cluster service account was usable).
    #[error("inferring kube config: {0}")]
    InferConfig(#[from] kube::config::InferConfigError),
    /// Apply reports every resource-level failure from one apply attempt.
    /// No inventory write happens when this is returned.
    #[error("{} resource(s) failed to apply", .0.len())]
    Apply(Vec<ResourceError>),
    /// Delete reports every resource-level failure from one delete attempt.
    #[error("{} resource(s) failed to delete", .0.len())]
    Delete(Vec<ResourceError>),
    /// PruneRequiresForce is returned when a render drops every previously
    /// tracked resource and `--force` was not given.
    #[error("render produced zero resources while {0} previously tracked resource(s) existed; rerun with --force to prune them")]
    PruneRequiresForce(usize),
    /// AmbiguousRelease is returned when both `--release-name` and
    /// `--release-id` identify a release, or neither does.
    #[error("specify exactly one of --release-name or --release-id")]
    AmbiguousRelease,
    /// NotFound is returned when the targeted release has no inventory and
    /// no discoverable resources.
    #[error("no release found: {0}")]
    NotFound(String),
    /// Cancelled indicates cooperative cancellation fired mid-reconcile.
    #[error("reconcile cancelled")]
    Cancelled,
    /// Discovery indicates a rendered resource's GVK could not be resolved
    /// against the cluster's API discovery data.
    #[error("could not resolve api resource for {0}")]
    Discovery(String),
}

/// Result typedef for `opm-reconcile`.
pub type Result<T, E = Error> = std::result::Result<T, E>;
