//! Error is the CLI binary's top-level error type: every downstream crate's
//! error wrapped behind one enum, with a single `exit_code` mapping to the
//! five-kind table in §6, the way the teacher's `main()` does
//! `process::exit(1)` on any top-level error, generalized here to five codes.
use opm_core::error::Kind;

/// Error is the CLI's unified error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A core-crate failure (config resolution, loading, release building).
    #[error("{0}")]
    Core(#[from] opm_core::error::Error),
    /// A render pipeline failure.
    #[error("{0}")]
    Render(#[from] opm_render::error::Error),
    /// An inventory store failure.
    #[error("{0}")]
    Inventory(#[from] opm_inventory::error::Error),
    /// An apply/delete/diff/status/events failure.
    #[error("{0}")]
    Reconcile(#[from] opm_reconcile::error::Error),
    /// The targeted release was not found.
    #[error("release not found: {0}")]
    NotFound(String),
    /// Output formatting or file I/O at the CLI layer failed.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// JSON output formatting failed.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    /// YAML output formatting failed.
    #[error("{0}")]
    Yaml(#[from] serde_yaml::Error),
    /// Usage error: bad flag combination the derive layer didn't already reject.
    #[error("{0}")]
    Usage(String),
}

/// Result typedef for the CLI binary.
pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Exit_code maps this error to the process exit code table: 0 success
    /// (never constructed as an `Error`), 1 general/usage, 2 validation, 3
    /// connectivity, 4 permission, 5 not-found.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Core(e) => kind_exit_code(e.kind()),
            Error::Render(e) => render_exit_code(e),
            Error::Inventory(_) => 3,
            Error::Reconcile(e) => reconcile_exit_code(e),
            Error::NotFound(_) => 5,
            Error::Io(_) | Error::Usage(_) | Error::Json(_) | Error::Yaml(_) => 1,
        }
    }
}

fn kind_exit_code(kind: Kind) -> i32 {
    match kind {
        Kind::Validation => 2,
        Kind::NotFound => 5,
        Kind::Connectivity => 3,
        Kind::Permission => 4,
        Kind::Transform | Kind::Unmatched | Kind::FatalPipeline | Kind::Other => 1,
    }
}

fn render_exit_code(e: &opm_render::error::Error) -> i32 {
    match e {
        opm_render::error::Error::Validation(_) => 2,
        opm_render::error::Error::Preparation(inner) => kind_exit_code(inner.kind()),
        opm_render::error::Error::Cancelled => 1,
    }
}

fn reconcile_exit_code(e: &opm_reconcile::error::Error) -> i32 {
    use opm_reconcile::error::Error as E;
    match e {
        E::NotFound(_) => 5,
        E::AmbiguousRelease | E::Cancelled => 1,
        E::Kube(kube::Error::Api(resp)) if resp.code == 403 => 4,
        E::Kube(_) | E::Kubeconfig(_) | E::InferConfig(_) | E::Discovery(_) => 3,
        E::Render(inner) => render_exit_code(inner),
        E::Inventory(_) => 3,
        E::Apply(_) | E::Delete(_) | E::PruneRequiresForce(_) => 1,
    }
}
