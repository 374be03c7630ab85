//! Error is the error taxonomy shared by every OPM crate.
use std::path::PathBuf;

/// Kind classifies an [`Error`] into the taxonomy described in the design's
/// error-handling section, independent of which crate raised it. The CLI
/// binary maps `Kind` to a process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// Schema mismatch, non-concrete values, unexpected fields.
    Validation,
    /// File, cluster resource, or release not found.
    NotFound,
    /// Registry or cluster unreachable.
    Connectivity,
    /// API denied the operation.
    Permission,
    /// A (component, transformer) evaluation failed.
    Transform,
    /// A component matched no transformer.
    Unmatched,
    /// A pipeline phase could not continue.
    FatalPipeline,
    /// Usage or other error not covered above.
    Other,
}

/// ValidationError is one schema violation, with the user-facing path
/// rewritten from `#config.X` to `values.X` and a source position when the
/// evaluator could supply one.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{path}: {message}")]
pub struct ValidationError {
    /// User-facing path, e.g. `values.port`.
    pub path: String,
    /// `file:line:column` of the offending value, if known.
    pub location: Option<String>,
    /// Human-readable description of the violated constraint.
    pub message: String,
    /// Optional remediation hint.
    pub hint: Option<String>,
}

/// Error is the unified error type for `opm-core`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// One or more values failed schema validation.
    #[error("{} validation error(s)", .0.len())]
    Validation(Vec<ValidationError>),
    /// A module directory contained `values.cue` plus stray `values_*.cue` files.
    #[error("rogue values files in module: {}", .0.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", "))]
    RogueValuesFiles(Vec<PathBuf>),
    /// The module directory or a named file inside it was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Module metadata (name/fqn/version) was missing or malformed.
    #[error("missing module metadata: {0}")]
    MissingMetadata(String),
    /// Evaluation of a CUE value failed.
    #[error("cue evaluation error: {0}")]
    Eval(#[from] crate::cue::EvalError),
    /// The release builder was asked to construct a release that is not concrete.
    #[error("release is not concrete: {0}")]
    NotConcrete(String),
    /// No provider name was given and more than one, or zero, providers are configured.
    #[error("provider selection error: {0}")]
    ProviderSelection(String),
    /// A transformer definition in a provider value could not be parsed.
    #[error("bad transformer definition `{transformer}`: {cause}")]
    BadTransformer {
        /// The transformer FQN, if it could be determined.
        transformer: String,
        /// Underlying cause.
        cause: String,
    },
    /// JSON (de)serialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    /// YAML (de)serialization failed.
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    /// Filesystem I/O failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// A glob pattern could not be compiled (programmer error; the pattern is a constant).
    #[error("glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),
    /// Some other, unclassified error.
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Kind classifies this error for exit-code mapping.
    pub fn kind(&self) -> Kind {
        match self {
            Error::Validation(_) | Error::RogueValuesFiles(_) | Error::NotConcrete(_) => {
                Kind::Validation
            }
            Error::NotFound(_) => Kind::NotFound,
            Error::MissingMetadata(_) | Error::Eval(_) | Error::BadTransformer { .. } => {
                Kind::FatalPipeline
            }
            Error::ProviderSelection(_) => Kind::FatalPipeline,
            Error::Json(_) | Error::Yaml(_) | Error::Io(_) | Error::Glob(_) | Error::Other(_) => {
                Kind::Other
            }
        }
    }
}

/// Result typedef used throughout `opm-core`.
pub type Result<T, E = Error> = std::result::Result<T, E>;
