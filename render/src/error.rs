//! Error types specific to matching, generation, and pipeline sequencing.
use opm_core::error::ValidationError;

/// TransformError is one failed (component, transformer) evaluation,
/// accumulated rather than fatal per §4.6.
#[derive(Debug, Clone, thiserror::Error)]
#[error("transform failed: component `{component}` via `{transformer}`: {cause}")]
pub struct TransformError {
    /// Component name.
    pub component: String,
    /// Transformer FQN.
    pub transformer: String,
    /// Underlying cause.
    pub cause: String,
}

/// UnmatchedComponentError reports a component that matched no transformer,
/// naming the transformers that were attempted.
#[derive(Debug, Clone, thiserror::Error)]
#[error("component `{component}` matched no transformer; attempted: {}", .attempted.join(", "))]
pub struct UnmatchedComponentError {
    /// The unmatched component's name.
    pub component: String,
    /// FQNs of every transformer evaluated against it.
    pub attempted: Vec<String>,
}

/// Error is the render pipeline's error type. Fatal phase failures
/// (PREPARATION, BUILD, PROVIDER-LOAD, MATCHING) surface here; GENERATE
/// failures are accumulated on `RenderResult.errors` instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A module failed to load (PREPARATION).
    #[error("preparation failed: {0}")]
    Preparation(#[from] opm_core::error::Error),
    /// Release values failed schema validation (BUILD).
    #[error("{} validation error(s) in module configuration", .0.len())]
    Validation(Vec<ValidationError>),
    /// Cancellation was observed between phases.
    #[error("render cancelled")]
    Cancelled,
}

/// Result typedef for `opm-render`.
pub type Result<T, E = Error> = std::result::Result<T, E>;
