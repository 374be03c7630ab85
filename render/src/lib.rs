#![warn(rustdoc::missing_crate_level_docs)]
#![warn(missing_docs)]

//! Opm_render implements the component<->transformer matcher, the
//! transformer-executing generator, and the pipeline that sequences both
//! into a final [`pipeline::RenderResult`].

pub mod error;
pub mod generator;
pub mod matcher;
pub mod pipeline;

/// Prelude re-exports the types most callers need.
pub mod prelude {
    pub use crate::error::{Error, Result, TransformError, UnmatchedComponentError};
    pub use crate::generator;
    pub use crate::matcher::{self, Match, MatchPlan};
    pub use crate::pipeline::{self, Options, RenderResult, Warning};
}
