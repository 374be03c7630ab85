#![warn(rustdoc::missing_crate_level_docs)]
#![warn(missing_docs)]

//! Opm_core implements the module/release/provider data model and the
//! non-Kubernetes stages of the render pipeline: config resolution, module
//! loading, release building, and provider loading. Render ordering and
//! resource generation live in `opm-render`; inventory persistence and
//! cluster reconciliation live in `opm-inventory` and `opm-reconcile`.

pub mod config;
pub mod cue;
pub mod error;
pub mod labels;
pub mod loader;
pub mod module;
pub mod provider;
pub mod release;
pub mod resource;

/// Prelude re-exports the types most callers of `opm-core` need.
pub mod prelude {
    pub use crate::config::{ApiWarningLevel, Config, Inputs, KubeSettings, Resolved, Source};
    pub use crate::cue::{self, Runtime as CueRuntime};
    pub use crate::error::{Error, Kind, Result, ValidationError};
    pub use crate::labels;
    pub use crate::loader::Loader;
    pub use crate::module::{Component, ConfigSchema, Module, ModuleMetadata};
    pub use crate::provider::{self, Provider, Transformer};
    pub use crate::release::{self, Builder as ReleaseBuilder, ModuleRelease, ReleaseMetadata};
    pub use crate::resource::{Gvk, InventoryEntry, Labels, Resource, Weight};
}
