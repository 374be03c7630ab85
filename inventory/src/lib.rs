#![warn(rustdoc::missing_crate_level_docs)]
#![warn(missing_docs)]

//! Opm_inventory owns the inventory Secret: its data model, its manifest
//! digest / change id computation, and its CRUD algorithm against the
//! Kubernetes API.

pub mod digest;
pub mod error;
pub mod model;
pub mod store;

/// Prelude re-exports the types most callers need.
pub mod prelude {
    pub use crate::digest::{change_id, manifest_digest};
    pub use crate::error::{Error, Result};
    pub use crate::model::{Body, ChangeEntry, ModuleMetadata, ReleaseMetadata};
    pub use crate::store::Store;
}
