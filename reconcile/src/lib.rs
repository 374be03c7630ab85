#![warn(rustdoc::missing_crate_level_docs)]
#![warn(missing_docs)]

//! Opm_reconcile drives a rendered release against a live cluster: apply,
//! prune, delete, diff, status, and child-event discovery, all built on
//! runtime API discovery since a rendered [`opm_core::resource::Resource`]
//! carries an arbitrary GVK unknown at compile time.

pub mod apply;
pub mod client;
pub mod delete;
pub mod diff;
pub mod dynamic;
pub mod error;
pub mod events;
pub mod prune;
pub mod status;
pub mod warnings;

/// Prelude re-exports the types most callers need.
pub mod prelude {
    pub use crate::apply::{self, Options as ApplyOptions, Outcome as ApplyOutcome};
    pub use crate::client;
    pub use crate::delete::{self, Outcome as DeleteOutcome, Target as DeleteTarget};
    pub use crate::diff::{self, Entry as DiffEntry, Status as DiffStatus};
    pub use crate::error::{Error, Result};
    pub use crate::events::{self, Entry as EventEntry, EventType};
    pub use crate::status::{self, Entry as StatusEntry, Health, Report as StatusReport};
    pub use crate::warnings::WarningLayer;
}
