//! Module holds the evaluated-module intermediate representation the Loader
//! produces and every downstream component reads.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::cue;

/// ModuleMetadata is the module-level identity carried both on [`Module`]
/// and, separately, inside an inventory change entry (`moduleMetadata`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleMetadata {
    /// Human name, e.g. `blog`.
    pub name: String,
    /// Ecosystem-qualified fully qualified name, e.g. `example.com/blog@v0`.
    pub fqn: String,
    /// Semantic version, e.g. `v0` or `v0.3.1`.
    pub version: String,
    /// Default namespace to deploy into if the caller does not specify one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_namespace: Option<String>,
}

/// Component is a named entity within a module: a unified label set, the
/// resources and traits attached to it, and its merged spec.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Component {
    /// Component name within the module.
    pub name: String,
    /// Unified label set (merged from resources, traits, blueprints).
    pub labels: BTreeMap<String, String>,
    /// Attached resources, keyed by FQN.
    pub resources: BTreeMap<String, Json>,
    /// Attached traits, keyed by FQN.
    pub traits: BTreeMap<String, Json>,
    /// Merged spec value for this component.
    pub spec: Json,
}

/// COMPONENT_NAME_LABEL is the label every component (and every resource
/// generated from it) must carry.
pub const COMPONENT_NAME_LABEL: &str = "component.opmodel.dev/name";

impl Component {
    /// Validate checks the invariant that every component carries its own
    /// name label, merging conflicting label sources being an evaluation-time
    /// failure the Loader is expected to have already rejected.
    pub fn validate(&self) -> crate::error::Result<()> {
        match self.labels.get(COMPONENT_NAME_LABEL) {
            Some(v) if v == &self.name => Ok(()),
            _ => Err(crate::error::Error::MissingMetadata(format!(
                "component `{}` missing or mismatched `{COMPONENT_NAME_LABEL}` label",
                self.name
            ))),
        }
    }

    /// Is_concrete reports whether every trait/resource/spec field attached
    /// to this component is fully resolved. The Loader's CUE evaluation
    /// already enforces this for everything except user-supplied override
    /// points, so this is primarily exercised by the Release Builder after
    /// value injection.
    pub fn is_concrete(&self, value: &cue::Value) -> bool {
        value.is_concrete()
    }
}

/// ConfigSchema wraps the module's `#config` value: an open-typed record
/// defining constraints on user-supplied values.
#[derive(Clone)]
pub struct ConfigSchema {
    value: cue::Value,
}

impl ConfigSchema {
    /// New wraps an evaluated `#config` CUE value.
    pub fn new(value: cue::Value) -> Self {
        Self { value }
    }

    /// Allows reports whether `field` may be set without violating this
    /// schema, per §4.3 step 4's `schema.Allows(field)` check.
    pub fn allows(&self, field: &str) -> bool {
        self.value.allows(field)
    }

    /// Field looks up the schema's definition for `field`, first trying a
    /// literal match and falling back to a `[Name=string]` pattern
    /// constraint, matching §4.3 step 4's resolution order.
    pub fn field(&self, field: &str) -> Option<cue::Value> {
        self.value
            .lookup_path(field)
            .or_else(|| self.value.lookup_path(&format!("[{field}=string]")))
    }

    /// Value exposes the underlying CUE value, e.g. for unification during
    /// release value injection.
    pub fn value(&self) -> &cue::Value {
        &self.value
    }
}

/// Module is a named unit of authored configuration: the evaluated
/// intermediate representation the Loader produces and every downstream
/// component (Release Builder, Matcher, Generator) reads thereafter.
///
/// Invariant: `name` is always present; `fqn` and `version` are always
/// present; `config_schema`, when present, constrains `values`.
#[derive(Clone)]
pub struct Module {
    /// Module-level identity.
    pub metadata: ModuleMetadata,
    /// The module's `#config` schema, if it declares one.
    pub config_schema: Option<ConfigSchema>,
    /// Components flattened out of the module's component map.
    pub components: BTreeMap<String, Component>,
    /// The raw evaluated module value, kept for path-rewriting diagnostics
    /// and for any downstream lookup the typed view doesn't cover.
    pub raw: cue::Value,
}

impl Module {
    /// Name returns the module's human name.
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Fqn returns the module's fully qualified name.
    pub fn fqn(&self) -> &str {
        &self.metadata.fqn
    }

    /// Default_namespace returns the module's declared default namespace, if any.
    pub fn default_namespace(&self) -> Option<&str> {
        self.metadata.default_namespace.as_deref()
    }
}
