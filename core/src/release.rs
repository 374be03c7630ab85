//! Release builds a concrete, validated [`ModuleRelease`] from a [`Module`],
//! a release name, a namespace, and zero or more user-supplied values files.
use std::{collections::BTreeMap, path::Path};

use lazy_static::lazy_static;
use serde_json::Value as Json;
use tracing::{instrument, trace};
use uuid::Uuid;

use crate::{
    cue,
    error::{Error, Result, ValidationError},
    labels,
    module::{Component, ConfigSchema, Module, ModuleMetadata},
    resource::Labels,
};

lazy_static! {
    /// OPM_NAMESPACE is the fixed namespace UUID release identity is derived
    /// from, so that `releaseUUID` is a pure function of (fqn, name,
    /// namespace) across hosts, runs, and processes.
    pub static ref OPM_NAMESPACE: Uuid =
        Uuid::parse_str("8f14e45f-ceea-4e3e-9b3b-f5a1e1c6b3a0").expect("static uuid is valid");
}

/// Release_uuid computes the deterministic release identity: UUID5 over
/// `<fqn>|<release-name>|<namespace>` under the OPM namespace UUID.
pub fn release_uuid(fqn: &str, release_name: &str, namespace: &str) -> Uuid {
    let key = format!("{fqn}|{release_name}|{namespace}");
    Uuid::new_v5(&OPM_NAMESPACE, key.as_bytes())
}

/// ReleaseMetadata is the release-level identity stored both on
/// [`ModuleRelease`] and, separately, inside the inventory Secret's
/// `metadata` field.
#[derive(Debug, Clone)]
pub struct ReleaseMetadata {
    /// Release name, e.g. `blog`.
    pub name: String,
    /// Target namespace.
    pub namespace: String,
    /// Deterministic release identity.
    pub uuid: Uuid,
    /// The six (minus component) canonical release labels.
    pub labels: Labels,
}

/// ModuleRelease is a module bound to a concrete release name, namespace,
/// and user values: module + release name + namespace + concrete values +
/// computed release UUID.
pub struct ModuleRelease {
    /// Module metadata at release time.
    pub module: ModuleMetadata,
    /// Release-level identity.
    pub metadata: ReleaseMetadata,
    /// Concrete values, post-injection and validation.
    pub values: Json,
    /// Components, re-decoded from the values-injected value so fields
    /// templated off `values.*` reflect every `--values` overlay.
    pub components: BTreeMap<String, Component>,
}

/// Builder constructs [`ModuleRelease`]s from a [`Module`].
pub struct Builder<'a> {
    module: &'a Module,
    release_name: String,
    namespace: String,
    values_files: Vec<&'a Path>,
}

impl<'a> Builder<'a> {
    /// New starts a builder for `module`, targeting `release_name` in
    /// `namespace`.
    pub fn new(module: &'a Module, release_name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            module,
            release_name: release_name.into(),
            namespace: namespace.into(),
            values_files: Vec::new(),
        }
    }

    /// With_values_file registers a user-provided `--values` overlay file.
    pub fn with_values_file(mut self, path: &'a Path) -> Self {
        self.values_files.push(path);
        self
    }

    /// Build runs the five-step algorithm from §4.3: resolve identity,
    /// compute the release UUID, inject user values, validate them against
    /// the schema, and verify every component ends up concrete.
    #[instrument(skip(self, cue), fields(release = %self.release_name, namespace = %self.namespace))]
    pub fn build(self, cue: &cue::Runtime) -> Result<ModuleRelease> {
        let module_name = self.module.name().to_string();
        let namespace = self.namespace.clone();
        let uuid = release_uuid(self.module.fqn(), &self.release_name, &namespace);
        trace!(%uuid, "computed release uuid");

        let mut values_json = serde_json::Value::Object(Default::default());
        for path in &self.values_files {
            let overlay = cue.compile_file(path)?;
            let decoded: serde_json::Value = overlay.decode()?;
            merge_json(&mut values_json, decoded);
        }

        if let Some(schema) = &self.module.config_schema {
            let errors = validate_against_schema(schema, &values_json, "values");
            if !errors.is_empty() {
                return Err(Error::Validation(errors));
            }
        }

        let values_value = self.module.raw.clone().fill_path("values", &values_json)?;

        if !values_value.is_concrete() {
            return Err(Error::NotConcrete(
                "release values are not fully resolved after injection".into(),
            ));
        }

        let components = decode_components(&values_value)?;

        let labels = labels::release_labels(&module_name, &namespace, &self.release_name, &uuid.to_string());

        Ok(ModuleRelease {
            module: self.module.metadata.clone(),
            metadata: ReleaseMetadata {
                name: self.release_name,
                namespace,
                uuid,
                labels,
            },
            values: values_json,
            components,
        })
    }
}

/// Decode_components re-derives the component map from the values-injected
/// release value, so any component field templated off `values.*` picks up
/// every `--values` overlay rather than the Loader's pre-injection snapshot.
fn decode_components(values_value: &cue::Value) -> Result<BTreeMap<String, Component>> {
    let mut components = BTreeMap::new();
    let Some(components_value) = values_value.lookup_path("components") else {
        return Ok(components);
    };
    for (name, value) in components_value.fields() {
        let component: Component = value
            .decode()
            .map_err(|e| Error::MissingMetadata(format!("component `{name}`: {e}")))?;
        component.validate()?;
        components.insert(name, component);
    }
    Ok(components)
}

/// Validate_against_schema recursively walks `values`, testing every field
/// against `schema.Allows` and rewriting violation paths from `#config.X` to
/// `values.X` as required by property 9 (schema-error path rewriting).
/// Accumulates every violation rather than stopping at the first, so `mod
/// vet` can report them all in one pass.
fn validate_against_schema(schema: &ConfigSchema, values: &Json, path_prefix: &str) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    walk(schema, values, path_prefix, &mut errors);
    errors
}

fn walk(schema: &ConfigSchema, values: &Json, path: &str, errors: &mut Vec<ValidationError>) {
    let Json::Object(map) = values else {
        return;
    };
    for (field, value) in map {
        let field_path = format!("{path}.{field}");
        if !schema.allows(field) {
            errors.push(ValidationError {
                path: field_path,
                location: None,
                message: format!("field `{field}` not allowed by module configuration schema"),
                hint: Some("remove the field, or check the module's `#config` definition".into()),
            });
            continue;
        }
        let Some(field_schema_value) = schema.field(field) else {
            continue;
        };
        let position = field_schema_value.position();
        match &field_schema_value.unify(&constant_cue_placeholder(&field_schema_value, value)) {
            Ok(_) => {}
            Err(e) => {
                errors.push(ValidationError {
                    path: field_path.clone(),
                    location: position,
                    message: e.to_string(),
                    hint: None,
                });
                continue;
            }
        }
        if let Json::Object(_) = value {
            let nested = ConfigSchema::new(field_schema_value);
            walk(&nested, value, &field_path, errors);
        }
    }
}

/// Constant_cue_placeholder is a seam kept narrow on purpose: unifying a
/// concrete JSON leaf against its schema counterpart is delegated entirely to
/// the evaluator (via `fill_path` + `unify`), never reimplemented as ad hoc
/// Rust constraint checks. It exists so `walk` has a single call site to
/// evolve if the decode strategy changes.
fn constant_cue_placeholder(schema_value: &cue::Value, value: &Json) -> cue::Value {
    schema_value
        .fill_path("", value)
        .unwrap_or_else(|_| schema_value.clone())
}

fn merge_json(base: &mut Json, overlay: Json) {
    match (base, overlay) {
        (Json::Object(base_map), Json::Object(overlay_map)) => {
            for (k, v) in overlay_map {
                merge_json(base_map.entry(k).or_insert(Json::Null), v);
            }
        }
        (base, overlay) => *base = overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_uuid_is_deterministic() {
        let a = release_uuid("example.com/mc@v0", "mc", "games");
        let b = release_uuid("example.com/mc@v0", "mc", "games");
        assert_eq!(a, b);
    }

    #[test]
    fn release_uuid_is_sensitive_to_every_input() {
        let base = release_uuid("example.com/mc@v0", "mc", "games");
        assert_ne!(base, release_uuid("example.com/mc@v1", "mc", "games"));
        assert_ne!(base, release_uuid("example.com/mc@v0", "mc2", "games"));
        assert_ne!(base, release_uuid("example.com/mc@v0", "mc", "prod"));
    }

    #[test]
    fn merge_json_overlays_nested_fields() {
        let mut base = serde_json::json!({"a": {"b": 1, "c": 2}});
        merge_json(&mut base, serde_json::json!({"a": {"b": 9}}));
        assert_eq!(base, serde_json::json!({"a": {"b": 9, "c": 2}}));
    }
}
