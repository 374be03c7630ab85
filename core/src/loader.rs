//! Loader converts a module directory into an evaluated, validated
//! [`Module`]. Per §4.2, its one load-bearing responsibility beyond plain CUE
//! evaluation is values-file isolation: any `values_*.cue` file found beside
//! `values.cue` must fail the load fast, by name, rather than let the CUE
//! unifier surface an opaque "conflicting values" error.
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use tracing::{info, instrument, trace};

use crate::{
    cue,
    error::{Error, Result},
    module::{Component, ConfigSchema, Module, ModuleMetadata},
};

const VALUES_GLOB: &str = "values*.cue";
const VALUES_FILE: &str = "values.cue";

/// Loader evaluates module directories into [`Module`]s.
pub struct Loader {
    cue: cue::Runtime,
}

impl Loader {
    /// New wraps a CUE runtime handle.
    pub fn new(cue: cue::Runtime) -> Self {
        Self { cue }
    }

    /// Load evaluates the module at `dir`, optionally fetching dependencies
    /// from `registry` for the duration of the load, and returns the
    /// resulting [`Module`].
    #[instrument(skip(self), fields(dir = %dir.display()))]
    pub fn load(&self, dir: &Path, registry: Option<&str>) -> Result<Module> {
        if !dir.is_dir() {
            return Err(Error::NotFound(format!("module directory {}", dir.display())));
        }

        let rogue = find_rogue_values_files(dir)?;
        if !rogue.is_empty() {
            return Err(Error::RogueValuesFiles(rogue));
        }

        let _guard = registry.map(cue::RegistryGuard::install);

        let values_path = dir.join(VALUES_FILE);
        let exclude = if values_path.exists() {
            vec![values_path.clone()]
        } else {
            Vec::new()
        };

        trace!("evaluating module package");
        let pkg = self.cue.compile_dir(dir, &exclude)?;

        let values = if values_path.exists() {
            trace!("reloading values.cue standalone");
            Some(self.cue.compile_file(&values_path)?)
        } else {
            None
        };

        let merged = match values {
            Some(v) => pkg.unify(&v)?,
            None => pkg,
        };

        self.build_module(merged)
    }

    fn build_module(&self, raw: cue::Value) -> Result<Module> {
        let metadata_value = raw
            .lookup_path("metadata")
            .ok_or_else(|| Error::MissingMetadata("module has no `metadata` field".into()))?;
        let metadata: ModuleMetadata = metadata_value
            .decode()
            .map_err(|e| Error::MissingMetadata(e.to_string()))?;

        let config_schema = raw.lookup_path("#config").map(ConfigSchema::new);

        let components_value = raw.lookup_path("components");
        let mut components = BTreeMap::new();
        if let Some(components_value) = components_value {
            for (name, value) in components_value.fields() {
                let component = decode_component(&name, &value)?;
                components.insert(name, component);
            }
        }

        info!(
            module = metadata.name,
            fqn = metadata.fqn,
            components = components.len(),
            "module loaded"
        );

        Ok(Module {
            metadata,
            config_schema,
            components,
            raw,
        })
    }
}

fn decode_component(name: &str, value: &cue::Value) -> Result<Component> {
    let component: Component = value
        .decode()
        .map_err(|e| Error::MissingMetadata(format!("component `{name}`: {e}")))?;
    component.validate()?;
    Ok(component)
}

/// Find_rogue_values_files globs `dir` for `values*.cue` and returns every
/// match other than exactly `values.cue`, sorted for deterministic error
/// messages.
fn find_rogue_values_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = dir.join(VALUES_GLOB);
    let pattern = pattern.to_string_lossy().into_owned();
    let mut rogue = Vec::new();
    for entry in glob::glob(&pattern)? {
        let path = entry.map_err(|e| Error::Io(e.into_error()))?;
        if path.file_name().and_then(|n| n.to_str()) != Some(VALUES_FILE) {
            rogue.push(path);
        }
    }
    rogue.sort();
    Ok(rogue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn rogue_values_files_are_named_in_the_error() {
        let dir = tempdir();
        fs::write(dir.join("values.cue"), "serverType: \"PAPER\"\n").unwrap();
        fs::write(dir.join("values_forge.cue"), "serverType: \"FORGE\"\n").unwrap();
        fs::write(dir.join("values_dev.cue"), "debug: true\n").unwrap();

        let rogue = find_rogue_values_files(&dir).expect("glob");
        let names: Vec<_> = rogue
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["values_dev.cue", "values_forge.cue"]);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn plain_values_cue_alone_is_not_rogue() {
        let dir = tempdir();
        fs::write(dir.join("values.cue"), "serverType: \"PAPER\"\n").unwrap();
        let rogue = find_rogue_values_files(&dir).expect("glob");
        assert!(rogue.is_empty());
        fs::remove_dir_all(&dir).ok();
    }

    fn tempdir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("opm-loader-test-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }
}
