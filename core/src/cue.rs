//! Cue is the thin boundary around the CUE evaluator. Per the design notes
//! ("Evaluator coupling"), OPM never reimplements CUE; this module wraps
//! [`cuengine`] (the same FFI bridge to the upstream CUE evaluator that
//! `cuenv` uses) behind a small value-model API: structural unification with
//! constraint checking, field-path injection, and expression re-evaluation.
use std::{
    collections::BTreeMap,
    env, ffi,
    path::{Path, PathBuf},
};

use serde::de::DeserializeOwned;
use tracing::trace;

/// EvalError wraps every failure mode the CUE boundary can report.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    /// The underlying evaluator reported a compile or evaluation error.
    #[error("cue error: {0}")]
    Engine(#[from] cuengine::Error),
    /// A value was not concrete where concreteness was required.
    #[error("value at `{0}` is not concrete")]
    NotConcrete(String),
    /// A field path did not exist in the value.
    #[error("no such field: {0}")]
    NoSuchField(String),
    /// Decoding the evaluated value into a Rust type failed.
    #[error("decode error at `{path}`: {cause}")]
    Decode {
        /// Path being decoded.
        path: String,
        /// Underlying decode failure.
        cause: serde_json::Error,
    },
}

/// Result typedef for this module.
pub type Result<T, E = EvalError> = std::result::Result<T, E>;

/// Runtime is the process-wide CUE evaluator handle. Per the concurrency
/// model, the runtime is never mutated during rendering; [`Value`]s carry
/// their own reference to it, so callers never need to thread it through
/// validation routines explicitly.
#[derive(Clone)]
pub struct Runtime {
    inner: cuengine::Runtime,
}

impl Runtime {
    /// New creates a fresh evaluator handle.
    pub fn new() -> Result<Self> {
        Ok(Self {
            inner: cuengine::Runtime::new()?,
        })
    }

    /// Compile_dir loads and unifies every `.cue` file in `dir` (after the
    /// caller has filtered any it doesn't want unified, e.g. rogue
    /// `values_*.cue` files) as one package instance.
    pub fn compile_dir(&self, dir: &Path, exclude: &[PathBuf]) -> Result<Value> {
        trace!(?dir, excluded = exclude.len(), "compiling cue package");
        let inst = self.inner.load_package(dir, exclude)?;
        Ok(Value {
            inner: inst,
            path: String::new(),
        })
    }

    /// Compile_file loads a single `.cue` file in isolation, used to reload
    /// `values.cue` outside of unification with the rest of the package.
    pub fn compile_file(&self, file: &Path) -> Result<Value> {
        trace!(?file, "compiling standalone cue file");
        let inst = self.inner.load_file(file)?;
        Ok(Value {
            inner: inst,
            path: String::new(),
        })
    }

    /// Compile_expr evaluates a standalone CUE expression against an empty
    /// scope, used for the provider catalog and generator context injection.
    pub fn compile_bytes(&self, src: &[u8]) -> Result<Value> {
        let inst = self.inner.compile(src)?;
        Ok(Value {
            inner: inst,
            path: String::new(),
        })
    }
}

/// Value is an evaluated CUE value plus the path it was reached by, used for
/// error reporting.
#[derive(Clone)]
pub struct Value {
    inner: cuengine::Value,
    path: String,
}

impl Value {
    /// Path returns the CUE path this value was looked up at.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Lookup_path descends into a field path (e.g. `values.port`), returning
    /// `None` if the field does not exist.
    pub fn lookup_path(&self, path: &str) -> Option<Value> {
        self.inner.lookup_path(path).map(|inner| Value {
            inner,
            path: path.to_string(),
        })
    }

    /// Allows reports whether this (presumed open, struct-typed) value would
    /// accept a field with the given name without violating its schema.
    pub fn allows(&self, field: &str) -> bool {
        self.inner.allows(field)
    }

    /// Is_concrete reports whether every leaf of this value is a concrete,
    /// fully-resolved value (no unresolved disjunctions or bottom types).
    pub fn is_concrete(&self) -> bool {
        self.inner.is_concrete()
    }

    /// Unify combines this value with `other`, surfacing any resulting
    /// constraint conflict as an [`EvalError`].
    pub fn unify(&self, other: &Value) -> Result<Value> {
        let inner = self.inner.unify(&other.inner)?;
        Ok(Value {
            inner,
            path: self.path.clone(),
        })
    }

    /// Fill_path injects a concrete JSON value at `path`, returning the
    /// resulting unified value. Used both for release value injection and
    /// for transformer `#context`/`#component` injection.
    pub fn fill_path(&self, path: &str, value: &serde_json::Value) -> Result<Value> {
        let inner = self.inner.fill_path(path, value)?;
        Ok(Value {
            inner,
            path: self.path.clone(),
        })
    }

    /// Position reports the `file:line:column` the evaluator attributes this
    /// value to, if the underlying instance carries source position
    /// information (it always does for values read from a file).
    pub fn position(&self) -> Option<String> {
        self.inner.position()
    }

    /// Decode converts this value to a Rust type via its JSON projection.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        let json = self.inner.to_json().map_err(EvalError::Engine)?;
        serde_json::from_value(json).map_err(|cause| EvalError::Decode {
            path: self.path.clone(),
            cause,
        })
    }

    /// Fields iterates the direct struct fields of this value, in the order
    /// the evaluator reports them (which, for OPM's purposes, must always be
    /// post-sorted by callers that need determinism).
    pub fn fields(&self) -> Vec<(String, Value)> {
        self.inner
            .fields()
            .into_iter()
            .map(|(name, v)| {
                let path = if self.path.is_empty() {
                    name.clone()
                } else {
                    format!("{}.{name}", self.path)
                };
                (name, Value { inner: v, path })
            })
            .collect()
    }
}

/// RegistryGuard sets the evaluator's registry environment variables for the
/// lifetime of the guard and restores the prior values on drop — including on
/// panics unwinding through a `compile_dir` call — so the window during which
/// the process-wide registry configuration is mutated is exactly one
/// load operation, per the concurrency model's "Shared resource policy".
pub struct RegistryGuard {
    prior: BTreeMap<&'static str, Option<ffi::OsString>>,
}

const REGISTRY_ENV_VARS: &[&str] = &["CUE_REGISTRY", "CUE_REGISTRY_CONFIG"];

impl RegistryGuard {
    /// Install sets `CUE_REGISTRY` (and friends) to point at `registry`,
    /// remembering the prior values so they can be restored.
    pub fn install(registry: &str) -> Self {
        let mut prior = BTreeMap::new();
        for var in REGISTRY_ENV_VARS {
            prior.insert(*var, env::var_os(var));
        }
        // SAFETY: the CancellationToken-style single-window guard below
        // restores this on every exit path; only one load.Instances-equivalent
        // call runs at a time per the concurrency model.
        unsafe {
            env::set_var("CUE_REGISTRY", registry);
        }
        Self { prior }
    }
}

impl Drop for RegistryGuard {
    fn drop(&mut self) {
        for (var, value) in self.prior.drain() {
            // SAFETY: see `install`; this always runs, including on panic
            // unwind through the guarded region.
            unsafe {
                match value {
                    Some(v) => env::set_var(var, v),
                    None => env::remove_var(var),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_guard_restores_prior_state() {
        unsafe {
            env::remove_var("CUE_REGISTRY");
        }
        {
            let _g = RegistryGuard::install("example.com/registry");
            assert_eq!(env::var("CUE_REGISTRY").as_deref(), Ok("example.com/registry"));
        }
        assert!(env::var("CUE_REGISTRY").is_err());
    }
}
