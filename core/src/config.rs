//! Config resolves the flag/env/config-file/default precedence chain into a
//! single runtime [`Config`], populated once per CLI invocation and read-only
//! thereafter (per the concurrency model's "Configuration is populated once
//! in `PersistentPreRunE`").
use std::{collections::BTreeMap, env, fs, path::PathBuf, sync::Arc};

use serde::Deserialize;

use crate::{cue, error::Result};

/// Source records which precedence tier resolved a [`Config`] field, for
/// `--verbose` debugging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Resolved from a `--flag`.
    Flag,
    /// Resolved from an environment variable.
    Env,
    /// Resolved from the config file.
    ConfigFile,
    /// Resolved from the module's declared default namespace.
    ModuleDefault,
    /// Resolved from the builtin default.
    Default,
}

/// Resolved pairs a value with the [`Source`] tier that produced it.
#[derive(Debug, Clone)]
pub struct Resolved<T> {
    /// The resolved value.
    pub value: T,
    /// Which precedence tier produced it.
    pub source: Source,
}

impl<T> Resolved<T> {
    fn new(value: T, source: Source) -> Self {
        Self { value, source }
    }
}

/// ApiWarningLevel controls how the reconciler's warning handler routes
/// Kubernetes API server warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ApiWarningLevel {
    /// Log at `warn` level.
    #[default]
    Warn,
    /// Log at `debug` level.
    Debug,
    /// Drop the warning entirely.
    Suppress,
}

/// KubeSettings is the resolved set of Kubernetes client knobs.
#[derive(Debug, Clone)]
pub struct KubeSettings {
    /// Path to the kubeconfig file.
    pub kubeconfig: Resolved<PathBuf>,
    /// kubeconfig context to use, if overridden.
    pub context: Resolved<Option<String>>,
    /// Default namespace for commands that don't specify one.
    pub namespace: Resolved<String>,
    /// How to route API server warnings.
    pub api_warnings: ApiWarningLevel,
}

/// ConfigFile is the on-disk shape of `~/.opm/config.cue`, decoded via the
/// CUE evaluator the same way a module's `values.cue` is decoded.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    /// Default OCI registry to pull module dependencies from.
    #[serde(default)]
    pub registry: Option<String>,
    /// Default kubeconfig path.
    #[serde(default)]
    pub kubeconfig: Option<String>,
    /// Default kubeconfig context.
    #[serde(default)]
    pub context: Option<String>,
    /// Default namespace.
    #[serde(default)]
    pub namespace: Option<String>,
    /// Default provider name.
    #[serde(default)]
    pub provider: Option<String>,
    /// Directory holding the provider catalog, one subdirectory per provider.
    #[serde(default)]
    pub providers_dir: Option<String>,
    /// API warning routing.
    #[serde(default)]
    pub api_warnings: Option<ApiWarningLevel>,
}

/// Inputs is the set of raw flag/env values the CLI layer has already parsed,
/// handed to [`Config::resolve`] so `opm-core` doesn't need to know about
/// `clap`.
#[derive(Debug, Clone, Default)]
pub struct Inputs {
    /// `--config`.
    pub config_path: Option<PathBuf>,
    /// `--registry`.
    pub registry: Option<String>,
    /// `--kubeconfig`.
    pub kubeconfig: Option<PathBuf>,
    /// `--context`.
    pub context: Option<String>,
    /// `--namespace`.
    pub namespace: Option<String>,
    /// `--provider`.
    pub provider: Option<String>,
    /// `--providers-dir`.
    pub providers_dir: Option<PathBuf>,
}

fn env_path(var: &str) -> Option<PathBuf> {
    env::var_os(var).map(PathBuf::from)
}

fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".opm/config.cue")
}

fn default_kubeconfig_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".kube/config")
}

fn default_providers_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".opm/providers")
}

/// Load_providers compiles every immediate subdirectory of `dir` as its own
/// CUE package, keyed by directory name, the same way [`crate::loader::Loader`]
/// compiles a module directory. A missing `dir` is not an error: it just
/// means no providers are configured yet.
fn load_providers(dir: &PathBuf, cue: &cue::Runtime) -> Result<BTreeMap<String, cue::Value>> {
    if !dir.is_dir() {
        return Ok(BTreeMap::new());
    }
    let mut entries: Vec<_> = fs::read_dir(dir)?.filter_map(|e| e.ok()).collect();
    entries.sort_by_key(std::fs::DirEntry::file_name);

    let mut providers = BTreeMap::new();
    for entry in entries {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let value = cue.compile_dir(&path, &[])?;
        providers.insert(name.to_string(), value);
    }
    Ok(providers)
}

/// Config is the fully resolved runtime configuration: flags, the resolved
/// config file path and registry, Kubernetes settings, the shared CUE
/// runtime handle, and the provider catalog.
pub struct Config {
    /// Resolved config file path (may not exist).
    pub config_path: Resolved<PathBuf>,
    /// Resolved config file contents, if the file exists and parsed.
    pub file: Option<ConfigFile>,
    /// Resolved OCI registry, if any source provided one.
    pub registry: Resolved<Option<String>>,
    /// Resolved Kubernetes client settings.
    pub kube: KubeSettings,
    /// Resolved provider selection, if any source provided one.
    pub provider: Resolved<Option<String>>,
    /// Shared CUE runtime handle.
    pub cue: Arc<cue::Runtime>,
    /// Provider name -> raw provider CUE value, compiled from the resolved
    /// providers directory (one subdirectory per provider).
    pub providers: BTreeMap<String, cue::Value>,
}

impl Config {
    /// Resolve applies the flag > env > config-file > default precedence
    /// chain described in §4.1, loading (but not requiring) the config file.
    pub fn resolve(inputs: Inputs, cue: Arc<cue::Runtime>) -> Result<Self> {
        let config_path = match (&inputs.config_path, env_path("OPM_CONFIG")) {
            (Some(p), _) => Resolved::new(p.clone(), Source::Flag),
            (None, Some(p)) => Resolved::new(p, Source::Env),
            (None, None) => Resolved::new(default_config_path(), Source::Default),
        };

        let file = load_config_file(&config_path.value, &cue)?;

        let registry = match (&inputs.registry, env::var("OPM_REGISTRY").ok()) {
            (Some(r), _) => Resolved::new(Some(r.clone()), Source::Flag),
            (None, Some(r)) => Resolved::new(Some(r), Source::Env),
            (None, None) => match file.as_ref().and_then(|f| f.registry.clone()) {
                Some(r) => Resolved::new(Some(r), Source::ConfigFile),
                None => Resolved::new(None, Source::Default),
            },
        };

        let kubeconfig = match (&inputs.kubeconfig, env_path("OPM_KUBECONFIG")) {
            (Some(p), _) => Resolved::new(p.clone(), Source::Flag),
            (None, Some(p)) => Resolved::new(p, Source::Env),
            (None, None) => match file.as_ref().and_then(|f| f.kubeconfig.clone()) {
                Some(p) => Resolved::new(PathBuf::from(p), Source::ConfigFile),
                None => Resolved::new(default_kubeconfig_path(), Source::Default),
            },
        };

        let context = match (&inputs.context, env::var("OPM_CONTEXT").ok()) {
            (Some(c), _) => Resolved::new(Some(c.clone()), Source::Flag),
            (None, Some(c)) => Resolved::new(Some(c), Source::Env),
            (None, None) => match file.as_ref().and_then(|f| f.context.clone()) {
                Some(c) => Resolved::new(Some(c), Source::ConfigFile),
                None => Resolved::new(None, Source::Default),
            },
        };

        let namespace = match (&inputs.namespace, env::var("OPM_NAMESPACE").ok()) {
            (Some(n), _) => Resolved::new(n.clone(), Source::Flag),
            (None, Some(n)) => Resolved::new(n, Source::Env),
            (None, None) => match file.as_ref().and_then(|f| f.namespace.clone()) {
                Some(n) => Resolved::new(n, Source::ConfigFile),
                None => Resolved::new("default".to_string(), Source::Default),
            },
        };

        let provider = match &inputs.provider {
            Some(p) => Resolved::new(Some(p.clone()), Source::Flag),
            None => match file.as_ref().and_then(|f| f.provider.clone()) {
                Some(p) => Resolved::new(Some(p), Source::ConfigFile),
                None => Resolved::new(None, Source::Default),
            },
        };

        let api_warnings = file
            .as_ref()
            .and_then(|f| f.api_warnings)
            .unwrap_or_default();

        let providers_dir = match (&inputs.providers_dir, env_path("OPM_PROVIDERS_DIR")) {
            (Some(p), _) => p.clone(),
            (None, Some(p)) => p,
            (None, None) => match file.as_ref().and_then(|f| f.providers_dir.clone()) {
                Some(p) => PathBuf::from(p),
                None => default_providers_dir(),
            },
        };
        let providers = load_providers(&providers_dir, &cue)?;

        Ok(Self {
            config_path,
            providers,
            file,
            registry,
            kube: KubeSettings {
                kubeconfig,
                context,
                namespace,
                api_warnings,
            },
            provider,
            cue,
        })
    }

    /// With_module_default_namespace inserts the module's declared default
    /// namespace between the env and config-file precedence steps, per
    /// §4.1's namespace-resolution addendum for pipeline commands. Only
    /// takes effect if neither a flag nor an env var already resolved the
    /// namespace.
    pub fn with_module_default_namespace(mut self, module_default: Option<&str>) -> Self {
        if matches!(self.kube.namespace.source, Source::ConfigFile | Source::Default) {
            if let Some(ns) = module_default {
                self.kube.namespace = Resolved::new(ns.to_string(), Source::ModuleDefault);
            }
        }
        self
    }
}

fn load_config_file(path: &PathBuf, cue: &cue::Runtime) -> Result<Option<ConfigFile>> {
    if !path.exists() {
        return Ok(None);
    }
    let value = cue.compile_file(path)?;
    let file: ConfigFile = value.decode()?;
    Ok(Some(file))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_outranks_env_and_default() {
        // SAFETY: test-only, no other test in this module mutates OPM_REGISTRY concurrently.
        unsafe {
            env::set_var("OPM_REGISTRY", "env.example.com");
        }
        let inputs = Inputs {
            registry: Some("flag.example.com".into()),
            ..Default::default()
        };
        let cue = Arc::new(cue::Runtime::new().expect("runtime"));
        let cfg = Config::resolve(inputs, cue).expect("resolve");
        assert_eq!(cfg.registry.value.as_deref(), Some("flag.example.com"));
        assert_eq!(cfg.registry.source, Source::Flag);
        unsafe {
            env::remove_var("OPM_REGISTRY");
        }
    }

    #[test]
    fn module_default_only_applies_when_nothing_more_specific_set() {
        let cue = Arc::new(cue::Runtime::new().expect("runtime"));
        let cfg = Config::resolve(Inputs::default(), cue).expect("resolve");
        let cfg = cfg.with_module_default_namespace(Some("games"));
        assert_eq!(cfg.kube.namespace.value, "games");
        assert_eq!(cfg.kube.namespace.source, Source::ModuleDefault);
    }

    #[test]
    fn explicit_namespace_flag_beats_module_default() {
        let cue = Arc::new(cue::Runtime::new().expect("runtime"));
        let inputs = Inputs {
            namespace: Some("prod".into()),
            ..Default::default()
        };
        let cfg = Config::resolve(inputs, cue)
            .expect("resolve")
            .with_module_default_namespace(Some("games"));
        assert_eq!(cfg.kube.namespace.value, "prod");
        assert_eq!(cfg.kube.namespace.source, Source::Flag);
    }
}
