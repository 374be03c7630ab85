//! Pipeline sequences PREPARATION -> BUILD -> MATCHING -> GENERATE ->
//! FINALIZE and assembles the final [`RenderResult`], per §4.7.
use std::path::Path;

use opm_core::prelude::{Config, Loader, ModuleRelease, Module, ModuleMetadata, Provider, ReleaseBuilder, ReleaseMetadata};
use opm_core::{provider, resource::Resource};
use tokio_util::sync::CancellationToken;
use tracing::{instrument, warn};

use crate::{
    error::{Error, Result},
    generator,
    matcher::{self, MatchPlan},
};

/// Warning is an unhandled-optional-trait diagnostic: a component carries a
/// trait that none of its matched transformers declared as required or
/// optional.
#[derive(Debug, Clone)]
pub struct Warning {
    /// Component name.
    pub component: String,
    /// Unhandled trait FQN.
    pub trait_fqn: String,
}

/// RenderResult is the final assembled output of one pipeline run.
pub struct RenderResult {
    /// Module metadata for the rendered module.
    pub module: ModuleMetadata,
    /// Release metadata for the rendered release.
    pub release: ReleaseMetadata,
    /// Concrete, validated release values (post-injection).
    pub values: serde_json::Value,
    /// Rendered, sorted resources.
    pub resources: Vec<Resource>,
    /// The complete match evaluation log.
    pub match_plan: MatchPlan,
    /// Per-(component, transformer) generation failures, if any.
    pub errors: Vec<crate::error::TransformError>,
    /// Unhandled-optional-trait warnings (errors instead, in strict mode).
    pub warnings: Vec<Warning>,
}

/// Options configures one pipeline run.
pub struct Options<'a> {
    /// Module directory.
    pub dir: &'a Path,
    /// Release name.
    pub release_name: String,
    /// Target namespace.
    pub namespace: String,
    /// `--values` overlay files, applied in order.
    pub values_files: Vec<&'a Path>,
    /// Explicit `--provider` name, if any.
    pub provider: Option<&'a str>,
    /// Promote unhandled-trait warnings to errors.
    pub strict: bool,
}

/// Run executes the full render pipeline. PREPARATION, BUILD,
/// PROVIDER-LOAD, and MATCHING failures are fatal and returned as `Err`;
/// GENERATE failures are accumulated on the successful `RenderResult`.
#[instrument(skip(config, cancel), fields(dir = %opts.dir.display(), release = %opts.release_name))]
pub fn run(config: &Config, opts: Options<'_>, cancel: &CancellationToken) -> Result<RenderResult> {
    // PREPARATION
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }
    let loader = Loader::new((*config.cue).clone());
    let module = loader
        .load(opts.dir, config.registry.value.as_deref())
        .map_err(Error::Preparation)?;

    // BUILD
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }
    let release = build_release(&module, &opts, config)?;

    // PROVIDER-LOAD
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }
    let (provider_name, provider_value) =
        provider::select(&config.providers, opts.provider.or(config.provider.value.as_deref()))
            .map_err(Error::Preparation)?;
    let provider = provider::load(provider_name, provider_value).map_err(Error::Preparation)?;

    // MATCHING
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }
    let plan = matcher::run(&release.components, &provider);

    // GENERATE
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }
    let (resources, mut errors) = generator::generate(&plan, &release, &provider);

    // FINALIZE
    let warnings = collect_unhandled_trait_warnings(&plan);
    if opts.strict && !warnings.is_empty() {
        for w in &warnings {
            errors.push(crate::error::TransformError {
                component: w.component.clone(),
                transformer: "*".into(),
                cause: format!("unhandled trait `{}` (strict mode)", w.trait_fqn),
            });
        }
    } else if !warnings.is_empty() {
        warn!(count = warnings.len(), "unhandled optional traits");
    }

    Ok(RenderResult {
        module: module.metadata,
        release: release.metadata,
        values: release.values,
        resources,
        match_plan: plan,
        errors,
        warnings,
    })
}

fn build_release(module: &Module, opts: &Options<'_>, config: &Config) -> Result<ModuleRelease> {
    let mut builder = ReleaseBuilder::new(module, opts.release_name.clone(), opts.namespace.clone());
    for path in &opts.values_files {
        builder = builder.with_values_file(path);
    }
    builder.build(&config.cue).map_err(|e| match e {
        opm_core::error::Error::Validation(v) => Error::Validation(v),
        other => Error::Preparation(other),
    })
}

/// Collect_unhandled_trait_warnings sweeps the match plan's matched entries
/// and collects `{component, trait}` pairs where an optional trait is
/// unhandled by every matched transformer for that component.
fn collect_unhandled_trait_warnings(plan: &MatchPlan) -> Vec<Warning> {
    use std::collections::{BTreeMap, BTreeSet};

    let mut unhandled_per_component: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    let mut handled_per_component: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();

    for m in plan.hits() {
        let entry = unhandled_per_component.entry(&m.component).or_default();
        for t in &m.unhandled_traits {
            entry.insert(t.as_str());
        }
        // A trait unhandled by one matched transformer but handled by
        // another matched transformer for the same component is not a
        // warning: some transformer did account for it.
        let handled = handled_per_component.entry(&m.component).or_default();
        for t in entry.iter().copied().collect::<Vec<_>>() {
            if !m.unhandled_traits.iter().any(|u| u == t) {
                handled.insert(t);
            }
        }
    }

    let mut warnings = Vec::new();
    for (component, traits) in unhandled_per_component {
        let handled = handled_per_component.get(component);
        for t in traits {
            if handled.map(|h| h.contains(t)).unwrap_or(false) {
                continue;
            }
            warnings.push(Warning {
                component: component.to_string(),
                trait_fqn: t.to_string(),
            });
        }
    }
    warnings
}
