//! Generator executes matched transformers by injecting release and
//! component context, decodes the CUE output to platform resources, and
//! aggregates errors, per §4.6.
use opm_core::{
    labels,
    prelude::{Component, ModuleRelease, Provider, Resource},
};
use serde_json::json;
use tracing::{instrument, trace, warn};

use crate::{error::TransformError, matcher::MatchPlan};

/// Context is the transformer-visible release/module/component context
/// injected at the `#context` path before evaluation.
fn build_context(release: &ModuleRelease, component_name: &str, component: &Component) -> serde_json::Value {
    json!({
        "module": {
            "name": release.module.name,
            "fqn": release.module.fqn,
            "version": release.module.version,
            "defaultNamespace": release.module.default_namespace,
        },
        "release": {
            "name": release.metadata.name,
            "namespace": release.metadata.namespace,
            "uuid": release.metadata.uuid.to_string(),
        },
        "component": {
            "name": component_name,
        },
        "labels": component.labels,
        "controllerLabels": labels::release_labels(
            &release.module.name,
            &release.metadata.namespace,
            &release.metadata.name,
            &release.metadata.uuid.to_string(),
        ),
    })
}

/// Generate executes every matched (component, transformer) pair in plan
/// order, producing resources and accumulating per-pair failures. Returns
/// `(resources, errors)`: the pipeline reports an error iff `errors` is
/// non-empty, per §4.6's fail-on-end semantics.
#[instrument(skip_all, fields(release = %release.metadata.name))]
pub fn generate(
    plan: &MatchPlan,
    release: &ModuleRelease,
    provider: &Provider,
) -> (Vec<Resource>, Vec<TransformError>) {
    let mut resources = Vec::new();
    let mut errors = Vec::new();

    for m in plan.hits() {
        let Some(component) = release.components.get(&m.component) else {
            errors.push(TransformError {
                component: m.component.clone(),
                transformer: m.transformer.clone(),
                cause: "component referenced by match plan no longer present in release".into(),
            });
            continue;
        };
        let Some(transformer) = find_transformer(provider, &m.transformer) else {
            errors.push(TransformError {
                component: m.component.clone(),
                transformer: m.transformer.clone(),
                cause: "transformer referenced by match plan no longer present in provider".into(),
            });
            continue;
        };

        trace!(component = %m.component, transformer = %m.transformer, "evaluating transformer");
        let context = build_context(release, &m.component, component);
        let component_value = &component.spec;

        let evaluated = transformer
            .conversion
            .fill_path("#context", &context)
            .and_then(|v| v.fill_path("#component", component_value));

        let evaluated = match evaluated {
            Ok(v) => v,
            Err(e) => {
                errors.push(TransformError {
                    component: m.component.clone(),
                    transformer: m.transformer.clone(),
                    cause: e.to_string(),
                });
                continue;
            }
        };

        let output = match evaluated.lookup_path("output") {
            Some(v) => v,
            None => {
                errors.push(TransformError {
                    component: m.component.clone(),
                    transformer: m.transformer.clone(),
                    cause: "transformer produced no `output` value".into(),
                });
                continue;
            }
        };

        match decode_resource(&output, &m.component) {
            Ok(mut resource) => {
                resource.stamp_labels(
                    &release.module.name,
                    &release.metadata.namespace,
                    &release.metadata.name,
                    &release.metadata.uuid.to_string(),
                );
                resources.push(resource);
            }
            Err(cause) => errors.push(TransformError {
                component: m.component.clone(),
                transformer: m.transformer.clone(),
                cause,
            }),
        }
    }

    opm_core::resource::sort_resources(&mut resources);

    if !errors.is_empty() {
        warn!(failures = errors.len(), "generator accumulated failures");
    }

    (resources, errors)
}

fn find_transformer<'a>(provider: &'a Provider, fqn: &str) -> Option<&'a opm_core::prelude::Transformer> {
    provider.transformers.values().find(|t| t.fqn == fqn)
}

#[derive(serde::Deserialize)]
struct DecodedMeta {
    #[serde(default)]
    namespace: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(serde::Deserialize)]
struct DecodedObject {
    #[serde(rename = "apiVersion")]
    api_version: String,
    kind: String,
    #[serde(default)]
    metadata: DecodedMeta,
}

fn decode_resource(output: &opm_core::cue::Value, component: &str) -> Result<Resource, String> {
    let payload: serde_json::Value = output.decode().map_err(|e| e.to_string())?;
    let decoded: DecodedObject = serde_json::from_value(payload.clone()).map_err(|e| e.to_string())?;
    let (group, version) = split_api_version(&decoded.api_version);
    let name = decoded
        .metadata
        .name
        .ok_or_else(|| "rendered resource has no metadata.name".to_string())?;

    Ok(Resource {
        gvk: opm_core::resource::Gvk::new(group, version, decoded.kind),
        name,
        namespace: decoded.metadata.namespace,
        component: component.to_string(),
        hook: false,
        payload,
    })
}

fn split_api_version(api_version: &str) -> (String, String) {
    match api_version.split_once('/') {
        Some((group, version)) => (group.to_string(), version.to_string()),
        None => (String::new(), api_version.to_string()),
    }
}
