//! Provider parses transformer definitions out of a provider CUE value,
//! producing fully qualified transformer entries ready for the matcher.
use std::collections::{BTreeMap, BTreeSet};

use tracing::{instrument, trace};

use crate::{
    cue,
    error::{Error, Result},
};

/// Transformer is a provider-supplied conversion rule: predicates plus a
/// parameterized conversion expression.
#[derive(Clone)]
pub struct Transformer {
    /// Fully qualified name, `<provider>#<name>`.
    pub fqn: String,
    /// Exact-match required labels.
    pub required_labels: BTreeMap<String, String>,
    /// Informational-only optional labels.
    pub optional_labels: BTreeMap<String, String>,
    /// Required resource FQNs.
    pub required_resources: BTreeSet<String>,
    /// Informational-only optional resource FQNs.
    pub optional_resources: BTreeSet<String>,
    /// Required trait FQNs.
    pub required_traits: BTreeSet<String>,
    /// Informational-only optional trait FQNs.
    pub optional_traits: BTreeSet<String>,
    /// The conversion expression: `(component, context) -> resource`.
    pub conversion: cue::Value,
}

/// Provider is a named collection of transformers plus metadata.
pub struct Provider {
    /// Provider name.
    pub name: String,
    /// Provider version.
    pub version: String,
    /// Minimum compatible module version, if declared.
    pub min_version: Option<String>,
    /// Provider-level labels.
    pub labels: BTreeMap<String, String>,
    /// Transformers, keyed by unqualified name.
    pub transformers: BTreeMap<String, Transformer>,
}

#[derive(serde::Deserialize)]
struct TransformerDef {
    #[serde(default)]
    required_labels: BTreeMap<String, String>,
    #[serde(default)]
    optional_labels: BTreeMap<String, String>,
    #[serde(default)]
    required_resources: BTreeSet<String>,
    #[serde(default)]
    optional_resources: BTreeSet<String>,
    #[serde(default)]
    required_traits: BTreeSet<String>,
    #[serde(default)]
    optional_traits: BTreeSet<String>,
}

#[derive(serde::Deserialize, Default)]
struct ProviderMeta {
    #[serde(default)]
    version: String,
    #[serde(default)]
    min_version: Option<String>,
    #[serde(default)]
    labels: BTreeMap<String, String>,
}

/// Select picks the provider to use out of `providers`, given an optional
/// explicit `name`. Per §4.4: empty name with exactly one provider
/// auto-selects; empty name with more than one fails listing the available
/// names; an unknown name fails listing the available names.
pub fn select<'a>(
    providers: &'a BTreeMap<String, cue::Value>,
    name: Option<&str>,
) -> Result<(&'a str, &'a cue::Value)> {
    match name {
        Some(name) => providers
            .get_key_value(name)
            .map(|(k, v)| (k.as_str(), v))
            .ok_or_else(|| {
                Error::ProviderSelection(format!(
                    "unknown provider `{name}`; available: {}",
                    available(providers)
                ))
            }),
        None => match providers.len() {
            1 => {
                let (k, v) = providers.iter().next().expect("len checked above");
                Ok((k.as_str(), v))
            }
            0 => Err(Error::ProviderSelection("no providers configured".into())),
            _ => Err(Error::ProviderSelection(format!(
                "multiple providers configured, specify one with --provider; available: {}",
                available(providers)
            ))),
        },
    }
}

fn available(providers: &BTreeMap<String, cue::Value>) -> String {
    providers.keys().cloned().collect::<Vec<_>>().join(", ")
}

/// Load parses `value` (the selected provider's CUE value) into a
/// [`Provider`], fully qualifying every transformer entry.
#[instrument(skip(value), fields(provider = name))]
pub fn load(name: &str, value: &cue::Value) -> Result<Provider> {
    let meta: ProviderMeta = value.decode().unwrap_or_default();

    let transformers_value = value
        .lookup_path("transformers")
        .ok_or_else(|| Error::BadTransformer {
            transformer: format!("{name}#*"),
            cause: "provider has no `transformers` field".into(),
        })?;

    let mut transformers = BTreeMap::new();
    for (tname, tvalue) in transformers_value.fields() {
        trace!(transformer = tname, "loading transformer");
        let def: TransformerDef = tvalue.decode().map_err(|e| Error::BadTransformer {
            transformer: format!("{name}#{tname}"),
            cause: e.to_string(),
        })?;
        let conversion = tvalue
            .lookup_path("convert")
            .ok_or_else(|| Error::BadTransformer {
                transformer: format!("{name}#{tname}"),
                cause: "missing `convert` expression".into(),
            })?;
        transformers.insert(
            tname.clone(),
            Transformer {
                fqn: format!("{name}#{tname}"),
                required_labels: def.required_labels,
                optional_labels: def.optional_labels,
                required_resources: def.required_resources,
                optional_resources: def.optional_resources,
                required_traits: def.required_traits,
                optional_traits: def.optional_traits,
                conversion,
            },
        );
    }

    if transformers.is_empty() {
        return Err(Error::BadTransformer {
            transformer: format!("{name}#*"),
            cause: "provider declares zero transformers".into(),
        });
    }

    Ok(Provider {
        name: name.to_string(),
        version: meta.version,
        min_version: meta.min_version,
        labels: meta.labels,
        transformers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_autoselects_single_provider() {
        let mut providers = BTreeMap::new();
        providers.insert("kubernetes".to_string(), fake_value());
        let (name, _) = select(&providers, None).expect("select");
        assert_eq!(name, "kubernetes");
    }

    #[test]
    fn select_requires_name_with_multiple_providers() {
        let mut providers = BTreeMap::new();
        providers.insert("kubernetes".to_string(), fake_value());
        providers.insert("nomad".to_string(), fake_value());
        let err = select(&providers, None).unwrap_err();
        assert!(matches!(err, Error::ProviderSelection(_)));
    }

    #[test]
    fn select_rejects_unknown_name() {
        let mut providers = BTreeMap::new();
        providers.insert("kubernetes".to_string(), fake_value());
        let err = select(&providers, Some("nomad")).unwrap_err();
        assert!(matches!(err, Error::ProviderSelection(_)));
    }

    fn fake_value() -> cue::Value {
        let rt = cue::Runtime::new().expect("runtime");
        rt.compile_bytes(b"{}").expect("compile")
    }
}
