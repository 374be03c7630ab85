//! Matcher evaluates every (component, transformer) pair and produces a
//! deterministic match plan, per §4.5.
use std::collections::BTreeMap;

use opm_core::prelude::{Component, Provider, Transformer};
use tracing::instrument;

/// Match is one evaluation of (component × transformer).
#[derive(Debug, Clone)]
pub struct Match {
    /// Component name.
    pub component: String,
    /// Transformer FQN.
    pub transformer: String,
    /// Whether every required predicate was satisfied.
    pub matched: bool,
    /// Required labels the component was missing.
    pub missing_labels: Vec<String>,
    /// Required resource FQNs the component was missing.
    pub missing_resources: Vec<String>,
    /// Required trait FQNs the component was missing.
    pub missing_traits: Vec<String>,
    /// Optional traits the component carries that this transformer, despite
    /// matching, does not declare as required or optional.
    pub unhandled_traits: Vec<String>,
    /// Human-readable explanation, suitable for `mod vet`/error output.
    pub reason: String,
}

/// MatchPlan is the complete evaluation log plus the list of unmatched
/// component names.
#[derive(Debug, Clone, Default)]
pub struct MatchPlan {
    /// Every (component, transformer) evaluation, in deterministic order.
    pub matches: Vec<Match>,
    /// Names of components with no matching transformer.
    pub unmatched: Vec<String>,
}

impl MatchPlan {
    /// Hits returns only the matched evaluations, in plan order.
    pub fn hits(&self) -> impl Iterator<Item = &Match> {
        self.matches.iter().filter(|m| m.matched)
    }

    /// Is_fully_matched reports whether every component matched at least one
    /// transformer.
    pub fn is_fully_matched(&self) -> bool {
        self.unmatched.is_empty()
    }
}

/// Match runs the matcher algorithm from §4.5 over `components` and
/// `provider`, sorting both component and transformer names before nested
/// iteration so the resulting plan is deterministic (property 7).
#[instrument(skip_all, fields(components = components.len(), transformers = provider.transformers.len()))]
pub fn run(components: &BTreeMap<String, Component>, provider: &Provider) -> MatchPlan {
    let mut plan = MatchPlan::default();

    // BTreeMap already iterates in sorted key order, satisfying the
    // "sort before nested iteration" requirement without an explicit sort.
    for (cname, component) in components {
        let mut any_matched = false;
        for (_, transformer) in &provider.transformers {
            let m = evaluate(cname, component, transformer);
            if m.matched {
                any_matched = true;
            }
            plan.matches.push(m);
        }
        if !any_matched {
            plan.unmatched.push(cname.clone());
        }
    }

    plan
}

fn evaluate(component_name: &str, component: &Component, transformer: &Transformer) -> Match {
    let mut missing_labels = Vec::new();
    for (k, v) in &transformer.required_labels {
        match component.labels.get(k) {
            Some(have) if have == v => {}
            _ => missing_labels.push(k.clone()),
        }
    }

    let mut missing_resources = Vec::new();
    for fqn in &transformer.required_resources {
        if !component.resources.contains_key(fqn) {
            missing_resources.push(fqn.clone());
        }
    }

    let mut missing_traits = Vec::new();
    for fqn in &transformer.required_traits {
        if !component.traits.contains_key(fqn) {
            missing_traits.push(fqn.clone());
        }
    }

    let matched = missing_labels.is_empty() && missing_resources.is_empty() && missing_traits.is_empty();

    let unhandled_traits = if matched {
        let handled: std::collections::BTreeSet<_> = transformer
            .required_traits
            .iter()
            .chain(transformer.optional_traits.iter())
            .cloned()
            .collect();
        component
            .traits
            .keys()
            .filter(|t| !handled.contains(t.as_str()))
            .cloned()
            .collect()
    } else {
        Vec::new()
    };

    let reason = if matched {
        if unhandled_traits.is_empty() {
            format!("`{component_name}` matched `{}`", transformer.fqn)
        } else {
            format!(
                "`{component_name}` matched `{}` with unhandled traits: {}",
                transformer.fqn,
                unhandled_traits.join(", ")
            )
        }
    } else {
        let mut parts = Vec::new();
        if !missing_labels.is_empty() {
            parts.push(format!("missing labels: {}", missing_labels.join(", ")));
        }
        if !missing_resources.is_empty() {
            parts.push(format!("missing resources: {}", missing_resources.join(", ")));
        }
        if !missing_traits.is_empty() {
            parts.push(format!("missing traits: {}", missing_traits.join(", ")));
        }
        format!(
            "`{component_name}` did not match `{}` ({})",
            transformer.fqn,
            parts.join("; ")
        )
    };

    Match {
        component: component_name.to_string(),
        transformer: transformer.fqn.clone(),
        matched,
        missing_labels,
        missing_resources,
        missing_traits,
        unhandled_traits,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};

    fn component(name: &str, labels: &[(&str, &str)], traits: &[&str]) -> Component {
        Component {
            name: name.to_string(),
            labels: labels.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            resources: BTreeMap::new(),
            traits: traits
                .iter()
                .map(|t| (t.to_string(), serde_json::Value::Null))
                .collect(),
            spec: serde_json::Value::Null,
        }
    }

    fn transformer(fqn: &str, required_labels: &[(&str, &str)], required_traits: &[&str]) -> Transformer {
        let rt = opm_core::cue::Runtime::new().expect("runtime");
        Transformer {
            fqn: fqn.to_string(),
            required_labels: required_labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            optional_labels: BTreeMap::new(),
            required_resources: BTreeSet::new(),
            optional_resources: BTreeSet::new(),
            required_traits: required_traits.iter().map(|t| t.to_string()).collect(),
            optional_traits: BTreeSet::new(),
            conversion: rt.compile_bytes(b"{}").expect("compile"),
        }
    }

    #[test]
    fn unmatched_component_is_reported() {
        let mut components = BTreeMap::new();
        components.insert(
            "database".to_string(),
            component("database", &[("workload-type", "stateful")], &[]),
        );
        let mut transformers = BTreeMap::new();
        transformers.insert(
            "stateless".to_string(),
            transformer("kubernetes#stateless", &[("workload-type", "stateless")], &[]),
        );
        let provider = Provider {
            name: "kubernetes".into(),
            version: "v0".into(),
            min_version: None,
            labels: BTreeMap::new(),
            transformers,
        };

        let plan = run(&components, &provider);
        assert_eq!(plan.unmatched, vec!["database".to_string()]);
        assert!(!plan.matches[0].matched);
        assert_eq!(plan.matches[0].missing_labels, vec!["workload-type".to_string()]);
    }

    #[test]
    fn matched_component_reports_unhandled_optional_traits() {
        let mut components = BTreeMap::new();
        components.insert(
            "web".to_string(),
            component("web", &[("workload-type", "stateless")], &["opmodel.dev/traits#http"]),
        );
        let mut transformers = BTreeMap::new();
        transformers.insert(
            "stateless".to_string(),
            transformer("kubernetes#stateless", &[("workload-type", "stateless")], &[]),
        );
        let provider = Provider {
            name: "kubernetes".into(),
            version: "v0".into(),
            min_version: None,
            labels: BTreeMap::new(),
            transformers,
        };

        let plan = run(&components, &provider);
        assert!(plan.is_fully_matched());
        assert_eq!(
            plan.matches[0].unhandled_traits,
            vec!["opmodel.dev/traits#http".to_string()]
        );
    }

    #[test]
    fn plan_ordering_is_deterministic() {
        let mut components = BTreeMap::new();
        components.insert("web".to_string(), component("web", &[], &[]));
        components.insert("api".to_string(), component("api", &[], &[]));
        let mut transformers = BTreeMap::new();
        transformers.insert("b".to_string(), transformer("p#b", &[], &[]));
        transformers.insert("a".to_string(), transformer("p#a", &[], &[]));
        let provider = Provider {
            name: "p".into(),
            version: "v0".into(),
            min_version: None,
            labels: BTreeMap::new(),
            transformers,
        };

        let plan1 = run(&components, &provider);
        let plan2 = run(&components, &provider);
        let order1: Vec<_> = plan1.matches.iter().map(|m| (m.component.clone(), m.transformer.clone())).collect();
        let order2: Vec<_> = plan2.matches.iter().map(|m| (m.component.clone(), m.transformer.clone())).collect();
        assert_eq!(order1, order2);
        assert_eq!(order1[0], ("api".to_string(), "p#a".to_string()));
    }
}
