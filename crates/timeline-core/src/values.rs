//! Value model: per-turn numeric recomputation over the influence graph.
//!
//! Both functions here are pure. They read a validated [`Content`], so every
//! name they look up resolves.

use std::collections::BTreeSet;

use timeline_types::{ValueMap, Weight, WeightMap};

use crate::content::Content;

/// Clamp `x` to the optional bounds. Unset bounds are no-ops.
pub fn clamp(x: f64, min: Option<f64>, max: Option<f64>) -> f64 {
    let x = min.map_or(x, |min| x.max(min));
    max.map_or(x, |max| x.min(max))
}

/// Derive the effective weight map for a set of active policies.
///
/// Each edge starts at its base weight and clamps from the value
/// definition, then every active policy's weight changes are added. A
/// change on an edge the definition lacks creates it with base 0.
pub fn weight_map(content: &Content, active: &BTreeSet<String>) -> WeightMap {
    let mut map = WeightMap::new();
    for def in content.values() {
        let edges = map.entry(def.name.clone()).or_default();
        for edge in &def.affected_by {
            edges.insert(
                edge.name.clone(),
                Weight {
                    multiplier: edge.weight,
                    min: edge.min,
                    max: edge.max,
                },
            );
        }
    }

    for policy in active.iter().filter_map(|name| content.policy(name)) {
        for change in &policy.weight_change {
            let weight = map
                .entry(change.dest.clone())
                .or_default()
                .entry(change.source.clone())
                .or_default();
            weight.multiplier += change.weight;
        }
    }
    map
}

/// Compute next turn's values from the current ones.
///
/// For each value: the sum of clamped edge contributions and active flat
/// amounts, plus the natural change, added to the current value and
/// clamped to the value's bounds. All contributions read `current`, never
/// a partially updated map.
pub fn recompute_values(
    current: &ValueMap,
    content: &Content,
    weights: &WeightMap,
    active: &BTreeSet<String>,
) -> ValueMap {
    let mut next = ValueMap::new();
    for def in content.values() {
        let own = current.get(&def.name).copied().unwrap_or_default();

        let from_edges: f64 = weights
            .get(&def.name)
            .into_iter()
            .flatten()
            .map(|(source, weight)| {
                let source_value = current.get(source).copied().unwrap_or_default();
                clamp(source_value * weight.multiplier, weight.min, weight.max)
            })
            .sum();

        let from_policies: f64 = active
            .iter()
            .filter_map(|name| content.policy(name))
            .flat_map(|policy| policy.flat.iter())
            .filter(|flat| flat.value_name == def.name)
            .map(|flat| flat.amount)
            .sum();

        let value = clamp(
            own + from_edges + from_policies + def.natural_change,
            def.min,
            def.max,
        );
        tracing::debug!(value = %def.name, from = own, to = value, "Recomputed value");
        next.insert(def.name.clone(), value);
    }
    next
}
