//! Content documents: value, policy, and scenario definitions.
//!
//! These structs mirror the three JSON documents a scenario is authored
//! in. They are plain data; cross-reference validation happens when the
//! core crate assembles them into a validated content set.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Name of the end-condition target that compares the turn counter
/// instead of a value.
pub const TURN_TARGET: &str = "turn";

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// An influence edge: the source value feeds into the owning value each
/// turn, scaled by `weight`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Influence {
    /// Name of the influencing value.
    pub name: String,
    /// Base multiplier applied to the source value.
    pub weight: f64,
    /// Lower clamp on this edge's contribution, if any.
    #[serde(default, deserialize_with = "deserialize_bound")]
    pub min: Option<f64>,
    /// Upper clamp on this edge's contribution, if any.
    #[serde(default, deserialize_with = "deserialize_bound")]
    pub max: Option<f64>,
}

/// Definition of a single simulated value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ValueDefinition {
    /// Value name (must match its key in [`ValuesDocument::values`]).
    pub name: String,
    /// Flat drift applied every turn.
    #[serde(default)]
    pub natural_change: f64,
    /// Lower clamp on the value, if any.
    #[serde(default, deserialize_with = "deserialize_bound")]
    pub min: Option<f64>,
    /// Upper clamp on the value, if any.
    #[serde(default, deserialize_with = "deserialize_bound")]
    pub max: Option<f64>,
    /// Influence edges feeding this value.
    #[serde(default)]
    pub affected_by: Vec<Influence>,
}

/// A clamp as written in content: a bare number, or a `{set, value}`
/// object where `set: false` means no clamp.
#[derive(Deserialize)]
#[serde(untagged)]
enum BoundRepr {
    Plain(f64),
    Flagged {
        set: bool,
        #[serde(default)]
        value: f64,
    },
}

fn deserialize_bound<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let bound = Option::<BoundRepr>::deserialize(deserializer)?;
    Ok(match bound {
        Some(BoundRepr::Plain(value)) => Some(value),
        Some(BoundRepr::Flagged { set: true, value }) => Some(value),
        Some(BoundRepr::Flagged { set: false, .. }) | None => None,
    })
}

/// The `values.json` document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ValuesDocument {
    /// Value definitions keyed by name.
    #[serde(default)]
    pub values: BTreeMap<String, ValueDefinition>,
}

// ---------------------------------------------------------------------------
// Policies
// ---------------------------------------------------------------------------

/// A flat amount added to a value every turn while the policy is active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct FlatAmount {
    /// Targeted value.
    pub value_name: String,
    /// Amount added per turn.
    pub amount: f64,
}

/// A delta applied to an influence edge while the policy is active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct WeightChange {
    /// Value receiving the influence.
    pub dest: String,
    /// Value providing the influence.
    pub source: String,
    /// Delta added to the edge's multiplier.
    pub weight: f64,
}

/// A restriction: the policy deactivates itself when the named value
/// drops below `amount`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Restriction {
    /// Watched value.
    pub value_name: String,
    /// Minimum amount the value must hold for the policy to stay active.
    pub amount: f64,
}

/// Definition of a single policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PolicyDefinition {
    /// Policy name (must match its key in [`PoliciesDocument::policies`]).
    pub name: String,
    /// Flat per-turn amounts.
    #[serde(default)]
    pub flat: Vec<FlatAmount>,
    /// Influence weight deltas.
    #[serde(default)]
    pub weight_change: Vec<WeightChange>,
    /// Auto-deactivation restrictions.
    #[serde(default, alias = "Restrictions")]
    pub restrictions: Vec<Restriction>,
}

/// The `policies.json` document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PoliciesDocument {
    /// Policy definitions keyed by name.
    #[serde(default)]
    pub policies: BTreeMap<String, PolicyDefinition>,
    /// Mutual-exclusion groups. Activating one member deactivates every
    /// other member of every group it belongs to.
    #[serde(default)]
    pub mutual_exclusive: Vec<Vec<String>>,
}

// ---------------------------------------------------------------------------
// Scenario
// ---------------------------------------------------------------------------

/// Direction of an end-condition comparison. Both directions are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum ComparisonSign {
    /// Satisfied once the target has risen to or past the threshold.
    #[serde(rename = "+", alias = ">=")]
    AtLeast,
    /// Satisfied once the target has fallen to or past the threshold.
    #[serde(rename = "-", alias = "<=")]
    AtMost,
}

/// A win or lose condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct GameEndCondition {
    /// [`TURN_TARGET`] or the name of a value.
    pub name: String,
    /// Comparison direction.
    pub sign: ComparisonSign,
    /// Threshold.
    pub value: f64,
}

impl GameEndCondition {
    /// Whether this condition compares the turn counter.
    pub fn targets_turn(&self) -> bool {
        self.name == TURN_TARGET
    }
}

/// The `scenario.json` document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ScenarioDocument {
    /// Values at turn 0 of the root branch.
    pub start_values: BTreeMap<String, f64>,
    /// Condition checked first each turn.
    pub win_condition: GameEndCondition,
    /// Condition checked when the win condition does not hold.
    pub lose_condition: GameEndCondition,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_definition_defaults_to_unclamped() {
        let json = r#"{"name": "trust"}"#;
        let def: Result<ValueDefinition, _> = serde_json::from_str(json);
        assert!(def.is_ok());
        let def = def.unwrap_or_else(|_| ValueDefinition {
            name: String::new(),
            natural_change: 1.0,
            min: Some(0.0),
            max: Some(0.0),
            affected_by: Vec::new(),
        });
        assert!(def.min.is_none());
        assert!(def.max.is_none());
        assert!(def.affected_by.is_empty());
    }

    #[test]
    fn bounds_accept_numbers_and_flagged_objects() {
        let json = r#"{
            "name": "trust",
            "min": {"set": true, "value": 0},
            "max": {"set": false, "value": 100},
            "affected_by": [
                {"name": "budget", "weight": 0.5, "min": -2, "max": null}
            ]
        }"#;
        let def: Result<ValueDefinition, _> = serde_json::from_str(json);
        assert!(def.is_ok());
        if let Ok(def) = def {
            assert_eq!(def.min, Some(0.0));
            assert_eq!(def.max, None);
            let edge = def.affected_by.first();
            assert_eq!(edge.and_then(|e| e.min), Some(-2.0));
            assert_eq!(edge.and_then(|e| e.max), None);
        }
    }

    #[test]
    fn bound_with_wrong_shape_is_rejected() {
        let json = r#"{"name": "trust", "min": "zero"}"#;
        let def: Result<ValueDefinition, _> = serde_json::from_str(json);
        assert!(def.is_err());
    }

    #[test]
    fn sign_accepts_symbols_and_aliases() {
        let plus: Result<ComparisonSign, _> = serde_json::from_str("\"+\"");
        let ge: Result<ComparisonSign, _> = serde_json::from_str("\">=\"");
        let minus: Result<ComparisonSign, _> = serde_json::from_str("\"-\"");
        let le: Result<ComparisonSign, _> = serde_json::from_str("\"<=\"");
        assert_eq!(plus.ok(), Some(ComparisonSign::AtLeast));
        assert_eq!(ge.ok(), Some(ComparisonSign::AtLeast));
        assert_eq!(minus.ok(), Some(ComparisonSign::AtMost));
        assert_eq!(le.ok(), Some(ComparisonSign::AtMost));
    }

    #[test]
    fn unknown_sign_is_rejected() {
        let bad: Result<ComparisonSign, _> = serde_json::from_str("\"~\"");
        assert!(bad.is_err());
    }

    #[test]
    fn policies_document_parses_groups() {
        let json = r#"{
            "policies": {
                "P": {"name": "P", "flat": [{"value_name": "trust", "amount": 5}]},
                "Q": {"name": "Q"}
            },
            "mutual_exclusive": [["P", "Q"]]
        }"#;
        let doc: Result<PoliciesDocument, _> = serde_json::from_str(json);
        assert!(doc.is_ok());
        let doc = doc.unwrap_or_default();
        assert_eq!(doc.policies.len(), 2);
        assert_eq!(doc.mutual_exclusive, vec![vec!["P".to_owned(), "Q".to_owned()]]);
    }
}
