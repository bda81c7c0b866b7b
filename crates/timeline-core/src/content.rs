//! Content loading and validation.
//!
//! A [`Content`] is the closed, validated definition set a session runs
//! against. Every name referenced by a definition resolves, so the value
//! model and policy engine never meet a dangling reference at runtime.
//! Any inconsistency is a [`ContentError`] raised before the first event
//! is applied.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use timeline_types::{
    GameEndCondition, PoliciesDocument, PolicyDefinition, ScenarioDocument, TURN_TARGET,
    ValueDefinition, ValueMap, ValuesDocument,
};

use crate::config::ContentConfig;

/// Errors raised while loading or validating content.
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    /// A content document could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// The document path.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A content document is not valid JSON for its schema.
    #[error("failed to parse {document} document: {source}")]
    Json {
        /// Which document (`values`, `policies`, `scenario`).
        document: &'static str,
        /// The underlying parse error.
        source: serde_json::Error,
    },

    /// A definition's `name` differs from its key.
    #[error("{document} entry keyed '{key}' is named '{name}'")]
    NameMismatch {
        /// Which document.
        document: &'static str,
        /// The map key.
        key: String,
        /// The `name` field.
        name: String,
    },

    /// A value uses the reserved end-condition target name.
    #[error("value name '{0}' is reserved")]
    ReservedName(String),

    /// A start value has no definition.
    #[error("start value '{0}' has no definition")]
    UndefinedStartValue(String),

    /// A defined value has no start value.
    #[error("value '{0}' has no start value")]
    MissingStartValue(String),

    /// A definition references an unknown value.
    #[error("{context} references unknown value '{name}'")]
    UnknownValue {
        /// Where the reference appears.
        context: String,
        /// The unknown name.
        name: String,
    },

    /// A clamp has its lower bound above its upper bound.
    #[error("{context} has min {min} above max {max}")]
    InvertedBounds {
        /// Where the clamp appears.
        context: String,
        /// Lower bound.
        min: f64,
        /// Upper bound.
        max: f64,
    },

    /// A mutual-exclusion group references an unknown policy.
    #[error("mutual-exclusion group {group} references unknown policy '{name}'")]
    UnknownPolicy {
        /// Index of the group.
        group: usize,
        /// The unknown name.
        name: String,
    },
}

/// Validated value, policy, and scenario definitions.
#[derive(Debug, Clone, PartialEq)]
pub struct Content {
    values: ValuesDocument,
    policies: PoliciesDocument,
    scenario: ScenarioDocument,
    exclusions: BTreeMap<String, BTreeSet<String>>,
}

impl Content {
    /// Validate and assemble the three documents.
    ///
    /// # Errors
    ///
    /// Returns the first [`ContentError`] found.
    pub fn new(
        values: ValuesDocument,
        policies: PoliciesDocument,
        scenario: ScenarioDocument,
    ) -> Result<Self, ContentError> {
        validate_values(&values, &scenario)?;
        validate_policies(&values, &policies)?;
        validate_condition("win condition", &scenario.win_condition, &values)?;
        validate_condition("lose condition", &scenario.lose_condition, &values)?;

        let exclusions = exclusion_index(&policies);

        Ok(Self {
            values,
            policies,
            scenario,
            exclusions,
        })
    }

    /// Parse and validate content from three JSON strings.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::Json`] for malformed documents, or a
    /// validation error.
    pub fn from_json(values: &str, policies: &str, scenario: &str) -> Result<Self, ContentError> {
        let values = serde_json::from_str(values).map_err(|source| ContentError::Json {
            document: "values",
            source,
        })?;
        let policies = serde_json::from_str(policies).map_err(|source| ContentError::Json {
            document: "policies",
            source,
        })?;
        let scenario = serde_json::from_str(scenario).map_err(|source| ContentError::Json {
            document: "scenario",
            source,
        })?;
        Self::new(values, policies, scenario)
    }

    /// Read, parse, and validate the documents named in the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::Io`] if a file cannot be read, otherwise as
    /// [`Content::from_json`].
    pub fn load(config: &ContentConfig) -> Result<Self, ContentError> {
        let values = read_document(&config.values_path)?;
        let policies = read_document(&config.policies_path)?;
        let scenario = read_document(&config.scenario_path)?;
        let content = Self::from_json(&values, &policies, &scenario)?;
        tracing::info!(
            values = content.values.values.len(),
            policies = content.policies.policies.len(),
            exclusion_groups = content.policies.mutual_exclusive.len(),
            "Content loaded"
        );
        Ok(content)
    }

    /// All value definitions in name order.
    pub fn values(&self) -> impl Iterator<Item = &ValueDefinition> {
        self.values.values.values()
    }

    /// Look up a policy definition.
    pub fn policy(&self, name: &str) -> Option<&PolicyDefinition> {
        self.policies.policies.get(name)
    }

    /// All policy names in sorted order.
    pub fn policy_names(&self) -> impl Iterator<Item = &str> {
        self.policies.policies.keys().map(String::as_str)
    }

    /// All value names in sorted order.
    pub fn value_names(&self) -> impl Iterator<Item = &str> {
        self.values.values.keys().map(String::as_str)
    }

    /// Policies sharing a mutual-exclusion group with `name`.
    pub fn excluded_by(&self, name: &str) -> impl Iterator<Item = &str> {
        self.exclusions
            .get(name)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    /// Mutual-exclusion groups as authored.
    pub fn exclusion_groups(&self) -> &[Vec<String>] {
        &self.policies.mutual_exclusive
    }

    /// The scenario definition.
    pub const fn scenario(&self) -> &ScenarioDocument {
        &self.scenario
    }

    /// Values at turn 0 of the root branch.
    pub const fn start_values(&self) -> &ValueMap {
        &self.scenario.start_values
    }
}

fn read_document(path: &Path) -> Result<String, ContentError> {
    std::fs::read_to_string(path).map_err(|source| ContentError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn validate_values(values: &ValuesDocument, scenario: &ScenarioDocument) -> Result<(), ContentError> {
    for (key, def) in &values.values {
        if *key != def.name {
            return Err(ContentError::NameMismatch {
                document: "values",
                key: key.clone(),
                name: def.name.clone(),
            });
        }
        if key == TURN_TARGET {
            return Err(ContentError::ReservedName(key.clone()));
        }
        if !scenario.start_values.contains_key(key) {
            return Err(ContentError::MissingStartValue(key.clone()));
        }
        check_bounds(|| format!("value '{key}'"), def.min, def.max)?;
        for edge in &def.affected_by {
            require_value(values, &format!("influence on '{key}'"), &edge.name)?;
            check_bounds(
                || format!("influence '{}' on '{key}'", edge.name),
                edge.min,
                edge.max,
            )?;
        }
    }
    for name in scenario.start_values.keys() {
        if !values.values.contains_key(name) {
            return Err(ContentError::UndefinedStartValue(name.clone()));
        }
    }
    Ok(())
}

fn validate_policies(values: &ValuesDocument, policies: &PoliciesDocument) -> Result<(), ContentError> {
    for (key, def) in &policies.policies {
        if *key != def.name {
            return Err(ContentError::NameMismatch {
                document: "policies",
                key: key.clone(),
                name: def.name.clone(),
            });
        }
        for flat in &def.flat {
            require_value(values, &format!("flat amount of '{key}'"), &flat.value_name)?;
        }
        for change in &def.weight_change {
            require_value(values, &format!("weight change of '{key}'"), &change.dest)?;
            require_value(values, &format!("weight change of '{key}'"), &change.source)?;
        }
        for restriction in &def.restrictions {
            require_value(
                values,
                &format!("restriction of '{key}'"),
                &restriction.value_name,
            )?;
        }
    }
    for (group, members) in policies.mutual_exclusive.iter().enumerate() {
        for name in members {
            if !policies.policies.contains_key(name) {
                return Err(ContentError::UnknownPolicy {
                    group,
                    name: name.clone(),
                });
            }
        }
    }
    Ok(())
}

fn validate_condition(
    context: &str,
    condition: &GameEndCondition,
    values: &ValuesDocument,
) -> Result<(), ContentError> {
    if condition.targets_turn() {
        return Ok(());
    }
    require_value(values, context, &condition.name)
}

fn check_bounds(
    context: impl FnOnce() -> String,
    min: Option<f64>,
    max: Option<f64>,
) -> Result<(), ContentError> {
    match (min, max) {
        (Some(min), Some(max)) if min > max => Err(ContentError::InvertedBounds {
            context: context(),
            min,
            max,
        }),
        _ => Ok(()),
    }
}

fn require_value(values: &ValuesDocument, context: &str, name: &str) -> Result<(), ContentError> {
    if values.values.contains_key(name) {
        Ok(())
    } else {
        Err(ContentError::UnknownValue {
            context: context.to_owned(),
            name: name.to_owned(),
        })
    }
}

/// Map each policy to every other member of every group containing it.
fn exclusion_index(policies: &PoliciesDocument) -> BTreeMap<String, BTreeSet<String>> {
    let mut index: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for group in &policies.mutual_exclusive {
        for member in group {
            let others = index.entry(member.clone()).or_default();
            others.extend(group.iter().filter(|other| *other != member).cloned());
        }
    }
    index
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const VALUES: &str = r#"{
        "values": {
            "trust": {
                "name": "trust",
                "natural_change": 0,
                "min": 0,
                "max": 100,
                "affected_by": [{"name": "trust", "weight": 0.1}]
            },
            "budget": {
                "name": "budget",
                "natural_change": -1,
                "affected_by": []
            }
        }
    }"#;

    pub(crate) const POLICIES: &str = r#"{
        "policies": {
            "P": {"name": "P", "flat": [{"value_name": "trust", "amount": 5}]},
            "Q": {"name": "Q", "flat": [{"value_name": "trust", "amount": -3}]},
            "R": {
                "name": "R",
                "weight_change": [{"dest": "budget", "source": "trust", "weight": 0.5}],
                "restrictions": [{"value_name": "budget", "amount": 10}]
            }
        },
        "mutual_exclusive": [["P", "Q"]]
    }"#;

    pub(crate) const SCENARIO: &str = r#"{
        "start_values": {"trust": 50, "budget": 20},
        "win_condition": {"name": "trust", "sign": "+", "value": 90},
        "lose_condition": {"name": "trust", "sign": "-", "value": 10}
    }"#;

    /// The shared fixture used across core tests.
    pub(crate) fn sample_content() -> Content {
        Content::from_json(VALUES, POLICIES, SCENARIO).unwrap()
    }

    #[test]
    fn flagged_bounds_load() {
        let values = r#"{
            "values": {
                "trust": {
                    "name": "trust",
                    "natural_change": 0,
                    "min": {"set": true, "value": 0},
                    "max": {"set": true, "value": 100},
                    "affected_by": [{
                        "name": "trust",
                        "weight": 0.1,
                        "min": {"set": false, "value": 0},
                        "max": {"set": false, "value": 0}
                    }]
                },
                "budget": {
                    "name": "budget",
                    "natural_change": -1,
                    "min": {"set": false, "value": 0},
                    "max": {"set": false, "value": 0},
                    "affected_by": []
                }
            }
        }"#;
        let policies = r#"{
            "policies": {
                "R": {
                    "name": "R",
                    "flat": [],
                    "weight_change": [],
                    "Restrictions": [{"value_name": "budget", "amount": 10}]
                }
            },
            "mutual_exclusive": []
        }"#;
        let content = Content::from_json(values, policies, SCENARIO).unwrap();

        let trust = content.values().find(|def| def.name == "trust").unwrap();
        assert_eq!(trust.min, Some(0.0));
        assert_eq!(trust.max, Some(100.0));
        let edge = trust.affected_by.first().unwrap();
        assert!(edge.min.is_none());
        assert!(edge.max.is_none());

        let budget = content.values().find(|def| def.name == "budget").unwrap();
        assert!(budget.min.is_none());
        assert!(budget.max.is_none());

        assert_eq!(content.policy("R").unwrap().restrictions.len(), 1);
    }

    #[test]
    fn sample_content_is_valid() {
        let content = sample_content();
        assert_eq!(content.value_names().collect::<Vec<_>>(), vec!["budget", "trust"]);
        assert_eq!(content.policy_names().count(), 3);
        assert_eq!(content.excluded_by("P").collect::<Vec<_>>(), vec!["Q"]);
        assert_eq!(content.excluded_by("R").count(), 0);
        assert_eq!(content.exclusion_groups().len(), 1);
    }

    #[test]
    fn unknown_influence_source_is_rejected() {
        let values = r#"{"values": {"trust": {"name": "trust",
            "affected_by": [{"name": "ghost", "weight": 1}]}}}"#;
        let scenario = r#"{"start_values": {"trust": 1},
            "win_condition": {"name": "turn", "sign": "+", "value": 10},
            "lose_condition": {"name": "trust", "sign": "-", "value": 0}}"#;
        let result = Content::from_json(values, r#"{"policies": {}}"#, scenario);
        assert!(matches!(
            result,
            Err(ContentError::UnknownValue { ref name, .. }) if name == "ghost"
        ));
    }

    #[test]
    fn unknown_end_condition_value_is_rejected() {
        let scenario = r#"{"start_values": {"trust": 50, "budget": 20},
            "win_condition": {"name": "happiness", "sign": "+", "value": 10},
            "lose_condition": {"name": "trust", "sign": "-", "value": 0}}"#;
        let result = Content::from_json(VALUES, POLICIES, scenario);
        assert!(matches!(result, Err(ContentError::UnknownValue { .. })));
    }

    #[test]
    fn unknown_exclusion_member_is_rejected() {
        let policies = r#"{"policies": {"P": {"name": "P"}}, "mutual_exclusive": [["P", "Z"]]}"#;
        let result = Content::from_json(VALUES, policies, SCENARIO);
        assert!(matches!(
            result,
            Err(ContentError::UnknownPolicy { group: 0, ref name }) if name == "Z"
        ));
    }

    #[test]
    fn restriction_on_unknown_value_is_rejected() {
        let policies = r#"{"policies": {"P": {"name": "P",
            "restrictions": [{"value_name": "gold", "amount": 1}]}}}"#;
        let result = Content::from_json(VALUES, policies, SCENARIO);
        assert!(matches!(result, Err(ContentError::UnknownValue { .. })));
    }

    #[test]
    fn missing_start_value_is_rejected() {
        let scenario = r#"{"start_values": {"trust": 50},
            "win_condition": {"name": "turn", "sign": "+", "value": 10},
            "lose_condition": {"name": "trust", "sign": "-", "value": 0}}"#;
        let result = Content::from_json(VALUES, POLICIES, scenario);
        assert!(matches!(result, Err(ContentError::MissingStartValue(ref n)) if n == "budget"));
    }

    #[test]
    fn undefined_start_value_is_rejected() {
        let scenario = r#"{"start_values": {"trust": 50, "budget": 20, "gold": 1},
            "win_condition": {"name": "turn", "sign": "+", "value": 10},
            "lose_condition": {"name": "trust", "sign": "-", "value": 0}}"#;
        let result = Content::from_json(VALUES, POLICIES, scenario);
        assert!(matches!(result, Err(ContentError::UndefinedStartValue(ref n)) if n == "gold"));
    }

    #[test]
    fn name_mismatch_is_rejected() {
        let policies = r#"{"policies": {"P": {"name": "Other"}}}"#;
        let result = Content::from_json(VALUES, policies, SCENARIO);
        assert!(matches!(result, Err(ContentError::NameMismatch { .. })));
    }

    #[test]
    fn reserved_value_name_is_rejected() {
        let values = r#"{"values": {"turn": {"name": "turn"}}}"#;
        let scenario = r#"{"start_values": {"turn": 0},
            "win_condition": {"name": "turn", "sign": "+", "value": 10},
            "lose_condition": {"name": "turn", "sign": "-", "value": -1}}"#;
        let result = Content::from_json(values, r#"{"policies": {}}"#, scenario);
        assert!(matches!(result, Err(ContentError::ReservedName(_))));
    }

    #[test]
    fn inverted_clamp_is_rejected() {
        let values = r#"{"values": {"trust": {"name": "trust", "min": 10, "max": 5}}}"#;
        let scenario = r#"{"start_values": {"trust": 7},
            "win_condition": {"name": "turn", "sign": "+", "value": 10},
            "lose_condition": {"name": "trust", "sign": "-", "value": 0}}"#;
        let result = Content::from_json(values, r#"{"policies": {}}"#, scenario);
        assert!(matches!(result, Err(ContentError::InvertedBounds { .. })));
    }

    #[test]
    fn malformed_json_names_the_document() {
        let result = Content::from_json(VALUES, "{not json", SCENARIO);
        assert!(matches!(
            result,
            Err(ContentError::Json {
                document: "policies",
                ..
            })
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let config = ContentConfig {
            values_path: PathBuf::from("does/not/exist/values.json"),
            ..ContentConfig::default()
        };
        let result = Content::load(&config);
        assert!(matches!(result, Err(ContentError::Io { .. })));
    }
}
