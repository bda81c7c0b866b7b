//! Policy engine: toggling, mutual exclusion, and restriction-triggered
//! deactivation.

use timeline_types::BranchState;

use crate::content::Content;

/// Errors from policy operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    /// The policy is not defined by the content.
    #[error("unknown policy '{0}'")]
    UnknownPolicy(String),
}

/// Outcome of [`activate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Toggle {
    /// The policy was switched on. Lists the group members switched off.
    Activated {
        /// Policies removed by mutual exclusion.
        displaced: Vec<String>,
    },
    /// The policy was already active and has been switched off.
    Deactivated,
}

/// Toggle a policy on a branch state.
///
/// An active policy is switched off with no other effect. Otherwise every
/// other member of every exclusion group containing it is removed before
/// it is added.
///
/// # Errors
///
/// Returns [`PolicyError::UnknownPolicy`] without touching the state if
/// the content does not define `name`.
pub fn activate(
    state: &mut BranchState,
    name: &str,
    content: &Content,
) -> Result<Toggle, PolicyError> {
    if content.policy(name).is_none() {
        return Err(PolicyError::UnknownPolicy(name.to_owned()));
    }

    if state.active_policies.remove(name) {
        return Ok(Toggle::Deactivated);
    }

    let displaced: Vec<String> = content
        .excluded_by(name)
        .filter(|other| state.active_policies.remove(*other))
        .map(str::to_owned)
        .collect();
    state.active_policies.insert(name.to_owned());
    Ok(Toggle::Activated { displaced })
}

/// Deactivate every active policy with a violated restriction.
///
/// A restriction is violated when its value is strictly below the
/// amount. Returns the deactivated policy names in sorted order.
pub fn reevaluate(state: &mut BranchState, content: &Content) -> Vec<String> {
    let violated: Vec<String> = state
        .active_policies
        .iter()
        .filter(|name| {
            content.policy(name).is_some_and(|policy| {
                policy.restrictions.iter().any(|restriction| {
                    state
                        .values
                        .get(&restriction.value_name)
                        .is_some_and(|value| *value < restriction.amount)
                })
            })
        })
        .cloned()
        .collect();

    for name in &violated {
        state.active_policies.remove(name);
        tracing::warn!(policy = %name, turn = state.turn, "Policy restriction violated, deactivating");
    }
    violated
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::content::tests::sample_content;

    fn state_with(content: &Content, active: &[&str]) -> BranchState {
        BranchState {
            values: content.start_values().clone(),
            active_policies: active.iter().map(|n| (*n).to_owned()).collect(),
            ..BranchState::default()
        }
    }

    fn names(state: &BranchState) -> Vec<&str> {
        state.active_policies.iter().map(String::as_str).collect()
    }

    #[test]
    fn activating_active_policy_toggles_it_off() {
        let content = sample_content();
        let mut state = state_with(&content, &["P", "R"]);
        let toggle = activate(&mut state, "P", &content).unwrap();
        assert_eq!(toggle, Toggle::Deactivated);
        assert_eq!(names(&state), vec!["R"]);
    }

    #[test]
    fn activation_displaces_group_members() {
        let content = sample_content();
        let mut state = state_with(&content, &["Q", "R"]);
        let toggle = activate(&mut state, "P", &content).unwrap();
        assert_eq!(
            toggle,
            Toggle::Activated {
                displaced: vec!["Q".to_owned()]
            }
        );
        assert_eq!(names(&state), vec!["P", "R"]);
    }

    #[test]
    fn three_member_group_keeps_only_newcomer() {
        let policies = r#"{"policies": {
            "A": {"name": "A"}, "B": {"name": "B"}, "C": {"name": "C"}
        }, "mutual_exclusive": [["A", "B", "C"]]}"#;
        let content = Content::from_json(
            crate::content::tests::VALUES,
            policies,
            crate::content::tests::SCENARIO,
        )
        .unwrap();
        let mut state = state_with(&content, &["B"]);
        activate(&mut state, "A", &content).unwrap();
        assert_eq!(names(&state), vec!["A"]);
    }

    #[test]
    fn unknown_policy_is_rejected_without_mutation() {
        let content = sample_content();
        let mut state = state_with(&content, &["P"]);
        let before = state.clone();
        let result = activate(&mut state, "Nope", &content);
        assert_eq!(result, Err(PolicyError::UnknownPolicy("Nope".to_owned())));
        assert_eq!(state, before);
    }

    #[test]
    fn reevaluate_removes_only_violated_policies() {
        let content = sample_content();
        let mut state = state_with(&content, &["P", "R"]);
        // R requires budget >= 10.
        state.values.insert("budget".to_owned(), 9.5);
        let removed = reevaluate(&mut state, &content);
        assert_eq!(removed, vec!["R".to_owned()]);
        assert_eq!(names(&state), vec!["P"]);
    }

    #[test]
    fn restriction_at_threshold_is_not_violated() {
        let content = sample_content();
        let mut state = state_with(&content, &["R"]);
        state.values.insert("budget".to_owned(), 10.0);
        assert!(reevaluate(&mut state, &content).is_empty());
        assert_eq!(state.active_policies, BTreeSet::from(["R".to_owned()]));
    }

    #[test]
    fn policies_without_restrictions_survive() {
        let content = sample_content();
        let mut state = state_with(&content, &["P"]);
        state.values.insert("trust".to_owned(), -1000.0);
        state.values.insert("budget".to_owned(), -1000.0);
        assert!(reevaluate(&mut state, &content).is_empty());
        assert_eq!(names(&state), vec!["P"]);
    }
}
