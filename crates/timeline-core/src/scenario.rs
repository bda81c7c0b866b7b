//! Scenario evaluator: win and lose checks.

use timeline_types::{ComparisonSign, GameEndCondition, ScenarioDocument, TerminalStatus, ValueMap};

/// Errors from end-condition evaluation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScenarioError {
    /// The condition names a value missing from the state.
    #[error("end condition references unknown value '{0}'")]
    UnknownValue(String),
}

/// Evaluate the scenario's end conditions. Win is checked first, so a turn
/// satisfying both reports [`TerminalStatus::Won`].
///
/// # Errors
///
/// Returns [`ScenarioError::UnknownValue`] if a condition names a value
/// absent from `values`.
pub fn evaluate_end(
    turn: u64,
    scenario: &ScenarioDocument,
    values: &ValueMap,
) -> Result<TerminalStatus, ScenarioError> {
    if condition_met(turn, &scenario.win_condition, values)? {
        return Ok(TerminalStatus::Won);
    }
    if condition_met(turn, &scenario.lose_condition, values)? {
        return Ok(TerminalStatus::Lost);
    }
    Ok(TerminalStatus::Ongoing)
}

/// Whether one condition holds. Both comparison directions are inclusive.
///
/// # Errors
///
/// Returns [`ScenarioError::UnknownValue`] for a missing value.
#[allow(clippy::cast_precision_loss)]
pub fn condition_met(
    turn: u64,
    condition: &GameEndCondition,
    values: &ValueMap,
) -> Result<bool, ScenarioError> {
    let observed = if condition.targets_turn() {
        turn as f64
    } else {
        *values
            .get(&condition.name)
            .ok_or_else(|| ScenarioError::UnknownValue(condition.name.clone()))?
    };
    Ok(match condition.sign {
        ComparisonSign::AtLeast => observed >= condition.value,
        ComparisonSign::AtMost => observed <= condition.value,
    })
}
