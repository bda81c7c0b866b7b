//! Event application layer.
//!
//! [`prepare`] maps an event to the state change it causes, checking every
//! precondition against a shared borrow of the [`Timeline`]. Nothing is
//! mutated until the caller hands the returned [`Transition`] to
//! [`Timeline::commit`], so a rejected command leaves all state as it was.

use timeline_types::{Branch, BranchId, BranchState, EventKind, GameEvent};

use crate::content::Content;
use crate::policy::{self, Toggle};
use crate::timeline::{Timeline, TimelineError, advance_state};

/// A validated state change, ready to commit.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Replace a branch's live state after a turn advance.
    Advance {
        /// Addressed branch.
        branch: BranchId,
        /// State after the advance.
        state: BranchState,
    },
    /// Replace a branch's live state after a policy toggle.
    TogglePolicy {
        /// Addressed branch.
        branch: BranchId,
        /// Toggled policy.
        policy: String,
        /// State after the toggle.
        state: BranchState,
    },
    /// Select the current branch.
    SelectBranch {
        /// Branch to select.
        branch: BranchId,
    },
    /// Select the UI screen.
    SelectScreen {
        /// Screen name.
        screen: String,
    },
    /// Select the highlighted value.
    SelectValue {
        /// Value name.
        value: String,
    },
    /// Register a new branch.
    CreateBranch {
        /// The new branch record.
        branch: Branch,
        /// Its initial state.
        seed: BranchState,
    },
    /// Replace a branch's rewound slot.
    Rewind {
        /// Addressed branch.
        branch: BranchId,
        /// Reconstructed state.
        state: BranchState,
    },
}

/// Validate an event and compute its transition.
///
/// # Errors
///
/// Returns a [`TimelineError`] describing the failed precondition.
pub fn prepare(
    timeline: &Timeline,
    content: &Content,
    event: &GameEvent,
) -> Result<Transition, TimelineError> {
    match &event.kind {
        EventKind::AdvanceTurn { branch } => {
            let state = advance_state(timeline.live_state(*branch)?, content)?;
            Ok(Transition::Advance {
                branch: *branch,
                state,
            })
        }
        EventKind::SetPolicy { branch, policy } => {
            let mut state = timeline.live_state(*branch)?.clone();
            match policy::activate(&mut state, policy, content)? {
                Toggle::Activated { displaced } => {
                    tracing::debug!(branch = %branch, policy = %policy, ?displaced, "Policy activated");
                }
                Toggle::Deactivated => {
                    tracing::debug!(branch = %branch, policy = %policy, "Policy deactivated");
                }
            }
            Ok(Transition::TogglePolicy {
                branch: *branch,
                policy: policy.clone(),
                state,
            })
        }
        EventKind::SetBranch { branch } => {
            timeline.branch(*branch)?;
            Ok(Transition::SelectBranch { branch: *branch })
        }
        EventKind::SetScreen { screen } => Ok(Transition::SelectScreen {
            screen: screen.clone(),
        }),
        EventKind::SetSelectedValue { value } => Ok(Transition::SelectValue {
            value: value.clone(),
        }),
        EventKind::CreateBranch {
            branch,
            parent,
            fork_turn,
        } => {
            let (branch, seed) = timeline.fork(
                *branch,
                *parent,
                *fork_turn,
                event.key,
                event.created_at,
                content,
            )?;
            Ok(Transition::CreateBranch { branch, seed })
        }
        EventKind::Rewind {
            branch,
            target_turn,
        } => {
            let (state, _) = timeline.reconstruct(*branch, *target_turn, content)?;
            Ok(Transition::Rewind {
                branch: *branch,
                state,
            })
        }
    }
}
