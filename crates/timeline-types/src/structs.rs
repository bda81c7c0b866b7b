//! Simulation state and read-side projections.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::events::EventKey;
use crate::ids::BranchId;

/// Current numeric values keyed by value name.
pub type ValueMap = BTreeMap<String, f64>;

/// Effective influence weights: destination value -> source value -> weight.
pub type WeightMap = BTreeMap<String, BTreeMap<String, Weight>>;

/// An effective influence edge for one turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Weight {
    /// Base weight plus the deltas of all active policies.
    pub multiplier: f64,
    /// Lower clamp on the edge contribution.
    pub min: Option<f64>,
    /// Upper clamp on the edge contribution.
    pub max: Option<f64>,
}

/// Terminal status of a branch. `Won` and `Lost` are absorbing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum TerminalStatus {
    /// The scenario has not ended on this branch.
    #[default]
    Ongoing,
    /// The win condition was met.
    Won,
    /// The lose condition was met.
    Lost,
}

impl TerminalStatus {
    /// Whether the branch has reached a terminal status.
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Ongoing)
    }
}

/// Simulation state of one branch at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct BranchState {
    /// Current values.
    pub values: ValueMap,
    /// Weight map used for the most recent recomputation.
    pub weights: WeightMap,
    /// Names of active policies.
    pub active_policies: BTreeSet<String>,
    /// Turn counter.
    pub turn: u64,
    /// Sticky terminal status.
    pub terminal: TerminalStatus,
}

/// A node of the branch tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Branch {
    /// Branch identity.
    pub id: BranchId,
    /// Parent branch, `None` for the root.
    pub parent: Option<BranchId>,
    /// Creation sequence number (0 for the root).
    pub ordinal: u32,
    /// Parent turn the branch was forked at.
    pub fork_turn: u64,
    /// Key of the last parent event included in the fork, if any.
    pub forked_at: Option<EventKey>,
    /// Creation time of the branch.
    pub created_at: DateTime<Utc>,
    /// Key of the last event applied to this branch.
    pub last_applied: Option<EventKey>,
}

/// Session-wide selection state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct GameStore {
    /// Branch commands and views refer to.
    pub current_branch: Option<BranchId>,
    /// UI screen name.
    pub current_screen: String,
    /// Value highlighted in the UI.
    pub selected_value: Option<String>,
    /// Whether the current branch is viewed at a past turn.
    pub rewound: bool,
    /// Key of the last committed event.
    pub last_event: Option<EventKey>,
}

/// Per-branch entry of the branch tree projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct BranchSummary {
    /// The branch record.
    pub branch: Branch,
    /// Turn of the live head.
    pub live_turn: u64,
    /// Turn currently being viewed on this branch.
    pub rewound_turn: u64,
    /// Terminal status of the live head.
    pub terminal: TerminalStatus,
}

/// One entry of the save-slot list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SlotStatus {
    /// Slot name.
    pub name: String,
    /// Whether the slot already holds a saved game.
    pub exists: bool,
    /// Whether this is the slot being played.
    pub active: bool,
}

/// What the rendering layer shows: the selection state plus the resolved
/// state of the current branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TimelineView {
    /// Selection state.
    pub store: GameStore,
    /// Current branch record.
    pub branch: Option<Branch>,
    /// Rewound state when `store.rewound`, live state otherwise.
    pub state: Option<BranchState>,
    /// Turn of the current branch's live head.
    pub live_turn: Option<u64>,
}

/// Outcome of a committed command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct CommitReceipt {
    /// Key assigned to the event.
    pub key: EventKey,
    /// Kind name of the event.
    pub kind: String,
    /// Branch whose state the event touched, if any.
    pub branch: Option<BranchId>,
    /// Live turn of that branch after the commit.
    pub turn: Option<u64>,
    /// Rewound flag after the commit.
    pub rewound: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_status_defaults_to_ongoing() {
        let state = BranchState::default();
        assert_eq!(state.terminal, TerminalStatus::Ongoing);
        assert!(!state.terminal.is_terminal());
        assert!(TerminalStatus::Won.is_terminal());
        assert!(TerminalStatus::Lost.is_terminal());
    }

    #[test]
    fn terminal_status_serializes_snake_case() {
        let json = serde_json::to_string(&TerminalStatus::Won).unwrap_or_default();
        assert_eq!(json, "\"won\"");
    }
}
