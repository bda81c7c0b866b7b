//! Event records: the append-only log entries every mutation derives from.
//!
//! [`EventKind`] is a closed set. Every consumer matches on it
//! exhaustively, so adding a kind forces each application site to handle
//! it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::BranchId;

/// Ordering key of an event.
///
/// Keys compare by `time` first and `seq` second. `seq` is unique across
/// the whole log, so the order is strict even for events sharing a
/// timestamp.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[ts(export, export_to = "bindings/")]
pub struct EventKey {
    /// Physical time in Unix milliseconds, non-decreasing across the log.
    pub time: u64,
    /// Global sequence number, strictly increasing across the log.
    pub seq: u64,
}

impl core::fmt::Display for EventKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}#{}", self.time, self.seq)
    }
}

/// The intent carried by an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum EventKind {
    /// Advance the addressed branch by one turn.
    AdvanceTurn {
        /// Addressed branch.
        branch: BranchId,
    },
    /// Toggle a policy on the addressed branch.
    SetPolicy {
        /// Addressed branch.
        branch: BranchId,
        /// Policy to toggle.
        policy: String,
    },
    /// Select the branch subsequent commands and views refer to.
    SetBranch {
        /// Branch to select.
        branch: BranchId,
    },
    /// Select the UI screen.
    SetScreen {
        /// Screen name.
        screen: String,
    },
    /// Select the value highlighted in the UI.
    SetSelectedValue {
        /// Value name.
        value: String,
    },
    /// Create a branch. Without a parent this creates the root branch from
    /// the scenario's start values.
    CreateBranch {
        /// Identifier of the new branch.
        branch: BranchId,
        /// Branch to fork from, `None` for the root.
        parent: Option<BranchId>,
        /// Parent turn the new branch starts from.
        fork_turn: u64,
    },
    /// Rebuild the addressed branch's state as of a past turn for viewing.
    Rewind {
        /// Addressed branch.
        branch: BranchId,
        /// Turn to view.
        target_turn: u64,
    },
}

impl EventKind {
    /// Stable snake-case name of the kind, used as the persisted tag.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::AdvanceTurn { .. } => "advance_turn",
            Self::SetPolicy { .. } => "set_policy",
            Self::SetBranch { .. } => "set_branch",
            Self::SetScreen { .. } => "set_screen",
            Self::SetSelectedValue { .. } => "set_selected_value",
            Self::CreateBranch { .. } => "create_branch",
            Self::Rewind { .. } => "rewind",
        }
    }

    /// The branch whose simulation state this event touches, if any.
    ///
    /// Session-level events (`SetBranch`, `SetScreen`,
    /// `SetSelectedValue`) address no branch state.
    pub const fn addressed_branch(&self) -> Option<BranchId> {
        match self {
            Self::AdvanceTurn { branch }
            | Self::SetPolicy { branch, .. }
            | Self::CreateBranch { branch, .. }
            | Self::Rewind { branch, .. } => Some(*branch),
            Self::SetBranch { .. } | Self::SetScreen { .. } | Self::SetSelectedValue { .. } => {
                None
            }
        }
    }
}

/// A persisted event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct GameEvent {
    /// Ordering key.
    pub key: EventKey,
    /// Wall-clock creation time.
    pub created_at: DateTime<Utc>,
    /// The intent.
    pub kind: EventKind,
}
