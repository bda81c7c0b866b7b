//! Branch/timeline state manager.
//!
//! The [`Timeline`] owns every branch's live state and its rewound slot.
//! It never decides whether a command is valid: [`crate::apply::prepare`]
//! does that against a shared borrow and hands back a [`Transition`],
//! which [`Timeline::commit`] applies without failing.
//!
//! # Reconstruction
//!
//! Each branch keeps the state it was created with (its seed) and the
//! ordered list of turn advances and policy toggles applied to it since.
//! The state at turn `t` is rebuilt from the seed by replaying the toggles
//! applied at turns `<= t` and the advances applied at turns `< t`. Turns
//! before the seed resolve through the parent, whose history up to the
//! fork point the branch shares.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use timeline_types::{
    Branch, BranchId, BranchState, BranchSummary, EventKey, GameStore, TerminalStatus,
    TimelineView,
};

use crate::apply::Transition;
use crate::content::Content;
use crate::policy::{self, PolicyError};
use crate::scenario::{self, ScenarioError};
use crate::values;

/// Screen selected when a new game starts.
pub const MAIN_SCREEN: &str = "main";

/// Reasons a command cannot be applied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimelineError {
    /// The command addresses a branch that does not exist.
    #[error("unknown branch {0}")]
    UnknownBranch(BranchId),

    /// A policy toggle failed.
    #[error(transparent)]
    Policy(#[from] PolicyError),

    /// End-condition evaluation failed.
    #[error(transparent)]
    Scenario(#[from] ScenarioError),

    /// A rewind or fork targets a turn the branch has not reached.
    #[error("turn {requested} is beyond branch {branch}'s live turn {reachable}")]
    TurnBeyondReach {
        /// Addressed branch.
        branch: BranchId,
        /// Requested turn.
        requested: u64,
        /// The branch's live turn.
        reachable: u64,
    },

    /// A root branch was requested while branches already exist.
    #[error("a root branch already exists")]
    RootExists,

    /// A root branch was requested with a non-zero fork turn.
    #[error("root branch must start at turn 0, not {0}")]
    RootForkTurn(u64),

    /// The new branch id is already taken.
    #[error("branch {0} already exists")]
    BranchExists(BranchId),

    /// A command needs a current branch but none is selected.
    #[error("no branch is selected")]
    NoCurrentBranch,

    /// No more branch ordinals are available.
    #[error("branch limit reached")]
    TooManyBranches,

    /// The turn counter cannot advance further.
    #[error("turn counter overflow at turn {turn}")]
    TurnOverflow {
        /// Turn at which the advance was attempted.
        turn: u64,
    },
}

/// A branch-local operation kept for reconstruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryOp {
    /// One turn advance.
    Advance,
    /// A toggle of the named policy.
    TogglePolicy(String),
}

/// One entry of a branch's history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    /// Key of the event that applied the operation.
    pub key: EventKey,
    /// Live turn of the branch when the operation applied.
    pub turn: u64,
    /// The operation.
    pub op: HistoryOp,
}

#[derive(Debug, Clone, PartialEq)]
struct BranchNode {
    branch: Branch,
    seed: BranchState,
    history: Vec<HistoryEntry>,
}

/// The rewound view of one branch.
///
/// `Tracking` follows the live state. `Pinned` holds a state strictly
/// behind the live turn, so the rewound turn never exceeds the live turn.
#[derive(Debug, Clone, PartialEq)]
enum RewoundSlot {
    Tracking,
    Pinned(BranchState),
}

impl RewoundSlot {
    fn at(state: BranchState, live: &BranchState) -> Self {
        if state.turn < live.turn {
            Self::Pinned(state)
        } else {
            Self::Tracking
        }
    }
}

/// Every branch's live and rewound state plus the session selection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timeline {
    branches: BTreeMap<BranchId, BranchNode>,
    live: BTreeMap<BranchId, BranchState>,
    rewound: BTreeMap<BranchId, RewoundSlot>,
    store: GameStore,
}

impl Timeline {
    /// An empty timeline with no branches.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of branches.
    pub fn len(&self) -> usize {
        self.branches.len()
    }

    /// Whether no branch has been created yet.
    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }

    /// The session selection state.
    pub const fn store(&self) -> &GameStore {
        &self.store
    }

    /// A branch record.
    ///
    /// # Errors
    ///
    /// Returns [`TimelineError::UnknownBranch`] for an unknown id.
    pub fn branch(&self, id: BranchId) -> Result<&Branch, TimelineError> {
        self.node(id).map(|node| &node.branch)
    }

    /// The branch's live state.
    ///
    /// # Errors
    ///
    /// Returns [`TimelineError::UnknownBranch`] for an unknown id.
    pub fn live_state(&self, id: BranchId) -> Result<&BranchState, TimelineError> {
        self.live.get(&id).ok_or(TimelineError::UnknownBranch(id))
    }

    /// The branch's rewound state. Equal to the live state unless the
    /// branch has been rewound to an earlier turn.
    ///
    /// # Errors
    ///
    /// Returns [`TimelineError::UnknownBranch`] for an unknown id.
    pub fn rewound_state(&self, id: BranchId) -> Result<&BranchState, TimelineError> {
        match self.rewound.get(&id) {
            Some(RewoundSlot::Pinned(state)) => Ok(state),
            Some(RewoundSlot::Tracking) => self.live_state(id),
            None => Err(TimelineError::UnknownBranch(id)),
        }
    }

    /// Whether the branch is viewed at a turn behind its live head.
    pub fn is_rewound(&self, id: BranchId) -> bool {
        matches!(self.rewound.get(&id), Some(RewoundSlot::Pinned(_)))
    }

    /// The branch's applied advances and toggles in order.
    ///
    /// # Errors
    ///
    /// Returns [`TimelineError::UnknownBranch`] for an unknown id.
    pub fn history(&self, id: BranchId) -> Result<&[HistoryEntry], TimelineError> {
        self.node(id).map(|node| node.history.as_slice())
    }

    /// Branch tree in creation order.
    pub fn branch_tree(&self) -> Vec<BranchSummary> {
        let mut tree: Vec<BranchSummary> = self
            .branches
            .values()
            .filter_map(|node| {
                let live = self.live.get(&node.branch.id)?;
                let rewound = self.rewound_state(node.branch.id).ok()?;
                Some(BranchSummary {
                    branch: node.branch.clone(),
                    live_turn: live.turn,
                    rewound_turn: rewound.turn,
                    terminal: live.terminal,
                })
            })
            .collect();
        tree.sort_by_key(|summary| summary.branch.ordinal);
        tree
    }

    /// The selection state with the current branch's resolved state.
    pub fn view(&self) -> TimelineView {
        let current = self.store.current_branch;
        let state = current.and_then(|id| {
            let resolved = if self.store.rewound {
                self.rewound_state(id)
            } else {
                self.live_state(id)
            };
            resolved.ok().cloned()
        });
        TimelineView {
            store: self.store.clone(),
            branch: current.and_then(|id| self.branch(id).ok().cloned()),
            state,
            live_turn: current.and_then(|id| self.live_state(id).ok().map(|s| s.turn)),
        }
    }

    /// Rebuild a branch's state as of `turn`.
    ///
    /// Also returns the key of the last event the reconstruction included,
    /// or `None` when it stops at the root seed.
    ///
    /// # Errors
    ///
    /// Returns [`TimelineError::UnknownBranch`] for an unknown id and
    /// [`TimelineError::TurnBeyondReach`] for a turn past the live head.
    pub fn reconstruct(
        &self,
        id: BranchId,
        turn: u64,
        content: &Content,
    ) -> Result<(BranchState, Option<EventKey>), TimelineError> {
        let reachable = self.live_state(id)?.turn;
        if turn > reachable {
            return Err(TimelineError::TurnBeyondReach {
                branch: id,
                requested: turn,
                reachable,
            });
        }

        let mut node = self.node(id)?;
        while turn < node.seed.turn {
            let parent = node.branch.parent.ok_or(TimelineError::TurnBeyondReach {
                branch: node.branch.id,
                requested: turn,
                reachable,
            })?;
            node = self.node(parent)?;
        }

        let mut state = node.seed.clone();
        let mut last = node.branch.forked_at;
        for entry in &node.history {
            let included = match entry.op {
                HistoryOp::Advance => entry.turn < turn,
                HistoryOp::TogglePolicy(_) => entry.turn <= turn,
            };
            if !included {
                break;
            }
            state = match &entry.op {
                HistoryOp::Advance => advance_state(&state, content)?,
                HistoryOp::TogglePolicy(name) => {
                    policy::activate(&mut state, name, content)?;
                    state
                }
            };
            last = Some(entry.key);
        }
        Ok((state, last))
    }

    /// Build the record and seed of a new branch.
    ///
    /// Without a parent this is the root, seeded from the scenario's start
    /// values. With one, the seed is the parent reconstructed at
    /// `fork_turn`.
    ///
    /// # Errors
    ///
    /// Returns [`TimelineError::BranchExists`], [`TimelineError::RootExists`],
    /// [`TimelineError::RootForkTurn`], or any reconstruction error.
    pub fn fork(
        &self,
        id: BranchId,
        parent: Option<BranchId>,
        fork_turn: u64,
        key: EventKey,
        created_at: DateTime<Utc>,
        content: &Content,
    ) -> Result<(Branch, BranchState), TimelineError> {
        if self.branches.contains_key(&id) {
            return Err(TimelineError::BranchExists(id));
        }
        let (seed, forked_at) = match parent {
            None => {
                if !self.is_empty() {
                    return Err(TimelineError::RootExists);
                }
                if fork_turn != 0 {
                    return Err(TimelineError::RootForkTurn(fork_turn));
                }
                (root_seed(content), None)
            }
            Some(parent) => self.reconstruct(parent, fork_turn, content)?,
        };
        let ordinal =
            u32::try_from(self.branches.len()).map_err(|_err| TimelineError::TooManyBranches)?;
        let branch = Branch {
            id,
            parent,
            ordinal,
            fork_turn,
            forked_at,
            created_at,
            last_applied: Some(key),
        };
        Ok((branch, seed))
    }

    /// Apply a prepared transition.
    pub fn commit(&mut self, key: EventKey, transition: Transition) {
        match transition {
            Transition::Advance { branch, state } => {
                let turn = state.turn.saturating_sub(1);
                self.set_live(branch, key, turn, HistoryOp::Advance, state);
            }
            Transition::TogglePolicy {
                branch,
                policy,
                state,
            } => {
                let turn = state.turn;
                self.set_live(branch, key, turn, HistoryOp::TogglePolicy(policy), state);
            }
            Transition::SelectBranch { branch } => {
                self.store.current_branch = Some(branch);
            }
            Transition::SelectScreen { screen } => {
                self.store.current_screen = screen;
            }
            Transition::SelectValue { value } => {
                self.store.selected_value = Some(value);
            }
            Transition::CreateBranch { branch, seed } => {
                let id = branch.id;
                tracing::info!(
                    branch = %id,
                    parent = ?branch.parent.map(|p| p.to_string()),
                    fork_turn = branch.fork_turn,
                    "Branch created"
                );
                self.live.insert(id, seed.clone());
                self.rewound.insert(id, RewoundSlot::Tracking);
                self.branches.insert(
                    id,
                    BranchNode {
                        branch,
                        seed,
                        history: Vec::new(),
                    },
                );
            }
            Transition::Rewind { branch, state } => {
                if let Some(live) = self.live.get(&branch) {
                    let slot = RewoundSlot::at(state, live);
                    self.rewound.insert(branch, slot);
                }
                self.touch(branch, key);
            }
        }
        self.store.last_event = Some(key);
        self.store.rewound = self
            .store
            .current_branch
            .is_some_and(|id| self.is_rewound(id));
    }

    fn set_live(
        &mut self,
        id: BranchId,
        key: EventKey,
        turn: u64,
        op: HistoryOp,
        state: BranchState,
    ) {
        if let Some(node) = self.branches.get_mut(&id) {
            node.history.push(HistoryEntry { key, turn, op });
            node.branch.last_applied = Some(key);
        }
        self.live.insert(id, state);
    }

    fn touch(&mut self, id: BranchId, key: EventKey) {
        if let Some(node) = self.branches.get_mut(&id) {
            node.branch.last_applied = Some(key);
        }
    }

    fn node(&self, id: BranchId) -> Result<&BranchNode, TimelineError> {
        self.branches.get(&id).ok_or(TimelineError::UnknownBranch(id))
    }
}

/// State of the root branch at turn 0.
pub fn root_seed(content: &Content) -> BranchState {
    let active = BTreeSet::new();
    BranchState {
        values: content.start_values().clone(),
        weights: values::weight_map(content, &active),
        active_policies: active,
        turn: 0,
        terminal: TerminalStatus::Ongoing,
    }
}

/// Advance a state by one turn.
///
/// Restrictions are checked against the current values, then the weight
/// map and values are recomputed and the turn increments. End conditions
/// are evaluated only while the state is not terminal.
///
/// # Errors
///
/// Returns [`TimelineError::TurnOverflow`] at the maximum turn, or a
/// scenario evaluation error.
pub fn advance_state(state: &BranchState, content: &Content) -> Result<BranchState, TimelineError> {
    let turn = state
        .turn
        .checked_add(1)
        .ok_or(TimelineError::TurnOverflow { turn: state.turn })?;

    let mut next = state.clone();
    policy::reevaluate(&mut next, content);
    next.weights = values::weight_map(content, &next.active_policies);
    next.values =
        values::recompute_values(&state.values, content, &next.weights, &next.active_policies);
    next.turn = turn;
    if !next.terminal.is_terminal() {
        next.terminal = scenario::evaluate_end(turn, content.scenario(), &next.values)?;
        if next.terminal.is_terminal() {
            tracing::info!(turn, status = ?next.terminal, "Branch reached terminal status");
        }
    }
    Ok(next)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use timeline_types::{EventKind, GameEvent};

    use super::*;
    use crate::apply::prepare;
    use crate::content::tests::sample_content;

    struct Harness {
        content: Content,
        timeline: Timeline,
        seq: u64,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                content: sample_content(),
                timeline: Timeline::new(),
                seq: 0,
            }
        }

        fn apply(&mut self, kind: EventKind) -> Result<EventKey, TimelineError> {
            self.seq += 1;
            let event = GameEvent {
                key: EventKey {
                    time: 1_000,
                    seq: self.seq,
                },
                created_at: Utc::now(),
                kind,
            };
            let transition = prepare(&self.timeline, &self.content, &event)?;
            self.timeline.commit(event.key, transition);
            Ok(event.key)
        }

        fn root(&mut self) -> BranchId {
            let root = BranchId::new();
            self.apply(EventKind::CreateBranch {
                branch: root,
                parent: None,
                fork_turn: 0,
            })
            .unwrap();
            self.apply(EventKind::SetBranch { branch: root }).unwrap();
            root
        }

        fn advance(&mut self, branch: BranchId, turns: u64) {
            for _ in 0..turns {
                self.apply(EventKind::AdvanceTurn { branch }).unwrap();
            }
        }
    }

    #[test]
    fn root_seed_uses_start_values() {
        let content = sample_content();
        let seed = root_seed(&content);
        assert_eq!(seed.turn, 0);
        assert_eq!(&seed.values, content.start_values());
        assert!(seed.active_policies.is_empty());
        assert_eq!(seed.terminal, TerminalStatus::Ongoing);
    }

    #[test]
    fn reconstruct_at_live_turn_equals_live_state() {
        let mut h = Harness::new();
        let root = h.root();
        h.advance(root, 2);
        h.apply(EventKind::SetPolicy {
            branch: root,
            policy: "P".to_owned(),
        })
        .unwrap();
        h.advance(root, 2);

        let (state, last) = h.timeline.reconstruct(root, 4, &h.content).unwrap();
        assert_eq!(&state, h.timeline.live_state(root).unwrap());
        assert_eq!(last, h.timeline.history(root).unwrap().last().map(|e| e.key));
    }

    #[test]
    fn reconstruct_includes_toggles_at_target_turn() {
        let mut h = Harness::new();
        let root = h.root();
        h.advance(root, 2);
        h.apply(EventKind::SetPolicy {
            branch: root,
            policy: "P".to_owned(),
        })
        .unwrap();
        h.advance(root, 1);

        let (at_two, _) = h.timeline.reconstruct(root, 2, &h.content).unwrap();
        assert_eq!(at_two.turn, 2);
        assert!(at_two.active_policies.contains("P"));

        let (at_one, _) = h.timeline.reconstruct(root, 1, &h.content).unwrap();
        assert!(at_one.active_policies.is_empty());
    }

    #[test]
    fn reconstruct_beyond_live_turn_is_rejected() {
        let mut h = Harness::new();
        let root = h.root();
        h.advance(root, 1);
        let result = h.timeline.reconstruct(root, 2, &h.content);
        assert!(matches!(
            result,
            Err(TimelineError::TurnBeyondReach {
                requested: 2,
                reachable: 1,
                ..
            })
        ));
    }

    #[test]
    fn fork_reads_shared_history_through_parent() {
        let mut h = Harness::new();
        let root = h.root();
        h.advance(root, 5);
        let child = BranchId::new();
        h.apply(EventKind::CreateBranch {
            branch: child,
            parent: Some(root),
            fork_turn: 3,
        })
        .unwrap();
        h.advance(child, 2);

        let (child_at_1, _) = h.timeline.reconstruct(child, 1, &h.content).unwrap();
        let (root_at_1, _) = h.timeline.reconstruct(root, 1, &h.content).unwrap();
        assert_eq!(child_at_1, root_at_1);
        assert_eq!(h.timeline.branch(child).unwrap().ordinal, 1);
    }

    #[test]
    fn rewound_slot_tracks_until_pinned() {
        let mut h = Harness::new();
        let root = h.root();
        h.advance(root, 3);
        assert!(!h.timeline.store().rewound);

        h.apply(EventKind::Rewind {
            branch: root,
            target_turn: 1,
        })
        .unwrap();
        assert!(h.timeline.store().rewound);
        assert_eq!(h.timeline.rewound_state(root).unwrap().turn, 1);

        // Live mutations leave a pinned slot alone.
        h.advance(root, 1);
        assert_eq!(h.timeline.rewound_state(root).unwrap().turn, 1);
        assert_eq!(h.timeline.live_state(root).unwrap().turn, 4);

        h.apply(EventKind::Rewind {
            branch: root,
            target_turn: 4,
        })
        .unwrap();
        assert!(!h.timeline.store().rewound);

        // A tracking slot follows the live head.
        h.advance(root, 1);
        assert_eq!(
            h.timeline.rewound_state(root).unwrap(),
            h.timeline.live_state(root).unwrap()
        );
    }

    #[test]
    fn rewound_flag_follows_current_branch() {
        let mut h = Harness::new();
        let root = h.root();
        h.advance(root, 2);
        let child = BranchId::new();
        h.apply(EventKind::CreateBranch {
            branch: child,
            parent: Some(root),
            fork_turn: 2,
        })
        .unwrap();
        h.apply(EventKind::Rewind {
            branch: root,
            target_turn: 0,
        })
        .unwrap();
        assert!(h.timeline.store().rewound);

        h.apply(EventKind::SetBranch { branch: child }).unwrap();
        assert!(!h.timeline.store().rewound);

        h.apply(EventKind::SetBranch { branch: root }).unwrap();
        assert!(h.timeline.store().rewound);
        assert_eq!(h.timeline.view().state.map(|s| s.turn), Some(0));
        assert_eq!(h.timeline.view().live_turn, Some(2));
    }

    #[test]
    fn second_root_is_rejected() {
        let mut h = Harness::new();
        h.root();
        let result = h.apply(EventKind::CreateBranch {
            branch: BranchId::new(),
            parent: None,
            fork_turn: 0,
        });
        assert_eq!(result, Err(TimelineError::RootExists));
    }

    #[test]
    fn root_must_start_at_turn_zero() {
        let mut h = Harness::new();
        let result = h.apply(EventKind::CreateBranch {
            branch: BranchId::new(),
            parent: None,
            fork_turn: 2,
        });
        assert_eq!(result, Err(TimelineError::RootForkTurn(2)));
        assert!(h.timeline.is_empty());
    }

    #[test]
    fn terminal_branch_keeps_advancing_without_reevaluation() {
        let content = sample_content();
        let mut state = root_seed(&content);
        state.terminal = TerminalStatus::Lost;
        // Trust rises toward the win threshold but the status is sticky.
        for _ in 0..20 {
            state = advance_state(&state, &content).unwrap();
        }
        assert_eq!(state.turn, 20);
        assert_eq!(state.terminal, TerminalStatus::Lost);
    }

    #[test]
    fn violated_restriction_drops_policy_before_recompute() {
        let content = sample_content();
        let mut state = root_seed(&content);
        state.active_policies.insert("R".to_owned());
        state.weights = values::weight_map(&content, &state.active_policies);
        state.values.insert("budget".to_owned(), 9.0);
        assert!(state.weights.get("budget").is_some_and(|m| m.contains_key("trust")));

        let next = advance_state(&state, &content).unwrap();
        assert!(!next.active_policies.contains("R"));
        assert!(next.weights.get("budget").is_none_or(|m| !m.contains_key("trust")));
        // budget only drifts: 9 - 1, with no trust contribution.
        let budget = next.values.get("budget").copied().unwrap();
        assert!((budget - 8.0).abs() < 1e-9);
    }

    #[test]
    fn turn_overflow_is_rejected() {
        let content = sample_content();
        let mut state = root_seed(&content);
        state.turn = u64::MAX;
        assert_eq!(
            advance_state(&state, &content),
            Err(TimelineError::TurnOverflow { turn: u64::MAX })
        );
    }

    #[test]
    fn branch_tree_is_in_creation_order() {
        let mut h = Harness::new();
        let root = h.root();
        h.advance(root, 1);
        let a = BranchId::new();
        let b = BranchId::new();
        for id in [a, b] {
            h.apply(EventKind::CreateBranch {
                branch: id,
                parent: Some(root),
                fork_turn: 1,
            })
            .unwrap();
        }
        let tree = h.timeline.branch_tree();
        let ids: Vec<BranchId> = tree.iter().map(|s| s.branch.id).collect();
        assert_eq!(ids, vec![root, a, b]);
        assert!(tree.iter().all(|s| s.live_turn == 1));
    }
}
