//! The session: one loaded game bound to its event log.
//!
//! A [`Session`] is the only way state changes. Commands go through
//! [`Session::submit`], which prepares the transition, appends the event,
//! and commits only once the append has succeeded. Opening a session
//! replays the whole log from empty state before any command is accepted.

use std::sync::Arc;

use chrono::Utc;
use timeline_events::{ClockError, EventClock, EventLog, unix_millis};
use timeline_types::{
    BranchId, BranchState, BranchSummary, CommitReceipt, EventKey, EventKind, GameEvent,
    GameStore, TimelineView,
};

use crate::apply::prepare;
use crate::content::Content;
use crate::timeline::{MAIN_SCREEN, Timeline, TimelineError};

/// Errors returned by session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The command failed a precondition. Nothing was logged or changed.
    #[error("invalid command: {0}")]
    InvalidCommand(#[from] TimelineError),

    /// The event log failed. In-memory state is unchanged.
    #[error("event log failure: {source}")]
    Persistence {
        /// The log's error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A stored event could not be replayed.
    #[error("replay failed at event {key}: {source}")]
    Replay {
        /// Key of the offending event.
        key: EventKey,
        /// Why it failed.
        source: TimelineError,
    },

    /// Event keys could not be assigned or are out of order.
    #[error(transparent)]
    Clock(#[from] ClockError),
}

impl SessionError {
    fn persistence<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
        Self::Persistence {
            source: Box::new(err),
        }
    }
}

/// A loaded game: content, derived state, event log, and key clock.
pub struct Session<L> {
    content: Arc<Content>,
    timeline: Timeline,
    log: L,
    clock: EventClock,
}

impl<L: EventLog> Session<L> {
    /// Open a session over `log`, replaying every stored event.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Persistence`] if the log cannot be read and
    /// [`SessionError::Replay`] or [`SessionError::Clock`] if a stored
    /// event does not apply.
    pub async fn open(content: Arc<Content>, log: L) -> Result<Self, SessionError> {
        let mut session = Self {
            content,
            timeline: Timeline::new(),
            log,
            clock: EventClock::new(),
        };
        session.reload().await?;
        Ok(session)
    }

    /// Discard in-memory state and replay the log from the beginning.
    ///
    /// Returns the number of events replayed. On failure the session keeps
    /// the state it had before the call.
    ///
    /// # Errors
    ///
    /// As [`Session::open`].
    pub async fn reload(&mut self) -> Result<usize, SessionError> {
        let events = self
            .log
            .load_ordered()
            .await
            .map_err(SessionError::persistence)?;

        let mut timeline = Timeline::new();
        let mut clock = EventClock::new();
        for event in &events {
            clock.observe(event.key)?;
            let transition = prepare(&timeline, &self.content, event).map_err(|source| {
                SessionError::Replay {
                    key: event.key,
                    source,
                }
            })?;
            timeline.commit(event.key, transition);
            tracing::debug!(key = %event.key, kind = event.kind.name(), "Replayed event");
        }

        self.timeline = timeline;
        self.clock = clock;
        tracing::info!(
            events = events.len(),
            branches = self.timeline.len(),
            last = ?self.clock.last(),
            "Event log replayed"
        );
        Ok(events.len())
    }

    /// Validate, persist, and apply one command.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidCommand`] if a precondition fails and
    /// [`SessionError::Persistence`] if the append fails. In both cases
    /// neither the log nor the in-memory state changed.
    pub async fn submit(&mut self, kind: EventKind) -> Result<CommitReceipt, SessionError> {
        let now = Utc::now();
        let key = self.clock.next_key(unix_millis(now))?;
        let event = GameEvent {
            key,
            created_at: now,
            kind,
        };

        let transition = match prepare(&self.timeline, &self.content, &event) {
            Ok(transition) => transition,
            Err(err) => {
                tracing::warn!(kind = event.kind.name(), error = %err, "Command rejected");
                return Err(err.into());
            }
        };

        let mut clock = self.clock;
        clock.observe(key)?;

        if let Err(err) = self.log.append(&event).await {
            tracing::warn!(key = %key, kind = event.kind.name(), error = %err, "Event append failed");
            return Err(SessionError::persistence(err));
        }

        self.clock = clock;
        self.timeline.commit(key, transition);

        let branch = event.kind.addressed_branch();
        let receipt = CommitReceipt {
            key,
            kind: event.kind.name().to_owned(),
            branch,
            turn: branch.and_then(|id| self.timeline.live_state(id).ok().map(|s| s.turn)),
            rewound: self.timeline.store().rewound,
        };
        tracing::info!(
            key = %key,
            kind = %receipt.kind,
            turn = ?receipt.turn,
            rewound = receipt.rewound,
            "Command committed"
        );
        Ok(receipt)
    }

    /// Start a new game if the log holds no branches: create the root
    /// branch, select it, and switch to the main screen.
    ///
    /// A game whose start was cut short (root created but never selected,
    /// or no screen set) is completed from where it stopped.
    ///
    /// Returns the root id when any step ran.
    ///
    /// # Errors
    ///
    /// As [`Session::submit`].
    pub async fn bootstrap(&mut self) -> Result<Option<BranchId>, SessionError> {
        let mut ran = false;
        let root = if let Some(root) = self.root_branch() {
            root
        } else {
            let root = BranchId::new();
            self.submit(EventKind::CreateBranch {
                branch: root,
                parent: None,
                fork_turn: 0,
            })
            .await?;
            ran = true;
            root
        };

        if self.timeline.store().current_branch.is_none() {
            self.submit(EventKind::SetBranch { branch: root }).await?;
            ran = true;
        }
        if self.timeline.store().current_screen.is_empty() {
            self.submit(EventKind::SetScreen {
                screen: MAIN_SCREEN.to_owned(),
            })
            .await?;
            ran = true;
        }

        if ran {
            tracing::info!(branch = %root, "New game started");
            Ok(Some(root))
        } else {
            Ok(None)
        }
    }

    fn root_branch(&self) -> Option<BranchId> {
        self.timeline
            .branch_tree()
            .into_iter()
            .find(|summary| summary.branch.parent.is_none())
            .map(|summary| summary.branch.id)
    }

    /// Fork the current branch at the turn being viewed.
    ///
    /// # Errors
    ///
    /// Returns [`TimelineError::NoCurrentBranch`] when nothing is selected,
    /// otherwise as [`Session::submit`].
    pub async fn new_branch_here(&mut self) -> Result<CommitReceipt, SessionError> {
        let parent = self
            .timeline
            .store()
            .current_branch
            .ok_or(TimelineError::NoCurrentBranch)?;
        let fork_turn = self.timeline.rewound_state(parent)?.turn;
        self.submit(EventKind::CreateBranch {
            branch: BranchId::new(),
            parent: Some(parent),
            fork_turn,
        })
        .await
    }

    /// Select `branch` and view it at `turn`.
    ///
    /// Both preconditions are checked before either event is submitted.
    /// The two events are committed separately: if the rewind fails to
    /// append, the branch stays selected at its previous view.
    ///
    /// # Errors
    ///
    /// Returns [`TimelineError::UnknownBranch`] or
    /// [`TimelineError::TurnBeyondReach`], otherwise as [`Session::submit`].
    pub async fn goto(&mut self, branch: BranchId, turn: u64) -> Result<CommitReceipt, SessionError> {
        let reachable = self.timeline.live_state(branch)?.turn;
        if turn > reachable {
            return Err(TimelineError::TurnBeyondReach {
                branch,
                requested: turn,
                reachable,
            }
            .into());
        }
        self.submit(EventKind::SetBranch { branch }).await?;
        self.submit(EventKind::Rewind {
            branch,
            target_turn: turn,
        })
        .await
    }

    /// The selection state.
    pub const fn store(&self) -> &GameStore {
        self.timeline.store()
    }

    /// The resolved view of the current branch.
    pub fn view(&self) -> TimelineView {
        self.timeline.view()
    }

    /// Every branch with its live and viewed turns.
    pub fn branch_tree(&self) -> Vec<BranchSummary> {
        self.timeline.branch_tree()
    }

    /// A branch's live state.
    ///
    /// # Errors
    ///
    /// Returns [`TimelineError::UnknownBranch`] for an unknown id.
    pub fn live_state(&self, id: BranchId) -> Result<&BranchState, TimelineError> {
        self.timeline.live_state(id)
    }

    /// A branch's rewound state.
    ///
    /// # Errors
    ///
    /// Returns [`TimelineError::UnknownBranch`] for an unknown id.
    pub fn rewound_state(&self, id: BranchId) -> Result<&BranchState, TimelineError> {
        self.timeline.rewound_state(id)
    }

    /// The derived state.
    pub const fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// The content the session runs against.
    pub fn content(&self) -> &Arc<Content> {
        &self.content
    }

    /// The event log.
    pub const fn log(&self) -> &L {
        &self.log
    }

    /// Mutable access to the event log.
    pub const fn log_mut(&mut self) -> &mut L {
        &mut self.log
    }
}
