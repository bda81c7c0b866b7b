//! Shared application state for the Observer API server.
//!
//! [`AppState`] holds the session behind a single async mutex, which is
//! the dispatch queue: commands from all clients are applied one at a
//! time, each finishing its log append before the next one starts. It
//! also owns the broadcast channel that streams commit notices to
//! `WebSocket` clients.

use std::sync::Arc;

use timeline_core::config::SessionConfig;
use timeline_core::{Session, SessionError};
use timeline_events::EventLog;
use timeline_types::{BranchId, CommitReceipt, EventKind};
use tokio::sync::{Mutex, broadcast};

/// Capacity of the broadcast channel for commit notices.
///
/// If a subscriber falls behind by more than this many messages it will
/// receive a [`broadcast::error::RecvError::Lagged`] and skip to the
/// newest message.
const BROADCAST_CAPACITY: usize = 256;

/// An event log the server can share across request tasks.
pub trait SharedLog: EventLog + Send + Sync + 'static {}

impl<T: EventLog + Send + Sync + 'static> SharedLog for T {}

/// JSON-serializable commit notice pushed over the `WebSocket`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CommitBroadcast {
    /// The commit receipt.
    #[serde(flatten)]
    pub receipt: CommitReceipt,
    /// Branch selected after the commit.
    pub current_branch: Option<BranchId>,
    /// Number of branches after the commit.
    pub branches: usize,
}

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
pub struct AppState<L> {
    /// Broadcast sender for commit notices.
    pub tx: broadcast::Sender<CommitBroadcast>,
    /// The running session.
    pub session: Arc<Mutex<Session<L>>>,
    /// Save-slot settings; `slot` is the one being played.
    pub save: SessionConfig,
}

impl<L: SharedLog> AppState<L> {
    /// Wrap a session for serving.
    pub fn new(session: Session<L>, save: SessionConfig) -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            tx,
            session: Arc::new(Mutex::new(session)),
            save,
        }
    }

    /// Subscribe to the commit broadcast channel.
    pub fn subscribe(&self) -> broadcast::Receiver<CommitBroadcast> {
        self.tx.subscribe()
    }

    /// Publish a commit notice to all connected clients.
    ///
    /// Returns the number of receivers that received the message.
    /// Returns 0 if no clients are connected (this is not an error).
    pub fn broadcast(&self, notice: &CommitBroadcast) -> usize {
        // send returns Err only when there are zero receivers,
        // which is normal when no WebSocket clients are connected.
        self.tx.send(notice.clone()).unwrap_or(0)
    }

    /// Submit a command and broadcast its receipt.
    ///
    /// # Errors
    ///
    /// Returns the session's error unchanged.
    pub async fn submit(&self, kind: EventKind) -> Result<CommitReceipt, SessionError> {
        let mut session = self.session.lock().await;
        let receipt = session.submit(kind).await?;
        self.announce(&session, &receipt);
        Ok(receipt)
    }

    /// Fork the current branch at the viewed turn and broadcast it.
    ///
    /// # Errors
    ///
    /// Returns the session's error unchanged.
    pub async fn new_branch_here(&self) -> Result<CommitReceipt, SessionError> {
        let mut session = self.session.lock().await;
        let receipt = session.new_branch_here().await?;
        self.announce(&session, &receipt);
        Ok(receipt)
    }

    /// Select a branch, view it at `turn`, and broadcast the result.
    ///
    /// # Errors
    ///
    /// Returns the session's error unchanged.
    pub async fn goto(&self, branch: BranchId, turn: u64) -> Result<CommitReceipt, SessionError> {
        let mut session = self.session.lock().await;
        let receipt = session.goto(branch, turn).await?;
        self.announce(&session, &receipt);
        Ok(receipt)
    }

    fn announce(&self, session: &Session<L>, receipt: &CommitReceipt) {
        let notice = CommitBroadcast {
            receipt: receipt.clone(),
            current_branch: session.store().current_branch,
            branches: session.timeline().len(),
        };
        let receivers = self.broadcast(&notice);
        tracing::debug!(key = %receipt.key, receivers, "Commit broadcast");
    }
}
