//! Observer API server for the Timeline simulation.
//!
//! This crate is the surface the rendering and input layer talks to:
//!
//! - **REST reads** of the selection state, the resolved view of the
//!   current branch, the branch tree, and the scenario content
//! - **One command entry point** (`POST /api/commands`) accepting any
//!   event kind, plus the "new branch here" and "go to turn" shortcuts
//! - **`WebSocket` endpoint** (`/ws/commits`) streaming a notice per
//!   committed command via [`tokio::sync::broadcast`]
//! - **Minimal HTML status page** (`GET /`)
//!
//! # Architecture
//!
//! The session sits behind one [`tokio::sync::Mutex`]. Every request,
//! read or write, takes it in turn, so commands are applied strictly one
//! after another and each append completes before the next command is
//! prepared.

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use router::build_router;
pub use server::{ServerConfig, ServerError, start_server};
pub use state::{AppState, CommitBroadcast, SharedLog};
