//! Axum router construction for the Observer API.
//!
//! Assembles all routes (REST + `WebSocket`) into a single [`Router`]
//! with CORS middleware enabled for cross-origin dashboard access.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::{AppState, SharedLog};
use crate::ws;

/// Build the complete Axum router for the Observer server.
///
/// The router includes:
/// - `GET /` -- minimal HTML status page
/// - `GET /ws/commits` -- `WebSocket` commit stream
/// - `GET /api/store` -- selection state
/// - `GET /api/view` -- resolved view of the current branch
/// - `GET /api/branches` -- branch tree
/// - `GET /api/branches/{id}` -- single branch
/// - `GET /api/content` -- scenario content summary
/// - `GET /api/slots` -- save slots
/// - `POST /api/commands` -- submit a command
/// - `POST /api/branches/new` -- fork at the viewed turn
/// - `POST /api/goto` -- select a branch and turn
///
/// CORS is configured to allow any origin for development.
pub fn build_router<L: SharedLog>(state: Arc<AppState<L>>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Status page
        .route("/", get(handlers::index::<L>))
        // WebSocket
        .route("/ws/commits", get(ws::ws_commits::<L>))
        // Read API
        .route("/api/store", get(handlers::get_store::<L>))
        .route("/api/view", get(handlers::get_view::<L>))
        .route("/api/branches", get(handlers::list_branches::<L>))
        .route("/api/branches/new", post(handlers::post_new_branch::<L>))
        .route("/api/branches/{id}", get(handlers::get_branch::<L>))
        .route("/api/content", get(handlers::get_content::<L>))
        .route("/api/slots", get(handlers::list_slots::<L>))
        // Commands
        .route("/api/commands", post(handlers::post_command::<L>))
        .route("/api/goto", post(handlers::post_goto::<L>))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
