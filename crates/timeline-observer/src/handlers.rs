//! REST API endpoint handlers for the Observer server.
//!
//! Reads take the session lock briefly and serialize a projection.
//! Writes go through [`AppState`], which applies them one at a time.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Minimal HTML status page |
//! | `GET` | `/api/store` | Selection state |
//! | `GET` | `/api/view` | Selection state plus the resolved branch state |
//! | `GET` | `/api/branches` | Branch tree |
//! | `GET` | `/api/branches/{id}` | One branch with live and rewound state |
//! | `GET` | `/api/content` | Value and policy names, end conditions |
//! | `GET` | `/api/slots` | Save slots with saved-game flags |
//! | `POST` | `/api/commands` | Submit one command |
//! | `POST` | `/api/branches/new` | Fork the current branch at the viewed turn |
//! | `POST` | `/api/goto` | Select a branch and view it at a turn |

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::response::{Html, IntoResponse};
use timeline_types::{BranchId, EventKind};
use uuid::Uuid;

use crate::error::ObserverError;
use crate::state::{AppState, SharedLog};

/// Request body for `POST /api/goto`.
#[derive(Debug, serde::Deserialize)]
pub struct GotoRequest {
    /// Branch to select.
    pub branch: BranchId,
    /// Turn to view.
    pub turn: u64,
}

// ---------------------------------------------------------------------------
// GET / -- minimal HTML status page
// ---------------------------------------------------------------------------

/// Serve a minimal HTML page showing the session and API links.
pub async fn index<L: SharedLog>(State(state): State<Arc<AppState<L>>>) -> impl IntoResponse {
    let session = state.session.lock().await;
    let view = session.view();
    let branch_count = session.timeline().len();
    drop(session);

    let slot = &state.save.slot;
    let branch = view
        .store
        .current_branch
        .map_or_else(|| "none".to_owned(), |id| id.to_string());
    let live_turn = view
        .live_turn
        .map_or_else(|| "-".to_owned(), |t| t.to_string());
    let viewed_turn = view
        .state
        .as_ref()
        .map_or_else(|| "-".to_owned(), |s| s.turn.to_string());
    let terminal = view
        .state
        .as_ref()
        .map_or_else(|| "-".to_owned(), |s| format!("{:?}", s.terminal));
    let screen = &view.store.current_screen;
    let mode = if view.store.rewound { "REWOUND" } else { "LIVE" };

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Timeline Observer</title>
    <style>
        body {{
            background: #0d1117;
            color: #c9d1d9;
            font-family: 'Cascadia Code', 'Fira Code', 'Consolas', monospace;
            padding: 2rem;
            max-width: 800px;
            margin: 0 auto;
        }}
        h1 {{ color: #58a6ff; margin-bottom: 0.25rem; }}
        .subtitle {{ color: #8b949e; margin-top: 0; }}
        .metric {{
            display: inline-block;
            background: #161b22;
            border: 1px solid #30363d;
            border-radius: 6px;
            padding: 1rem 1.5rem;
            margin: 0.5rem 0.5rem 0.5rem 0;
            min-width: 120px;
        }}
        .metric .label {{ color: #8b949e; font-size: 0.85rem; }}
        .metric .value {{ color: #58a6ff; font-size: 1.5rem; font-weight: bold; }}
        a {{ color: #58a6ff; text-decoration: none; }}
        ul {{ list-style: none; padding: 0; }}
        li {{ padding: 0.3rem 0; }}
        .status {{ color: #3fb950; font-weight: bold; }}
        hr {{ border: none; border-top: 1px solid #30363d; margin: 1.5rem 0; }}
    </style>
</head>
<body>
    <h1>Timeline Observer</h1>
    <p class="subtitle">Slot {slot} -- branch {branch}</p>

    <p>Mode: <span class="status">{mode}</span> -- screen <code>{screen}</code></p>

    <div>
        <div class="metric">
            <div class="label">Live turn</div>
            <div class="value">{live_turn}</div>
        </div>
        <div class="metric">
            <div class="label">Viewed turn</div>
            <div class="value">{viewed_turn}</div>
        </div>
        <div class="metric">
            <div class="label">Status</div>
            <div class="value">{terminal}</div>
        </div>
        <div class="metric">
            <div class="label">Branches</div>
            <div class="value">{branch_count}</div>
        </div>
    </div>

    <hr>

    <h2>API Endpoints</h2>
    <ul>
        <li>GET <a href="/api/store">/api/store</a> -- Selection state</li>
        <li>GET <a href="/api/view">/api/view</a> -- Resolved view of the current branch</li>
        <li>GET <a href="/api/branches">/api/branches</a> -- Branch tree</li>
        <li>GET /api/branches/{{id}} -- Single branch detail</li>
        <li>GET <a href="/api/content">/api/content</a> -- Scenario content</li>
        <li>GET <a href="/api/slots">/api/slots</a> -- Save slots</li>
        <li>POST /api/commands -- Submit a command</li>
        <li>POST /api/branches/new -- Fork at the viewed turn</li>
        <li>POST /api/goto -- Select a branch and turn</li>
    </ul>

    <h2>WebSocket</h2>
    <ul>
        <li><code>ws://host:port/ws/commits</code> -- Live commit stream</li>
    </ul>
</body>
</html>"#
    ))
}

// ---------------------------------------------------------------------------
// Read endpoints
// ---------------------------------------------------------------------------

/// Return the selection state.
pub async fn get_store<L: SharedLog>(
    State(state): State<Arc<AppState<L>>>,
) -> Result<impl IntoResponse, ObserverError> {
    let session = state.session.lock().await;
    Ok(Json(serde_json::to_value(session.store())?))
}

/// Return the selection state with the current branch's resolved state:
/// the rewound state when rewound, the live state otherwise.
pub async fn get_view<L: SharedLog>(
    State(state): State<Arc<AppState<L>>>,
) -> Result<impl IntoResponse, ObserverError> {
    let view = state.session.lock().await.view();
    Ok(Json(serde_json::to_value(view)?))
}

/// List every branch in creation order.
pub async fn list_branches<L: SharedLog>(
    State(state): State<Arc<AppState<L>>>,
) -> Result<impl IntoResponse, ObserverError> {
    let branches = state.session.lock().await.branch_tree();
    Ok(Json(serde_json::json!({
        "count": branches.len(),
        "branches": branches,
    })))
}

/// Return one branch with its live and rewound state.
pub async fn get_branch<L: SharedLog>(
    State(state): State<Arc<AppState<L>>>,
    Path(id_str): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    let id = BranchId::from(parse_uuid(&id_str)?);
    let session = state.session.lock().await;

    let not_found = |_err| ObserverError::NotFound(format!("branch {id}"));
    let branch = session.timeline().branch(id).map_err(not_found)?;
    let live = session.live_state(id).map_err(not_found)?;
    let rewound = session.rewound_state(id).map_err(not_found)?;
    let history = session.timeline().history(id).map_err(not_found)?.len();

    Ok(Json(serde_json::json!({
        "branch": branch,
        "live": live,
        "rewound": rewound,
        "history_len": history,
    })))
}

/// Return the value and policy names and the end conditions.
pub async fn get_content<L: SharedLog>(
    State(state): State<Arc<AppState<L>>>,
) -> Result<impl IntoResponse, ObserverError> {
    let content = Arc::clone(state.session.lock().await.content());
    let scenario = content.scenario();
    Ok(Json(serde_json::json!({
        "values": content.value_names().collect::<Vec<_>>(),
        "policies": content.policy_names().collect::<Vec<_>>(),
        "mutual_exclusive": content.exclusion_groups(),
        "start_values": scenario.start_values,
        "win_condition": scenario.win_condition,
        "lose_condition": scenario.lose_condition,
    })))
}

/// List the configured save slots and which of them hold a saved game.
pub async fn list_slots<L: SharedLog>(State(state): State<Arc<AppState<L>>>) -> impl IntoResponse {
    let slots = state.save.slot_statuses();
    Json(serde_json::json!({
        "active": state.save.slot,
        "slots": slots,
    }))
}

// ---------------------------------------------------------------------------
// Command endpoints
// ---------------------------------------------------------------------------

/// Submit one command.
///
/// Responds `400` when a precondition fails and `503` when the event log
/// rejects the append. Neither case changes any state.
pub async fn post_command<L: SharedLog>(
    State(state): State<Arc<AppState<L>>>,
    Json(kind): Json<EventKind>,
) -> Result<impl IntoResponse, ObserverError> {
    let receipt = state.submit(kind).await?;
    Ok(Json(receipt))
}

/// Fork the current branch at the turn being viewed.
pub async fn post_new_branch<L: SharedLog>(
    State(state): State<Arc<AppState<L>>>,
) -> Result<impl IntoResponse, ObserverError> {
    let receipt = state.new_branch_here().await?;
    Ok(Json(receipt))
}

/// Select a branch and view it at a turn.
pub async fn post_goto<L: SharedLog>(
    State(state): State<Arc<AppState<L>>>,
    Json(request): Json<GotoRequest>,
) -> Result<impl IntoResponse, ObserverError> {
    let receipt = state.goto(request.branch, request.turn).await?;
    Ok(Json(receipt))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Parse a UUID string, returning an [`ObserverError::InvalidUuid`] on
/// failure.
fn parse_uuid(s: &str) -> Result<Uuid, ObserverError> {
    s.parse::<Uuid>()
        .map_err(|e| ObserverError::InvalidUuid(format!("{s}: {e}")))
}
