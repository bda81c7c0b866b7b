//! Engine binary for the Timeline simulation.
//!
//! Wires together configuration, content, the save slot's event log, the
//! session, and the observer server.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `timeline-config.yaml` (env overrides apply)
//! 2. Initialize structured logging (tracing)
//! 3. Load and validate the content documents
//! 4. Prepare the save directory, wiping the slot when `remake` is set
//! 5. Connect to the slot's `SQLite` database and run migrations
//! 6. Open the session, replaying the full event log
//! 7. Bootstrap a new game if the log was empty
//! 8. Serve the observer API until `Ctrl-C`

mod error;

use std::path::Path;
use std::sync::Arc;

use timeline_core::config::SessionConfig;
use timeline_core::{Content, Session, TimelineConfig};
use timeline_db::{SqliteDb, SqliteEventStore};
use timeline_observer::{AppState, ServerConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

/// Name of the configuration file, relative to the working directory.
const CONFIG_FILE: &str = "timeline-config.yaml";

/// Application entry point for the engine.
///
/// # Errors
///
/// Returns an error if any startup step or the observer server fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration. Logging depends on it, so this step is silent.
    let config_path = Path::new(CONFIG_FILE);
    let config_found = config_path.exists();
    let config = if config_found {
        TimelineConfig::from_file(config_path).map_err(EngineError::from)?
    } else {
        let mut config = TimelineConfig::default();
        config.apply_env_overrides().map_err(EngineError::from)?;
        config.validate().map_err(EngineError::from)?;
        config
    };

    // 2. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    info!("timeline-engine starting");
    if !config_found {
        info!("Config file not found, using defaults");
    }
    info!(
        slot = config.session.slot,
        save_dir = %config.session.save_dir.display(),
        observer_port = config.observer.port,
        "Configuration loaded"
    );

    run(&config).await?;

    info!("timeline-engine shutdown complete");
    Ok(())
}

async fn run(config: &TimelineConfig) -> Result<(), EngineError> {
    // 3. Load content. Any invalid definition aborts startup.
    let content = Arc::new(Content::load(&config.content)?);

    // 4. Prepare the save slot.
    prepare_slot(&config.session)?;

    // 5. Connect to the slot database.
    let database_url = config.session.database_url();
    let db = SqliteDb::connect_url(&database_url).await?;
    db.run_migrations().await?;

    // 6. Open the session; every stored event is replayed before serving.
    let store = SqliteEventStore::new(db.pool().clone());
    let mut session = Session::open(content, store).await?;

    // 7. Start a new game on an empty log.
    if let Some(root) = session.bootstrap().await? {
        info!(%root, slot = config.session.slot, "Empty slot bootstrapped");
    } else {
        info!(
            slot = config.session.slot,
            branches = session.timeline().len(),
            "Saved game resumed"
        );
    }

    // 8. Serve until shutdown.
    let state = Arc::new(AppState::new(session, config.session.clone()));
    let server_config = ServerConfig {
        host: config.observer.host.clone(),
        port: config.observer.port,
    };
    let served = timeline_observer::start_server(&server_config, state).await;

    db.close().await;
    served?;
    Ok(())
}

/// Ensure the save directory exists and, when `remake` is set, delete the
/// slot's database so the session starts from an empty log.
///
/// An explicit `database_url` is never deleted; remake is skipped for it.
fn prepare_slot(session: &SessionConfig) -> Result<bool, EngineError> {
    std::fs::create_dir_all(&session.save_dir)?;

    if !session.remake {
        return Ok(false);
    }
    if let Some(url) = &session.database_url {
        warn!(url = %url, "Remake skipped: database URL is set explicitly");
        return Ok(false);
    }
    if session.slot_exists() {
        let path = session.slot_path();
        std::fs::remove_file(&path)?;
        info!(path = %path.display(), "Slot log deleted for remake");
        return Ok(true);
    }
    Ok(false)
}
