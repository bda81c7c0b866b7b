//! Simulation core for the Timeline policy game.
//!
//! A scenario is a set of numeric values linked by weighted influence
//! edges, a set of policies that nudge them, and win/lose thresholds. The
//! game state can branch into alternate timelines and be rewound to any
//! past turn without losing forward progress. All state derives from an
//! ordered event log.
//!
//! # Modules
//!
//! - [`config`] -- YAML configuration
//! - [`content`] -- JSON content loading and validation
//! - [`values`] -- Weight map and per-turn value recomputation
//! - [`policy`] -- Policy toggling, mutual exclusion, and restrictions
//! - [`scenario`] -- Win and lose evaluation
//! - [`timeline`] -- Per-branch live and rewound state
//! - [`apply`] -- Event to transition mapping
//! - [`session`] -- Command submission and replay over an event log

pub mod apply;
pub mod config;
pub mod content;
pub mod policy;
pub mod scenario;
pub mod session;
pub mod timeline;
pub mod values;

pub use apply::{Transition, prepare};
pub use config::{ConfigError, TimelineConfig};
pub use content::{Content, ContentError};
pub use policy::{PolicyError, Toggle};
pub use scenario::ScenarioError;
pub use session::{Session, SessionError};
pub use timeline::{MAIN_SCREEN, Timeline, TimelineError};
