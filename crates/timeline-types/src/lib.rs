//! Shared type definitions for the Timeline policy simulation.
//!
//! This crate is the single source of truth for all types used across the
//! Timeline workspace. Types defined here flow downstream to `TypeScript`
//! via `ts-rs` for the rendering client.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for branch identifiers
//! - [`definitions`] -- Value, policy, and scenario content documents
//! - [`events`] -- Event records and their ordering key
//! - [`structs`] -- Branch state, session state, and read-side projections

pub mod definitions;
pub mod events;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use definitions::{
    ComparisonSign, FlatAmount, GameEndCondition, Influence, PoliciesDocument, PolicyDefinition,
    Restriction, ScenarioDocument, TURN_TARGET, ValueDefinition, ValuesDocument, WeightChange,
};
pub use events::{EventKey, EventKind, GameEvent};
pub use ids::BranchId;
pub use structs::{
    Branch, BranchState, BranchSummary, CommitReceipt, GameStore, SlotStatus, TerminalStatus,
    TimelineView, ValueMap, Weight, WeightMap,
};
