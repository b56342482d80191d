//! Persisted governance state.
//!
//! Provides the data model for teammate activity tracking and the
//! file-backed store both hooks persist their state through.

pub mod file;
pub mod types;

pub use file::{JsonFileStore, StateStore, StoreError};
pub use types::{ActivityState, IdleTeammate, ResolveAction, TeammateRecord, TeammateStatus};
