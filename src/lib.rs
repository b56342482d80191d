//! TeamWatch - advisory governance hooks for multi-agent sessions.
//!
//! Invoked once per intercepted tool call by an external hook
//! dispatcher, with the call payload as JSON on stdin. Tracks teammate
//! liveness (bounded-retry idle detection) and session token usage, and
//! emits advisory warnings on stderr. Always exits 0: a governance hook
//! must never block the workflow it observes.

pub mod config;
pub mod hook;
pub mod store;
pub mod tracker;
pub mod usage;
