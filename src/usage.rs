//! Token-usage metering hook.
//!
//! Counts tool calls and a rough token estimate for the session and
//! escalates through warning tiers as usage approaches the configured
//! budget. Observing the tier is pure; committing a tier transition is
//! the only mutation, and tiers never de-escalate within a session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

use crate::hook::HookInput;
use crate::store::StateStore;

/// Rough chars-per-token ratio used for the payload size estimate.
const CHARS_PER_TOKEN: u64 = 4;

/// Budget percentage at which the session enters `Caution`.
const CAUTION_PCT: u64 = 70;
/// Budget percentage at which the session enters `Critical`.
const CRITICAL_PCT: u64 = 90;

/// Usage warning tier, ordered by severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UsageTier {
    #[default]
    #[serde(rename = "NORMAL")]
    Normal,
    #[serde(rename = "CAUTION")]
    Caution,
    #[serde(rename = "CRITICAL")]
    Critical,
}

impl fmt::Display for UsageTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Normal => "NORMAL",
            Self::Caution => "CAUTION",
            Self::Critical => "CRITICAL",
        };
        f.write_str(name)
    }
}

/// Persisted usage counters for the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageState {
    /// When metering started.
    #[serde(default = "Utc::now")]
    pub session_start: DateTime<Utc>,

    /// Number of metered tool calls.
    #[serde(default)]
    pub tool_calls: u64,

    /// Estimated tokens consumed by tool-call payloads.
    #[serde(default)]
    pub estimated_tokens: u64,

    /// Highest tier reached so far.
    #[serde(default)]
    pub tier: UsageTier,
}

impl Default for UsageState {
    fn default() -> Self {
        Self {
            session_start: Utc::now(),
            tool_calls: 0,
            estimated_tokens: 0,
            tier: UsageTier::Normal,
        }
    }
}

/// Computes the tier the current counters place the session in.
/// Pure: never touches the stored tier.
pub fn observe_tier(state: &UsageState, budget: u64) -> UsageTier {
    let pct = state.estimated_tokens.saturating_mul(100) / budget.max(1);
    if pct >= CRITICAL_PCT {
        UsageTier::Critical
    } else if pct >= CAUTION_PCT {
        UsageTier::Caution
    } else {
        UsageTier::Normal
    }
}

/// Adds one tool call to the counters. The token estimate is the
/// serialized `tool_input` size divided by [`CHARS_PER_TOKEN`], with a
/// floor of one token per call.
pub fn record_call(state: &mut UsageState, input: &HookInput) {
    state.tool_calls += 1;
    let payload_len = serde_json::to_string(&input.tool_input)
        .map(|s| s.len() as u64)
        .unwrap_or(0);
    state.estimated_tokens += (payload_len / CHARS_PER_TOKEN).max(1);
}

/// Commits a tier transition if the observed tier is higher than the
/// stored one, returning the new tier for the caller to surface.
/// Tiers only escalate within a session.
pub fn commit_tier(state: &mut UsageState, budget: u64) -> Option<UsageTier> {
    let observed = observe_tier(state, budget);
    if observed > state.tier {
        state.tier = observed;
        Some(observed)
    } else {
        None
    }
}

/// Full hook pass: load, meter the call, warn on a tier escalation,
/// persist. Save failures are logged and swallowed.
pub fn run(store: &impl StateStore<UsageState>, input: &HookInput, budget: u64) {
    let mut state = store.load();
    record_call(&mut state, input);

    if let Some(tier) = commit_tier(&mut state, budget) {
        warn!(
            %tier,
            estimated_tokens = state.estimated_tokens,
            budget,
            tool_calls = state.tool_calls,
            "Session token usage crossed a threshold"
        );
    }

    if let Err(e) = store.save(&state) {
        warn!(error = %e, "Failed to persist usage state");
    }
}
