//! Teammate idle-detection and bounded-retry state machine.
//!
//! Per teammate the tracker moves between these states:
//!
//! ```text
//! (none) --first event--> IDLE
//! IDLE --message/broadcast--> WORKING
//! WORKING --idle timeout, retries remaining--> IDLE (retry_count+1)
//! IDLE/WORKING --idle timeout, retries exhausted--> FORCE_PROCEEDED  (terminal)
//! WORKING --external completion signal--> COMPLETED (terminal)
//! WORKING --external failure signal--> FAILED (terminal)
//! ```
//!
//! `COMPLETED`/`FAILED` are written by the external caller; this module
//! only ever writes `IDLE`, `WORKING` and `FORCE_PROCEEDED`.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::config::Config;
use crate::hook::HookEvent;
use crate::store::{
    ActivityState, IdleTeammate, ResolveAction, StateStore, TeammateRecord, TeammateStatus,
};

/// Tracks teammate liveness and applies the bounded-retry policy.
pub struct ActivityTracker {
    idle_timeout: Duration,
    max_retries: u32,
}

impl ActivityTracker {
    /// Creates a tracker with the configured timeout and retry ceiling.
    pub fn new(config: &Config) -> Self {
        Self {
            idle_timeout: Duration::seconds(config.idle_timeout_secs as i64),
            max_retries: config.max_retries,
        }
    }

    /// Applies one communication event to the state. Never fails: a
    /// malformed teammate id has already degraded to the sentinel.
    ///
    /// A directed message creates the teammate on first sight and marks
    /// it `WORKING`. A broadcast marks every already-known teammate
    /// `WORKING` and creates none.
    pub fn record_event(&self, state: &mut ActivityState, event: &HookEvent) {
        let now = Utc::now();
        match event {
            HookEvent::Message { to } => {
                let record = state
                    .teammates
                    .entry(to.clone())
                    .or_insert_with(|| TeammateRecord::new(now));
                mark_working(record, now);
            }
            HookEvent::Broadcast => {
                for record in state.teammates.values_mut() {
                    mark_working(record, now);
                }
            }
        }
    }

    /// Returns every non-terminal teammate whose elapsed time since
    /// `last_activity` exceeds the idle timeout, sorted by id.
    ///
    /// Records with a missing or unparsable `last_activity` are skipped
    /// (treated as not-idle) so corrupt state cannot block progress.
    pub fn scan_idle(&self, state: &ActivityState, now: DateTime<Utc>) -> Vec<IdleTeammate> {
        let mut idle = Vec::new();
        for (id, record) in &state.teammates {
            if record.status.is_terminal() {
                continue;
            }
            let Some(last_activity) = record.last_activity else {
                debug!(teammate = %id, "Skipping idle check, last_activity missing or unparsable");
                continue;
            };
            let elapsed = now - last_activity;
            if elapsed > self.idle_timeout {
                idle.push(IdleTeammate {
                    id: id.clone(),
                    elapsed_secs: elapsed.num_seconds(),
                    retry_count: record.retry_count,
                    status: record.status,
                });
            }
        }
        idle.sort_by(|a, b| a.id.cmp(&b.id));
        idle
    }

    /// Decides what to do about one idle teammate.
    ///
    /// With retries remaining the teammate goes back to `IDLE` for
    /// another round and the session retry counter is bumped; once
    /// exhausted it is marked `FORCE_PROCEEDED` and never scanned again.
    /// Either way the caller gets an explicit outcome to surface.
    pub fn resolve_idle(&self, state: &mut ActivityState, idle: &IdleTeammate) -> ResolveAction {
        let now = Utc::now();
        match state.teammates.get_mut(&idle.id) {
            Some(record) if record.retry_count < self.max_retries => {
                record.retry_count += 1;
                record.status = TeammateStatus::Idle;
                record.last_activity = Some(now);
                state.total_retries += 1;
                ResolveAction::Retry
            }
            Some(record) => {
                record.status = TeammateStatus::ForceProceeded;
                record.last_activity = Some(now);
                ResolveAction::ForceProceed
            }
            // The record vanished between scan and resolve; nothing left
            // to wait on.
            None => ResolveAction::ForceProceed,
        }
    }

    /// Full hook pass: load, record the event, resolve idle teammates
    /// with advisory warnings on stderr, persist. Save failures are
    /// logged and swallowed so the triggering tool call is never blocked.
    pub fn run(&self, store: &impl StateStore<ActivityState>, event: &HookEvent) {
        let mut state = store.load();
        self.record_event(&mut state, event);

        let now = Utc::now();
        for idle in self.scan_idle(&state, now) {
            match self.resolve_idle(&mut state, &idle) {
                ResolveAction::Retry => warn!(
                    teammate = %idle.id,
                    elapsed_secs = idle.elapsed_secs,
                    retry = idle.retry_count + 1,
                    max_retries = self.max_retries,
                    "Teammate idle past timeout, retrying"
                ),
                ResolveAction::ForceProceed => warn!(
                    teammate = %idle.id,
                    elapsed_secs = idle.elapsed_secs,
                    "Teammate still idle after max retries, proceeding without it"
                ),
            }
        }

        if let Err(e) = store.save(&state) {
            warn!(error = %e, "Failed to persist activity state");
        }
    }
}

fn mark_working(record: &mut TeammateRecord, now: DateTime<Utc>) {
    record.status = TeammateStatus::Working;
    record.messages_sent += 1;
    record.last_activity = Some(now);
}
