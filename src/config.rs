//! Environment-driven configuration.
//!
//! The dispatcher configures the hooks through environment variables.
//! Every value is bounded; out-of-range or unparsable input silently
//! falls back to the default so a bad variable can never disable the
//! hooks or block the session.

use std::path::PathBuf;

/// Default idle timeout before a teammate counts as stalled.
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 300;
/// Default retry ceiling before force-proceeding past a stalled teammate.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default session token budget for the usage hook.
pub const DEFAULT_TOKEN_BUDGET: u64 = 200_000;

/// Runtime configuration, constructed explicitly and passed in; there is
/// no process-wide singleton.
#[derive(Debug, Clone)]
pub struct Config {
    /// Seconds without activity before a teammate is considered idle.
    /// Valid range [1, 3600].
    pub idle_timeout_secs: u64,

    /// Idle retries per teammate before force-proceeding. Valid range [1, 100].
    pub max_retries: u32,

    /// Session token budget the usage hook meters against.
    /// Valid range [1000, 100_000_000].
    pub token_budget: u64,

    /// Directory holding the persisted state files.
    pub state_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            token_budget: DEFAULT_TOKEN_BUDGET,
            state_dir: default_state_dir(),
        }
    }
}

impl Config {
    /// Builds the configuration from `TEAMWATCH_*` environment variables.
    pub fn from_env() -> Self {
        Self {
            idle_timeout_secs: bounded(
                env("TEAMWATCH_IDLE_TIMEOUT_SECS").as_deref(),
                DEFAULT_IDLE_TIMEOUT_SECS,
                1,
                3600,
            ),
            max_retries: bounded(
                env("TEAMWATCH_MAX_RETRIES").as_deref(),
                DEFAULT_MAX_RETRIES as u64,
                1,
                100,
            ) as u32,
            token_budget: bounded(
                env("TEAMWATCH_TOKEN_BUDGET").as_deref(),
                DEFAULT_TOKEN_BUDGET,
                1_000,
                100_000_000,
            ),
            state_dir: env("TEAMWATCH_STATE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(default_state_dir),
        }
    }

    /// Path of the activity-tracker state file.
    pub fn activity_state_path(&self) -> PathBuf {
        self.state_dir.join("activity.json")
    }

    /// Path of the usage-hook state file.
    pub fn usage_state_path(&self) -> PathBuf {
        self.state_dir.join("usage.json")
    }
}

fn env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn default_state_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".teamwatch"))
        .unwrap_or_else(|| PathBuf::from(".teamwatch"))
}

/// Parses a bounded integer, falling back to `default` (not clamping)
/// when the raw value is absent, unparsable or out of range.
fn bounded(raw: Option<&str>, default: u64, min: u64, max: u64) -> u64 {
    match raw.map(|v| v.trim().parse::<u64>()) {
        Some(Ok(value)) if (min..=max).contains(&value) => value,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_accepts_in_range_values() {
        assert_eq!(bounded(Some("60"), 300, 1, 3600), 60);
        assert_eq!(bounded(Some("1"), 300, 1, 3600), 1);
        assert_eq!(bounded(Some("3600"), 300, 1, 3600), 3600);
        assert_eq!(bounded(Some(" 42 "), 300, 1, 3600), 42);
    }

    #[test]
    fn test_bounded_falls_back_instead_of_clamping() {
        assert_eq!(bounded(Some("0"), 300, 1, 3600), 300);
        assert_eq!(bounded(Some("5000"), 300, 1, 3600), 300);
        assert_eq!(bounded(Some("-5"), 300, 1, 3600), 300);
        assert_eq!(bounded(Some("soon"), 300, 1, 3600), 300);
        assert_eq!(bounded(None, 300, 1, 3600), 300);
    }

    #[test]
    fn test_default_config_values() {
        let config = Config::default();
        assert_eq!(config.idle_timeout_secs, 300);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.token_budget, 200_000);
        assert!(config.activity_state_path().ends_with("activity.json"));
        assert!(config.usage_state_path().ends_with("usage.json"));
    }
}
