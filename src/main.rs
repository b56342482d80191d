//! TeamWatch hook binary.
//!
//! One subcommand per hook. Every failure path logs and exits 0; the
//! triggering tool call must never be blocked by this process.

use clap::{Parser, Subcommand};
use std::panic::{catch_unwind, AssertUnwindSafe};

use teamwatch::config::Config;
use teamwatch::hook::HookInput;
use teamwatch::store::{ActivityState, JsonFileStore, StateStore};
use teamwatch::tracker::ActivityTracker;
use teamwatch::usage::{self, UsageState};

#[derive(Parser)]
#[command(name = "teamwatch")]
#[command(about = "Advisory governance hooks for agent-team sessions", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Track teammate activity and retry idle teammates (tool-call hook)
    Activity,
    /// Meter session token usage against the configured budget (tool-call hook)
    Usage,
    /// Print a summary of the persisted governance state
    Report,
}

fn main() {
    init_logging();

    // Advisory contract: exit 0 no matter what, including argv the
    // dispatcher got wrong and unexpected panics.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return;
        }
    };

    if catch_unwind(AssertUnwindSafe(|| run(cli.command))).is_err() {
        tracing::error!("Hook aborted by unexpected panic");
    }
}

fn run(command: Command) {
    let config = Config::from_env();
    match command {
        Command::Activity => {
            let Some(input) = read_hook_input() else {
                return;
            };
            let store: JsonFileStore<ActivityState> =
                JsonFileStore::new(config.activity_state_path());
            ActivityTracker::new(&config).run(&store, &input.event());
        }
        Command::Usage => {
            let Some(input) = read_hook_input() else {
                return;
            };
            let store: JsonFileStore<UsageState> = JsonFileStore::new(config.usage_state_path());
            usage::run(&store, &input, config.token_budget);
        }
        Command::Report => report(&config),
    }
}

fn read_hook_input() -> Option<HookInput> {
    match HookInput::from_reader(std::io::stdin().lock()) {
        Ok(input) => Some(input),
        Err(e) => {
            tracing::debug!(error = %e, "Malformed hook payload on stdin, skipping");
            None
        }
    }
}

fn report(config: &Config) {
    let activity: ActivityState =
        JsonFileStore::<ActivityState>::new(config.activity_state_path()).load();
    let usage_state: UsageState =
        JsonFileStore::<UsageState>::new(config.usage_state_path()).load();

    println!(
        "Session started: {}",
        activity.session_start.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("Total retries:   {}", activity.total_retries);
    println!();

    if activity.teammates.is_empty() {
        println!("No teammates observed yet.");
    } else {
        println!(
            "{:<24} {:<16} {:>7} {:>9}  {}",
            "TEAMMATE", "STATUS", "RETRIES", "MESSAGES", "LAST ACTIVITY"
        );
        let mut teammates: Vec<_> = activity.teammates.iter().collect();
        teammates.sort_by(|a, b| a.0.cmp(b.0));
        for (id, record) in teammates {
            let last = record
                .last_activity
                .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "{:<24} {:<16} {:>7} {:>9}  {}",
                id, record.status, record.retry_count, record.messages_sent, last
            );
        }
    }

    println!();
    println!(
        "Usage: {} tool calls, ~{} / {} tokens ({})",
        usage_state.tool_calls,
        usage_state.estimated_tokens,
        config.token_budget,
        usage_state.tier
    );
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("teamwatch=info")),
        )
        .with_writer(std::io::stderr)
        .init();
}
