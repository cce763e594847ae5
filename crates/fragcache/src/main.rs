//! fragcache admin binary.

use std::path::PathBuf;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use fragcache::{Fetched, Settings};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "fragcache-admin", version, about = "Inspect and invalidate a fragcache store")]
struct Cli {
    /// Settings file layered over ./fragcache.toml
    #[arg(short, long, env = "FRAGCACHE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fire host events, invalidating every profile that listens to them
    Event {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Invalidate every configured profile
    InvalidateAll {
        #[arg(long, default_value = "fragcache-admin")]
        reason: String,
    },
    /// Look up one entry and report hit or miss reason
    Inspect { profile: String, key: String },
    /// List configured profiles with their generation marker time
    Profiles,
    /// Print the statistics report
    Stats,
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let settings = Settings::load(cli.config.as_deref()).context("failed to load settings")?;
    let controller = settings
        .build_controller()
        .context("failed to build cache controller")?;

    tracing::debug!("fragcache-admin v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Event { names } => {
            for name in &names {
                let profiles = controller.on_event(name);
                if profiles.is_empty() {
                    println!("{name}: no listening profiles");
                }
                for profile in profiles {
                    println!("{name}: invalidated {profile}");
                }
            }
        },
        Command::InvalidateAll { reason } => {
            let count = controller.invalidate_all(&reason);
            println!("invalidated {count} profiles");
        },
        Command::Inspect { profile, key } => {
            let dealer = controller.dealer(&profile)?;
            match dealer.fetch::<serde_json::Value>(&key)? {
                Fetched::Hit(payload) => {
                    println!("hit");
                    println!("{}", serde_json::to_string_pretty(&payload)?);
                },
                Fetched::Miss(miss) => println!("{}", miss.event()),
            }
        },
        Command::Profiles => {
            for name in controller.profiles() {
                let dealer = controller.dealer(name.as_str())?;
                let profile = dealer.profile();
                let events: Vec<&str> = profile
                    .invalidating_events()
                    .iter()
                    .map(|e| e.as_str())
                    .collect();
                let invalidated = dealer
                    .last_invalidation()
                    .map(|at| DateTime::<Utc>::from(at).to_rfc2822())
                    .unwrap_or_else(|| "never".to_string());
                println!(
                    "{}\tttl={}s\tenabled={}\tlogging={}\tinvalidated={}\tevents={}",
                    name,
                    profile.ttl().as_secs(),
                    profile.is_enabled(),
                    profile.is_logging_enabled(),
                    invalidated,
                    events.join(",")
                );
            }
        },
        Command::Stats => {
            let path = settings.stats_path();
            match std::fs::read_to_string(&path) {
                Ok(report) => println!("{report}"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    println!("no statistics recorded at {}", path.display());
                },
                Err(e) => {
                    return Err(e).with_context(|| format!("failed to read {}", path.display()));
                },
            }
        },
    }

    controller.flush_statistics(&settings.stats_path());

    Ok(())
}
