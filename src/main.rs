use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sessiondb::{Config, Metadata, MetadataValue, SessionClient};

#[derive(Parser)]
#[command(name = "sessiondb")]
#[command(about = "Manage user sessions stored in Redis")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the cleanup sweep periodically until interrupted
    Sweep {
        /// Seconds between sweeps (defaults to CLEANUP_INTERVAL_SECONDS)
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Run a single cleanup sweep and print a JSON report
    Cleanup,

    /// Print session statistics
    Stats,

    /// Check Redis connectivity and print a health report
    Health,

    /// Create a session
    Create {
        /// Owning user id
        user_id: String,

        /// Lifetime in seconds (defaults to SESSION_TTL_SECONDS)
        #[arg(long)]
        ttl: Option<u64>,

        /// Metadata entries as key=value
        #[arg(short, long = "meta", value_parser = parse_metadata_entry)]
        metadata: Vec<(String, MetadataValue)>,
    },

    /// Read a session, refreshing its last activity
    Get { session_id: String },

    /// Invalidate a single session
    Invalidate { session_id: String },

    /// List a user's active sessions
    List { user_id: String },

    /// Invalidate every session of a user
    RevokeUser { user_id: String },
}

/// Report format consumed by the scheduled cleanup job.
#[derive(Serialize)]
struct CleanupReport {
    sessions_cleaned: usize,
    errors: usize,
}

fn parse_metadata_entry(raw: &str) -> Result<(String, MetadataValue), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))?;
    if key.is_empty() {
        return Err("metadata key cannot be empty".to_string());
    }

    let value = match value {
        "null" => MetadataValue::Null,
        "true" => MetadataValue::Bool(true),
        "false" => MetadataValue::Bool(false),
        v => v
            .parse::<i64>()
            .map(MetadataValue::Integer)
            .or_else(|_| v.parse::<f64>().map(MetadataValue::Float))
            .unwrap_or_else(|_| MetadataValue::String(v.to_string())),
    };
    Ok((key.to_string(), value))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", sonic_rs::to_string_pretty(value)?);
    Ok(())
}

async fn run_sweeper(client: SessionClient, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    tracing::info!("✅ Background cleanup started (every {}s)", interval.as_secs());

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                tracing::info!("🧹 Running scheduled cleanup of expired sessions...");
                match client.sessions().cleanup_expired(chrono::Utc::now()).await {
                    Ok(cleaned) => {
                        tracing::info!("✅ Cleanup job completed: {} session(s) removed", cleaned);
                    }
                    Err(e) => {
                        tracing::error!("❌ Cleanup job failed: {}", e);
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("🛑 Shutdown requested, stopping sweeper");
                break;
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("✅ Configuration loaded successfully");

    let client = SessionClient::connect(&config).await?;
    let sessions = client.sessions();

    match cli.command {
        Commands::Sweep { interval } => {
            let secs = interval.unwrap_or(config.cleanup_interval_seconds).max(1);
            run_sweeper(client.clone(), Duration::from_secs(secs)).await;
        }
        Commands::Cleanup => {
            let report = match sessions.cleanup_expired(chrono::Utc::now()).await {
                Ok(cleaned) => CleanupReport { sessions_cleaned: cleaned, errors: 0 },
                Err(e) => {
                    tracing::error!("❌ Cleanup failed: {}", e);
                    CleanupReport { sessions_cleaned: 0, errors: 1 }
                }
            };
            print_json(&report)?;
            if report.errors > 0 {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Stats => {
            print_json(&client.session_stats().await)?;
        }
        Commands::Health => {
            let report = client.health_check().await;
            print_json(&report)?;
            if !report.is_reachable() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Create { user_id, ttl, metadata } => {
            let metadata: Metadata = metadata.into_iter().collect();
            let ttl = ttl.unwrap_or(client.default_ttl_seconds());
            let session = sessions.create(&user_id, ttl, metadata).await?;
            print_json(&session)?;
        }
        Commands::Get { session_id } => match sessions.get(&session_id).await? {
            Some(session) => print_json(&session)?,
            None => {
                eprintln!("Session {} not found", session_id);
                return Ok(ExitCode::FAILURE);
            }
        },
        Commands::Invalidate { session_id } => {
            if !sessions.invalidate(&session_id).await? {
                eprintln!("Session {} not found", session_id);
                return Ok(ExitCode::FAILURE);
            }
            println!("Session {} invalidated", session_id);
        }
        Commands::List { user_id } => {
            print_json(&sessions.list_active_for_user(&user_id).await?)?;
        }
        Commands::RevokeUser { user_id } => {
            let count = sessions.invalidate_all_for_user(&user_id).await?;
            println!("{} session(s) invalidated for user {}", count, user_id);
        }
    }

    Ok(ExitCode::SUCCESS)
}
