use anyhow::{anyhow, Context, Result};
use chrono::NaiveTime;
use chrono_tz::Tz;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use session_levels::api::{self, ApiState};
use session_levels::cache::load_bars;
use session_levels::calendar::{SessionRolloverClassifier, TradingDayClassifier, UtcDateClassifier};
use session_levels::session_core::{
    BarOutcome, BasePriceMode, EngineConfig, LevelsSnapshot, OffsetTable, RangeMode,
    SessionLevelEngine, SessionOrdering, SessionView,
};
use session_levels::BarObservation;

#[derive(Parser, Debug)]
#[command(name = "session-levels", author, version)]
#[command(about = "Prior-session price levels from a bar feed")]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Print verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a bar file (or directory) and print the resulting levels
    Replay {
        /// Bar file (.csv, .csv.zst, .json, .json.zst) or directory of them
        #[arg(short, long, env = "SESSION_LEVELS_INPUT")]
        input: PathBuf,

        /// Only load files matching a date (YYYYMMDD, YYYYMM or start:end)
        #[arg(short = 'D', long)]
        date: Option<String>,

        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Serve levels over HTTP, optionally seeded from a bar file
    Serve {
        /// Bar file or directory replayed before serving
        #[arg(short, long, env = "SESSION_LEVELS_INPUT")]
        input: Option<PathBuf>,

        /// Only load files matching a date (YYYYMMDD, YYYYMM or start:end)
        #[arg(short = 'D', long)]
        date: Option<String>,

        /// Port to run the web server on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        #[command(flatten)]
        engine: EngineArgs,
    },
}

#[derive(clap::Args, Debug)]
struct EngineArgs {
    /// Finalized sessions kept in history
    #[arg(long, env = "SESSION_LEVELS_RETAINED", default_value = "5")]
    retained_sessions: usize,

    /// prior-range, prior-close, prior-high, prior-low or current-open
    #[arg(long, default_value = "prior-range")]
    base_price_mode: BasePriceMode,

    /// 1d or 3d (3d currently sizes from the prior session only)
    #[arg(long, default_value = "1d")]
    range_mode: RangeMode,

    /// Accepted for compatibility; does not change levels
    #[arg(long)]
    use_gap_calculation: bool,

    /// Reject bars whose trading day is earlier than the current session
    #[arg(long)]
    reject_out_of_order: bool,

    /// JSON offset table replacing the built-in one
    #[arg(long)]
    table: Option<PathBuf>,

    /// Session calendar timezone
    #[arg(long, env = "SESSION_LEVELS_TZ", default_value = "America/New_York")]
    timezone: String,

    /// Local time (HH:MM) at which the next trading day starts
    #[arg(long, default_value = "18:00")]
    rollover: String,

    /// Keep Saturday/Sunday as their own trading days
    #[arg(long)]
    keep_weekends: bool,

    /// Use UTC calendar dates as trading days
    #[arg(long)]
    utc_days: bool,
}

impl EngineArgs {
    fn config(&self) -> Result<EngineConfig> {
        let offset_table = match &self.table {
            Some(path) => Some(load_table(path)?),
            None => None,
        };

        let config = EngineConfig {
            retained_sessions: self.retained_sessions,
            base_price_mode: self.base_price_mode,
            use_gap_calculation: self.use_gap_calculation,
            range_mode: self.range_mode,
            session_ordering: if self.reject_out_of_order {
                SessionOrdering::RejectRegression
            } else {
                SessionOrdering::Unchecked
            },
            offset_table,
        };
        config.validate().context("Invalid engine configuration")?;
        Ok(config)
    }

    fn classifier(&self) -> Result<Box<dyn TradingDayClassifier + Send + Sync>> {
        if self.utc_days {
            return Ok(Box::new(UtcDateClassifier));
        }

        let tz: Tz = self
            .timezone
            .parse()
            .map_err(|e| anyhow!("Unknown timezone {}: {}", self.timezone, e))?;
        let rollover = NaiveTime::parse_from_str(&self.rollover, "%H:%M")
            .with_context(|| format!("Invalid rollover time: {}", self.rollover))?;

        info!("Trading days: {} rollover at {}", tz, rollover);
        Ok(Box::new(SessionRolloverClassifier::new(tz, rollover, !self.keep_weekends)))
    }
}

fn load_table(path: &Path) -> Result<OffsetTable> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read offset table: {:?}", path))?;
    let table: OffsetTable = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse offset table: {:?}", path))?;
    info!("Loaded offset table with {} levels from {:?}", table.len(), path);
    Ok(table)
}

/// Replay summary
#[derive(Debug, Default)]
struct ReplayStats {
    bars: usize,
    rejected: usize,
    sessions: usize,
}

fn replay(
    engine: &mut SessionLevelEngine,
    bars: &[BarObservation],
    classifier: &dyn TradingDayClassifier,
) -> ReplayStats {
    let mut stats = ReplayStats::default();

    for bar in bars {
        stats.bars += 1;
        match engine.on_bar_with(bar, classifier) {
            Ok(BarOutcome::NewSession { .. }) => stats.sessions += 1,
            Ok(BarOutcome::Continuing) => {}
            Err(e) => {
                warn!("Skipping bar at {}: {}", bar.timestamp, e);
                stats.rejected += 1;
            }
        }
    }

    info!(
        "Replayed {} bars: {} sessions, {} rejected",
        stats.bars, stats.sessions, stats.rejected
    );
    stats
}

fn print_session(label: &str, session: &SessionView) {
    let end = session
        .end_bar_index
        .map(|i| i.to_string())
        .unwrap_or_else(|| "…".to_string());
    println!(
        "{} {} (bars {}..{}, {} levels)",
        label,
        session.trading_day,
        session.start_bar_index,
        end,
        session.levels.len()
    );
    for level in &session.levels {
        println!(
            "  {:<10} {:>12.4}  {:<10} {}",
            level.name,
            level.value,
            level.color,
            level.modifier.as_deref().unwrap_or("")
        );
    }
}

fn print_snapshot(snapshot: &LevelsSnapshot) {
    for session in &snapshot.history {
        print_session("session", session);
    }
    match &snapshot.current {
        Some(current) => print_session("current", current),
        None => println!("no session in progress"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let directive = if args.verbose {
        "session_levels=debug"
    } else {
        "session_levels=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(directive.parse()?),
        )
        .init();

    match args.command {
        Commands::Replay {
            input,
            date,
            json,
            engine: engine_args,
        } => {
            let mut engine = SessionLevelEngine::new(engine_args.config()?)?;
            let classifier = engine_args.classifier()?;

            let bars = load_bars(&input, date.as_deref())?;
            replay(&mut engine, &bars, classifier.as_ref());

            let snapshot = engine.snapshot();
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                print_snapshot(&snapshot);
            }
            engine.shutdown();
        }

        Commands::Serve {
            input,
            date,
            port,
            engine: engine_args,
        } => {
            let mut engine = SessionLevelEngine::new(engine_args.config()?)?;
            let classifier = engine_args.classifier()?;

            if let Some(input) = input {
                let bars = load_bars(&input, date.as_deref())?;
                replay(&mut engine, &bars, classifier.as_ref());
            }

            let state = Arc::new(ApiState::new(engine, classifier));
            let app = api::router(state);

            let addr = SocketAddr::from(([127, 0, 0, 1], port));
            info!("Server running at http://{}", addr);

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn engine_args(extra: &[&str]) -> EngineArgs {
        let mut argv = vec!["session-levels", "replay", "--input", "bars.csv"];
        argv.extend_from_slice(extra);
        match Args::parse_from(argv).command {
            Commands::Replay { engine, .. } => engine,
            Commands::Serve { .. } => unreachable!(),
        }
    }

    #[test]
    fn test_engine_args_defaults() {
        let config = engine_args(&[]).config().unwrap();
        assert_eq!(config.retained_sessions, 5);
        assert_eq!(config.base_price_mode, BasePriceMode::PriorRange);
        assert_eq!(config.session_ordering, SessionOrdering::Unchecked);
    }

    #[test]
    fn test_engine_args_overrides() {
        let args = engine_args(&[
            "--retained-sessions",
            "2",
            "--base-price-mode",
            "prior-close",
            "--reject-out-of-order",
        ]);
        let config = args.config().unwrap();
        assert_eq!(config.retained_sessions, 2);
        assert_eq!(config.base_price_mode, BasePriceMode::PriorClose);
        assert_eq!(config.session_ordering, SessionOrdering::RejectRegression);
    }

    #[test]
    fn test_zero_retention_is_an_error() {
        assert!(engine_args(&["--retained-sessions", "0"]).config().is_err());
    }

    #[test]
    fn test_bad_timezone_is_an_error() {
        assert!(engine_args(&["--timezone", "Mars/Olympus"]).classifier().is_err());
        assert!(engine_args(&["--rollover", "25:99"]).classifier().is_err());
    }

    #[test]
    fn test_replay_counts_rejections() {
        let mut engine = SessionLevelEngine::new(EngineConfig::default()).unwrap();
        let ts = Utc.with_ymd_and_hms(2025, 3, 3, 14, 30, 0).unwrap();
        let bars = vec![
            BarObservation::new(ts, 100.0, 110.0, 100.0, 105.0, 1),
            BarObservation::new(ts + Duration::minutes(1), 100.0, 90.0, 100.0, 95.0, 1),
            BarObservation::new(ts + Duration::days(1), 104.0, 106.0, 103.0, 105.0, 1),
        ];

        let stats = replay(&mut engine, &bars, &UtcDateClassifier);
        assert_eq!(stats.bars, 3);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.sessions, 2);
        assert_eq!(engine.snapshot().current.unwrap().value("Q1"), Some(110.0));
    }
}
