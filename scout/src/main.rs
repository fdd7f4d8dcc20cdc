//! Repertoire scout.
//!
//! `scout scan` indexes a player's exported games, reports how each opening
//! went, and scores the positions they keep reaching. `scout review` checks
//! a single game for moves that dropped the evaluation.
//!
//! Games are read from a Lichess NDJSON export. The engine binary is taken
//! from `SCOUT_ENGINE_PATH` or found in the usual install locations (see
//! [`config`] for all tunables).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chess::CozyReplayer;
use clap::{Parser, Subcommand};
use engine::{EngineLauncher, StockfishLauncher};
use repertoire::{
    AnalysisConfig, FetchOptions, GameSource, NdjsonGameSource, RepertoireState, ReviewPipeline,
    ReviewState, Scanner, SchedulerHandle,
};

mod config;
mod report;

#[derive(Parser)]
#[command(name = "scout", about = "Opening repertoire scout with engine analysis")]
struct Cli {
    /// JSON file with analysis settings. Missing fields keep their defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index games and score recurring positions.
    Scan {
        /// NDJSON game export.
        #[arg(long)]
        games: PathBuf,
        /// Player whose repertoire is scanned.
        #[arg(long)]
        user: String,
        /// Maximum number of games to read.
        #[arg(long)]
        limit: Option<usize>,
        /// Only games of these speeds, comma separated (blitz,rapid).
        #[arg(long)]
        perf: Option<String>,
        /// Only games created at or after this time (ms since the Unix epoch).
        #[arg(long)]
        since: Option<i64>,
        /// Search depth for each recurring position.
        #[arg(long)]
        depth: Option<u8>,
        /// Visits a position needs before it is scored.
        #[arg(long)]
        min_repetitions: Option<u32>,
    },
    /// Look for mistakes in one game.
    Review {
        /// NDJSON game export.
        #[arg(long)]
        games: PathBuf,
        /// Player whose moves are judged.
        #[arg(long)]
        user: String,
        /// Id of the game to review.
        #[arg(long)]
        game_id: String,
        /// Search depth for each position of the game.
        #[arg(long)]
        depth: Option<u8>,
    },
}

async fn run_scan(
    config: AnalysisConfig,
    options: FetchOptions,
    games: PathBuf,
    json: bool,
) -> anyhow::Result<()> {
    let launcher: Arc<dyn EngineLauncher> =
        Arc::new(StockfishLauncher::new(config::engine_config("bulk")));
    let state = RepertoireState::new();
    let scheduler = SchedulerHandle::spawn(launcher, state.clone(), config.bulk_depth);
    let scanner = Scanner::new(
        Arc::new(NdjsonGameSource::new(games)),
        Arc::new(CozyReplayer),
        scheduler.clone(),
        state.clone(),
        config,
    );

    let summary = scanner.scan(&options).await?;
    tracing::info!(
        games = summary.games,
        positions = summary.positions,
        queued = summary.queued,
        "Scan finished, analyzing"
    );

    tokio::select! {
        _ = scheduler.wait_idle() => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, stopping analysis");
            scheduler.stop().await?;
        }
    }
    scheduler.shutdown().await;

    let report = report::ScanReport::new(
        &summary,
        state.progress.get(),
        state.openings.read(|o| o.values().cloned().collect()),
        state.positions.read(|p| p.values().cloned().collect()),
    );
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report::format_scan(&report));
    }
    Ok(())
}

async fn run_review(
    config: AnalysisConfig,
    games: PathBuf,
    user: String,
    game_id: String,
    json: bool,
) -> anyhow::Result<()> {
    let source = NdjsonGameSource::new(games);
    let games = source
        .fetch_games(&FetchOptions::new(&user), &|_| {})
        .await?;
    let game = games
        .into_iter()
        .find(|g| g.id == game_id)
        .with_context(|| format!("game {} not found for {}", game_id, user))?;

    let launcher: Arc<dyn EngineLauncher> =
        Arc::new(StockfishLauncher::new(config::engine_config("review")));
    let pipeline = ReviewPipeline::new(
        launcher,
        Arc::new(CozyReplayer),
        config,
        ReviewState::default(),
    );
    let mistakes = pipeline.review_game(&game).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&mistakes)?);
    } else {
        print!("{}", report::format_mistakes(&game.id, &mistakes));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing with span durations
    use tracing_subscriber::fmt::format::FmtSpan;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut analysis = config::load_analysis_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Scan {
            games,
            user,
            limit,
            perf,
            since,
            depth,
            min_repetitions,
        } => {
            if let Some(depth) = depth {
                analysis.bulk_depth = depth;
            }
            if let Some(min) = min_repetitions {
                analysis.min_repetitions = min;
            }
            let options = FetchOptions {
                username: user,
                limit,
                perf_type: perf,
                since,
            };
            run_scan(analysis, options, games, cli.json).await
        }
        Commands::Review {
            games,
            user,
            game_id,
            depth,
        } => {
            if let Some(depth) = depth {
                analysis.review_depth = depth;
            }
            run_review(analysis, games, user, game_id, cli.json).await
        }
    }
}
