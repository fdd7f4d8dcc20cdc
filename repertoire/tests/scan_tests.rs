use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chess::{CozyReplayer, PlayerSide};
use engine::mock::{EngineLog, ScriptedEngine, ScriptedLauncher};
use repertoire::{
    AnalysisConfig, FetchOptions, Game, GameMetadata, GameResult, GameSource, IngestError,
    RepertoireState, ScanError, Scanner, SchedulerHandle, SchedulerStatus,
};

const ITALIAN: &str = "1. e4 e5 2. Nf3 Nc6 3. Bc4 Bc5 4. c3 Nf6 1-0";
const QGD: &str = "1. d4 d5 2. c4 e6 3. Nc3 Nf6 4. Bg5 Be7 1/2-1/2";
const ILLEGAL: &str = "1. e4 e5 2. Qxf7 *";

/// Serves a fixed batch, or reports the user missing.
struct FixedSource {
    games: Option<Vec<Game>>,
}

#[async_trait]
impl GameSource for FixedSource {
    async fn fetch_games(
        &self,
        options: &FetchOptions,
        progress: &(dyn Fn(usize) + Send + Sync),
    ) -> Result<Vec<Game>, IngestError> {
        let games = self
            .games
            .clone()
            .ok_or_else(|| IngestError::NotFound(options.username.clone()))?;
        for n in 1..=games.len() {
            progress(n);
        }
        Ok(games)
    }
}

fn game(id: &str, pgn: &str, side: PlayerSide, result: GameResult, opening: &str) -> Game {
    Game {
        id: id.into(),
        pgn: pgn.into(),
        white: "white".into(),
        black: "black".into(),
        player_color: side,
        result,
        metadata: GameMetadata {
            opening: Some(opening.into()),
            ..Default::default()
        },
    }
}

fn batch() -> Vec<Game> {
    vec![
        game("g1", ITALIAN, PlayerSide::White, GameResult::WhiteWins, "Italian Game"),
        game("g2", ITALIAN, PlayerSide::White, GameResult::WhiteWins, "Italian Game"),
        game("g3", QGD, PlayerSide::Black, GameResult::Draw, "Queen's Gambit Declined"),
        game("g4", ITALIAN, PlayerSide::White, GameResult::BlackWins, "Italian Game"),
    ]
}

struct Harness {
    scanner: Scanner,
    state: RepertoireState,
    log: Arc<EngineLog>,
}

fn harness(games: Option<Vec<Game>>, config: AnalysisConfig) -> Harness {
    let state = RepertoireState::new();
    let script = ScriptedEngine::new();
    let log = script.log();
    let scheduler = SchedulerHandle::spawn(
        Arc::new(ScriptedLauncher::new(script)),
        state.clone(),
        config.bulk_depth,
    );
    let scanner = Scanner::new(
        Arc::new(FixedSource { games }),
        Arc::new(CozyReplayer),
        scheduler,
        state.clone(),
        config,
    );
    Harness {
        scanner,
        state,
        log,
    }
}

async fn drained(scanner: &Scanner) {
    tokio::time::timeout(Duration::from_secs(5), scanner.scheduler().wait_idle())
        .await
        .expect("scheduler did not go idle");
}

mod scan_tests {
    use super::*;

    #[tokio::test]
    async fn scan_indexes_queues_and_drains() {
        let h = harness(Some(batch()), AnalysisConfig::default());

        let summary = h.scanner.scan(&FetchOptions::new("white")).await.unwrap();
        assert_eq!(summary.games, 4);
        assert_eq!(summary.index.indexed, 4);
        assert!(summary.index.skipped.is_empty());
        // Ply 7 of the Italian games, plies 6 and 8 of the Queen's Gambit.
        assert_eq!(summary.positions, 3);
        assert_eq!(summary.queued, 1);
        assert_eq!(summary.status, SchedulerStatus::AwaitingHandshake);
        assert!(!h.state.is_scanning.get());

        drained(&h.scanner).await;

        let progress = h.state.progress.get();
        assert_eq!(progress.fetched, 4);
        assert_eq!(progress.total, 4);
        assert_eq!(progress.analyze_total, 1);
        assert_eq!(progress.analyzed, 1);
        assert_eq!(h.log.search_count(), 1);

        let positions = h.state.positions.get();
        let recurring: Vec<_> = positions.values().filter(|n| n.visit_count >= 3).collect();
        assert_eq!(recurring.len(), 1);
        assert_eq!(recurring[0].main_move(), Some(("c3", 3)));
        assert!(recurring[0].evaluation.is_some());
        assert!(positions
            .values()
            .filter(|n| n.visit_count < 3)
            .all(|n| n.evaluation.is_none()));
    }

    #[tokio::test]
    async fn model_invariants_hold() {
        let h = harness(Some(batch()), AnalysisConfig::default());
        h.scanner.scan(&FetchOptions::new("white")).await.unwrap();
        drained(&h.scanner).await;

        for node in h.state.positions.get().values() {
            assert!(node.visit_count >= 1);
            assert_eq!(node.visit_count, node.user_moves.values().sum::<u32>());
        }

        let openings = h.state.openings.get();
        let total: u32 = openings.values().map(|o| o.total_games()).sum();
        assert_eq!(total, 4);

        let italian = &openings["Italian Game"];
        assert_eq!(italian.as_white.games, 3);
        assert_eq!(italian.as_white.wins, 2);
        assert_eq!(italian.as_white.losses, 1);
        assert_eq!(italian.as_black.games, 0);

        let qgd = &openings["Queen's Gambit Declined"];
        assert_eq!(qgd.as_black.draws, 1);
        for tally in [italian.as_white, qgd.as_black] {
            assert_eq!(tally.games, tally.wins + tally.losses + tally.draws);
        }
    }

    #[tokio::test]
    async fn every_candidate_is_analyzed_in_index_order() {
        let config = AnalysisConfig {
            min_repetitions: 1,
            ..Default::default()
        };
        let h = harness(Some(batch()), config);

        let summary = h.scanner.scan(&FetchOptions::new("white")).await.unwrap();
        assert_eq!(summary.queued, 3);
        drained(&h.scanner).await;

        let positions = h.state.positions.get();
        let fens: Vec<String> = positions.values().map(|n| n.fen.clone()).collect();
        assert_eq!(h.log.searched_fens(), fens);
        assert_eq!(h.state.progress.get().analyzed, 3);
        assert!(positions.values().all(|n| n.evaluation.is_some()));
        assert!(h.log.sent_lines().contains(&"go depth 14".to_string()));
    }

    #[tokio::test]
    async fn rescan_rebuilds_the_same_model() {
        let h = harness(Some(batch()), AnalysisConfig::default());

        h.scanner.scan(&FetchOptions::new("white")).await.unwrap();
        drained(&h.scanner).await;
        let first_positions = h.state.positions.get();
        let first_openings = h.state.openings.get();

        h.scanner.scan(&FetchOptions::new("white")).await.unwrap();
        drained(&h.scanner).await;

        assert_eq!(h.state.positions.get(), first_positions);
        assert_eq!(h.state.openings.get(), first_openings);
        assert_eq!(h.state.progress.get().analyzed, 1);
        assert_eq!(h.log.launch_count(), 2);
    }
}

mod failure_tests {
    use super::*;

    #[tokio::test]
    async fn unparsable_game_is_skipped_without_trace() {
        let good = game("good", ITALIAN, PlayerSide::White, GameResult::WhiteWins, "Italian Game");
        let bad = game("bad", ILLEGAL, PlayerSide::White, GameResult::Draw, "King's Pawn Game");

        let mixed = harness(Some(vec![bad, good.clone()]), AnalysisConfig::default());
        let summary = mixed.scanner.scan(&FetchOptions::new("white")).await.unwrap();
        assert_eq!(summary.index.indexed, 1);
        assert_eq!(summary.index.skipped.len(), 1);
        assert_eq!(summary.index.skipped[0].game_id, "bad");

        let clean = harness(Some(vec![good]), AnalysisConfig::default());
        clean.scanner.scan(&FetchOptions::new("white")).await.unwrap();

        assert_eq!(mixed.state.positions.get(), clean.state.positions.get());
        assert_eq!(mixed.state.openings.get(), clean.state.openings.get());
        assert!(!mixed.state.openings.read(|o| o.contains_key("King's Pawn Game")));
    }

    #[tokio::test]
    async fn nothing_recurring_leaves_scheduler_idle() {
        let games = vec![game("g1", QGD, PlayerSide::Black, GameResult::Draw, "QGD")];
        let h = harness(Some(games), AnalysisConfig::default());

        let summary = h.scanner.scan(&FetchOptions::new("black")).await.unwrap();
        assert_eq!(summary.queued, 0);
        assert_eq!(summary.status, SchedulerStatus::Idle);
        assert_eq!(h.log.launch_count(), 0);
    }

    #[tokio::test]
    async fn unknown_user_aborts_the_scan() {
        let h = harness(None, AnalysisConfig::default());

        let err = h.scanner.scan(&FetchOptions::new("nobody")).await.unwrap_err();
        assert!(matches!(err, ScanError::Ingest(IngestError::NotFound(name)) if name == "nobody"));
        assert!(!h.state.is_scanning.get());
        assert!(h.state.positions.get().is_empty());
        assert!(h.state.queue.get().is_empty());
        assert_eq!(h.log.launch_count(), 0);
    }
}
