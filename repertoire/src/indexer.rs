//! Builds the position-frequency model and opening statistics from games.

use chess::{MoveReplayer, ReplayError};

use crate::config::AnalysisConfig;
use crate::game::Game;
use crate::model::{OpeningMap, OpeningStats, PositionMap, PositionNode, RepertoireState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedGame {
    pub game_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexReport {
    pub indexed: usize,
    /// Eligible plies recorded across all indexed games.
    pub positions_recorded: usize,
    pub skipped: Vec<SkippedGame>,
}

/// Index one game into `positions` and `openings`.
///
/// The game is replayed before anything is touched, so a game that fails to
/// replay leaves both maps unchanged. Returns the number of plies recorded.
pub fn index_game(
    game: &Game,
    replayer: &dyn MoveReplayer,
    config: &AnalysisConfig,
    positions: &mut PositionMap,
    openings: &mut OpeningMap,
) -> Result<usize, ReplayError> {
    let replayed = replayer.replay(&game.pgn)?;

    let opening = game
        .metadata
        .opening
        .as_deref()
        .or_else(|| replayed.tag("Opening"))
        .filter(|name| !name.trim().is_empty())
        .unwrap_or(&config.unknown_opening);
    openings
        .entry(opening.to_string())
        .or_insert_with(|| OpeningStats::new(opening))
        .record(game);

    let window = config.ply_window();
    let mut recorded = 0;
    for ply in replayed
        .plies
        .iter()
        .filter(|ply| window.contains(&ply.number) && ply.side_to_move == game.player_color)
    {
        positions
            .entry(ply.key.clone())
            .or_insert_with(|| PositionNode::new(ply.key.clone(), ply.fen_before.clone()))
            .record_move(&ply.san);
        recorded += 1;
    }

    Ok(recorded)
}

/// Index a batch. Games that fail to replay are logged and skipped.
pub fn index_games(
    games: &[Game],
    replayer: &dyn MoveReplayer,
    config: &AnalysisConfig,
    positions: &mut PositionMap,
    openings: &mut OpeningMap,
) -> IndexReport {
    let mut report = IndexReport::default();
    for game in games {
        match index_game(game, replayer, config, positions, openings) {
            Ok(recorded) => {
                tracing::debug!(game_id = %game.id, recorded, "Indexed game");
                report.indexed += 1;
                report.positions_recorded += recorded;
            }
            Err(e) => {
                tracing::warn!(game_id = %game.id, "Skipping game that failed to replay: {}", e);
                report.skipped.push(SkippedGame {
                    game_id: game.id.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }
    report
}

/// Index a batch straight into the published state.
pub fn index_into(
    games: &[Game],
    replayer: &dyn MoveReplayer,
    config: &AnalysisConfig,
    state: &RepertoireState,
) -> IndexReport {
    let mut report = IndexReport::default();
    state.positions.update(|positions| {
        state.openings.update(|openings| {
            report = index_games(games, replayer, config, positions, openings);
        });
    });
    tracing::info!(
        indexed = report.indexed,
        skipped = report.skipped.len(),
        positions = state.positions.read(|p| p.len()),
        "Indexing complete"
    );
    report
}
