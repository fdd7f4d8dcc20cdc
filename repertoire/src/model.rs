//! The position-frequency model and the stores it is published through.

use std::collections::{HashMap, VecDeque};

use chess::{AnalysisScore, PositionKey};
use engine::EngineEvaluation;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::game::{Game, Outcome};
use crate::scheduler::SchedulerStatus;
use crate::store::Store;

/// Positions in first-visit order.
pub type PositionMap = IndexMap<PositionKey, PositionNode>;

/// Openings in first-seen order.
pub type OpeningMap = IndexMap<String, OpeningStats>;

/// Engine verdict attached to a node by the bulk scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionEvaluation {
    /// Pawns, side to move's perspective.
    pub score: f64,
    pub raw: Option<AnalysisScore>,
    pub depth: u8,
    pub best_move: Option<String>,
}

impl From<EngineEvaluation> for PositionEvaluation {
    fn from(eval: EngineEvaluation) -> Self {
        Self {
            score: eval.score,
            raw: eval.raw,
            depth: eval.depth,
            best_move: eval.best_move,
        }
    }
}

/// A recurring position the subject had to move from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionNode {
    pub key: PositionKey,
    /// Full FEN of the first visit; this is what the engine is given.
    pub fen: String,
    pub visit_count: u32,
    /// SAN of each move played from here, with its count.
    pub user_moves: HashMap<String, u32>,
    pub evaluation: Option<PositionEvaluation>,
}

impl PositionNode {
    pub fn new(key: PositionKey, fen: String) -> Self {
        Self {
            key,
            fen,
            visit_count: 0,
            user_moves: HashMap::new(),
            evaluation: None,
        }
    }

    pub fn record_move(&mut self, san: &str) {
        self.visit_count += 1;
        *self.user_moves.entry(san.to_string()).or_insert(0) += 1;
    }

    /// Most played move; ties go to the alphabetically first SAN.
    pub fn main_move(&self) -> Option<(&str, u32)> {
        self.user_moves
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(san, count)| (san.as_str(), *count))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeTally {
    pub games: u32,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
}

impl OutcomeTally {
    pub fn record(&mut self, outcome: Outcome) {
        self.games += 1;
        match outcome {
            Outcome::Win => self.wins += 1,
            Outcome::Loss => self.losses += 1,
            Outcome::Draw => self.draws += 1,
        }
    }

    /// Points per game with draws as half, `None` before any game.
    pub fn score_rate(&self) -> Option<f64> {
        if self.games == 0 {
            return None;
        }
        Some((self.wins as f64 + self.draws as f64 / 2.0) / self.games as f64)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpeningStats {
    pub name: String,
    pub as_white: OutcomeTally,
    pub as_black: OutcomeTally,
}

impl OpeningStats {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn record(&mut self, game: &Game) {
        let tally = match game.player_color {
            chess::PlayerSide::White => &mut self.as_white,
            chess::PlayerSide::Black => &mut self.as_black,
        };
        tally.record(game.outcome());
    }

    pub fn total_games(&self) -> u32 {
        self.as_white.games + self.as_black.games
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanProgress {
    pub fetched: usize,
    pub analyzed: usize,
    pub total: usize,
    pub analyze_total: usize,
}

/// Every observable piece of repertoire state.
#[derive(Debug, Clone, Default)]
pub struct RepertoireState {
    pub games: Store<Vec<Game>>,
    pub positions: Store<PositionMap>,
    pub openings: Store<OpeningMap>,
    pub queue: Store<VecDeque<PositionKey>>,
    pub progress: Store<ScanProgress>,
    pub scheduler_status: Store<SchedulerStatus>,
    pub is_scanning: Store<bool>,
}

impl RepertoireState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear everything a new scan rebuilds.
    pub fn reset(&self) {
        self.games.set(Vec::new());
        self.positions.set(PositionMap::new());
        self.openings.set(OpeningMap::new());
        self.queue.set(VecDeque::new());
        self.progress.set(ScanProgress::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{GameMetadata, GameResult};
    use chess::PlayerSide;

    const FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    #[test]
    fn test_record_move_keeps_visit_count_in_sync() {
        let key = PositionKey::from_fen(FEN).unwrap();
        let mut node = PositionNode::new(key, FEN.to_string());
        node.record_move("e4");
        node.record_move("d4");
        node.record_move("e4");
        assert_eq!(node.visit_count, 3);
        assert_eq!(node.user_moves.values().sum::<u32>(), 3);
        assert_eq!(node.main_move(), Some(("e4", 2)));
    }

    #[test]
    fn test_main_move_tie_break() {
        let key = PositionKey::from_fen(FEN).unwrap();
        let mut node = PositionNode::new(key, FEN.to_string());
        node.record_move("d4");
        node.record_move("c4");
        assert_eq!(node.main_move(), Some(("c4", 1)));
    }

    #[test]
    fn test_opening_stats_by_color() {
        let mut stats = OpeningStats::new("Sicilian Defense");
        let mut game = Game {
            id: "a".into(),
            pgn: String::new(),
            white: "me".into(),
            black: "them".into(),
            player_color: PlayerSide::White,
            result: GameResult::WhiteWins,
            metadata: GameMetadata::default(),
        };
        stats.record(&game);
        game.player_color = PlayerSide::Black;
        stats.record(&game);
        game.result = GameResult::Unfinished;
        stats.record(&game);

        assert_eq!(stats.as_white.wins, 1);
        assert_eq!(stats.as_black.losses, 1);
        assert_eq!(stats.as_black.draws, 1);
        assert_eq!(stats.total_games(), 3);
        assert_eq!(stats.as_black.score_rate(), Some(0.25));
        assert_eq!(OutcomeTally::default().score_rate(), None);
    }

    #[test]
    fn test_evaluation_from_engine() {
        let eval = EngineEvaluation {
            score: -0.4,
            raw: Some(AnalysisScore::Centipawns(-40)),
            best_move: Some("g8f6".into()),
            depth: 14,
            pv: vec!["g8f6".into()],
        };
        let stored = PositionEvaluation::from(eval);
        assert_eq!(stored.score, -0.4);
        assert_eq!(stored.best_move.as_deref(), Some("g8f6"));
    }

    #[test]
    fn test_reset_clears_state() {
        let state = RepertoireState::new();
        let key = PositionKey::from_fen(FEN).unwrap();
        state.queue.update(|q| q.push_back(key));
        state.progress.update(|p| p.analyzed = 4);
        state.reset();
        assert!(state.queue.get().is_empty());
        assert_eq!(state.progress.get(), ScanProgress::default());
    }
}
