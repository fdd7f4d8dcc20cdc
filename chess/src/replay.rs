//! Move replayer: turns game notation into the positions it passes through.

use std::collections::HashMap;

use cozy_chess::{Board, Move};

use crate::fen::{format_fen, parse_fen, FenError, PositionKey};
use crate::pgn::{format_move_as_san, parse_pgn, parse_san, PgnError, PgnResult, SanError};
use crate::types::PlayerSide;
use crate::uci::{convert_uci_castling_to_cozy, format_standard_uci, parse_uci_move};

/// One half-move of a replayed game.
#[derive(Debug, Clone)]
pub struct Ply {
    /// 1-indexed ply number.
    pub number: u32,
    /// Full FEN of the position before the move.
    pub fen_before: String,
    pub key: PositionKey,
    pub side_to_move: PlayerSide,
    pub san: String,
    /// Coordinate notation with standard castling (e1g1).
    pub uci: String,
}

impl Ply {
    /// Full-move number this ply belongs to.
    pub fn move_number(&self) -> u32 {
        (self.number + 1) / 2
    }

    pub fn from_square(&self) -> &str {
        &self.uci[0..2]
    }

    pub fn to_square(&self) -> &str {
        &self.uci[2..4]
    }
}

#[derive(Debug, Clone)]
pub struct ReplayedGame {
    pub tags: HashMap<String, String>,
    pub plies: Vec<Ply>,
    pub final_fen: String,
    pub result: PgnResult,
}

impl ReplayedGame {
    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags.get(name).map(String::as_str)
    }
}

/// Result of applying a single move to a position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMove {
    pub uci: String,
    pub san: String,
    pub fen_after: String,
}

/// Rules capability consumed by the indexer and the review pipeline.
pub trait MoveReplayer: Send + Sync {
    /// Replay a PGN from its start position (or its `FEN` tag).
    fn replay(&self, notation: &str) -> Result<ReplayedGame, ReplayError>;

    /// All legal moves from `fen`, in coordinate notation.
    fn legal_moves(&self, fen: &str) -> Result<Vec<String>, ReplayError>;

    /// Apply a coordinate-notation move to `fen`.
    fn apply(&self, fen: &str, uci: &str) -> Result<AppliedMove, ReplayError>;
}

/// [`MoveReplayer`] backed by cozy-chess.
#[derive(Debug, Clone, Copy, Default)]
pub struct CozyReplayer;

impl MoveReplayer for CozyReplayer {
    fn replay(&self, notation: &str) -> Result<ReplayedGame, ReplayError> {
        let pgn = parse_pgn(notation)?;

        let mut board = match pgn.tag("FEN") {
            Some(fen) => parse_fen(fen)?,
            None => Board::default(),
        };

        let mut plies = Vec::with_capacity(pgn.moves.len());
        for (i, token) in pgn.moves.iter().enumerate() {
            let number = (i as u32) + 1;
            let mv = parse_san(&board, token).map_err(|source| ReplayError::IllegalMove {
                ply: number,
                san: token.clone(),
                source,
            })?;

            let fen_before = format_fen(&board);
            plies.push(Ply {
                number,
                key: PositionKey::from_board(&board),
                side_to_move: board.side_to_move().into(),
                san: format_move_as_san(&board, mv),
                uci: format_standard_uci(&board, mv),
                fen_before,
            });

            board.play_unchecked(mv);
        }

        Ok(ReplayedGame {
            tags: pgn.tags,
            plies,
            final_fen: format_fen(&board),
            result: pgn.result,
        })
    }

    fn legal_moves(&self, fen: &str) -> Result<Vec<String>, ReplayError> {
        let board = parse_fen(fen)?;
        Ok(legal_moves(&board)
            .into_iter()
            .map(|mv| format_standard_uci(&board, mv))
            .collect())
    }

    fn apply(&self, fen: &str, uci: &str) -> Result<AppliedMove, ReplayError> {
        let board = parse_fen(fen)?;
        let mv = resolve_uci(&board, uci)?;
        let san = format_move_as_san(&board, mv);
        let uci = format_standard_uci(&board, mv);
        let mut after = board;
        after.play_unchecked(mv);
        Ok(AppliedMove {
            uci,
            san,
            fen_after: format_fen(&after),
        })
    }
}

/// Translate a coordinate move into SAN against `fen`, falling back to the
/// coordinate form when either the position or the move does not parse.
pub fn uci_to_san(fen: &str, uci: &str) -> String {
    let Ok(board) = parse_fen(fen) else {
        return uci.to_string();
    };
    match resolve_uci(&board, uci) {
        Ok(mv) => format_move_as_san(&board, mv),
        Err(_) => uci.to_string(),
    }
}

/// Collect every legal move in `board`.
pub fn legal_moves(board: &Board) -> Vec<Move> {
    let mut moves = Vec::new();
    board.generate_moves(|mvs| {
        moves.extend(mvs);
        false
    });
    moves
}

fn resolve_uci(board: &Board, uci: &str) -> Result<Move, ReplayError> {
    let raw = parse_uci_move(uci).map_err(|_| ReplayError::InvalidMove(uci.to_string()))?;
    let legal = legal_moves(board);
    let mv = convert_uci_castling_to_cozy(raw, &legal);
    if legal.contains(&mv) {
        Ok(mv)
    } else {
        Err(ReplayError::InvalidMove(uci.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("Malformed notation: {0}")]
    Pgn(#[from] PgnError),
    #[error("Illegal move {san} at ply {ply}: {source}")]
    IllegalMove {
        ply: u32,
        san: String,
        #[source]
        source: SanError,
    },
    #[error("FEN parse error: {0}")]
    Fen(#[from] FenError),
    #[error("Invalid move for position: {0}")]
    InvalidMove(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    #[test]
    fn test_replay_records_position_before_each_move() {
        let game = CozyReplayer.replay("1. e4 e5 2. Nf3 Nc6 *").unwrap();
        assert_eq!(game.plies.len(), 4);
        assert_eq!(game.plies[0].fen_before, START_FEN);
        assert_eq!(game.plies[0].side_to_move, PlayerSide::White);
        assert_eq!(game.plies[1].side_to_move, PlayerSide::Black);
        assert_eq!(game.plies[2].san, "Nf3");
        assert_eq!(game.plies[2].uci, "g1f3");
        assert_eq!(game.plies[2].from_square(), "g1");
        assert_eq!(game.plies[2].to_square(), "f3");
        assert_eq!(game.plies[3].move_number(), 2);
    }

    #[test]
    fn test_replay_castling_uses_standard_coordinates() {
        let game = CozyReplayer
            .replay("1. e4 e5 2. Nf3 Nc6 3. Bc4 Bc5 4. O-O Nf6 *")
            .unwrap();
        assert_eq!(game.plies[6].san, "O-O");
        assert_eq!(game.plies[6].uci, "e1g1");
    }

    #[test]
    fn test_replay_honours_fen_tag() {
        let pgn = "[SetUp \"1\"]\n[FEN \"4k3/8/8/8/8/8/8/R3K3 w - - 0 1\"]\n\n1. Ra8+ *";
        let game = CozyReplayer.replay(pgn).unwrap();
        assert_eq!(game.plies[0].fen_before, "4k3/8/8/8/8/8/8/R3K3 w - - 0 1");
        assert_eq!(game.plies[0].san, "Ra8+");
    }

    #[test]
    fn test_replay_illegal_move_reports_ply() {
        let err = CozyReplayer.replay("1. e4 e5 2. Ke3 *").unwrap_err();
        match err {
            ReplayError::IllegalMove { ply, san, .. } => {
                assert_eq!(ply, 3);
                assert_eq!(san, "Ke3");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_legal_moves_from_start() {
        let moves = CozyReplayer.legal_moves(START_FEN).unwrap();
        assert_eq!(moves.len(), 20);
        assert!(moves.contains(&"e2e4".to_string()));
    }

    #[test]
    fn test_apply_move() {
        let applied = CozyReplayer.apply(START_FEN, "e2e4").unwrap();
        assert_eq!(applied.san, "e4");
        assert!(applied.fen_after.starts_with("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq"));
        assert!(CozyReplayer.apply(START_FEN, "e2e5").is_err());
    }

    #[test]
    fn test_uci_to_san_falls_back() {
        assert_eq!(uci_to_san(START_FEN, "g1f3"), "Nf3");
        assert_eq!(uci_to_san("not a fen", "e2e4"), "e2e4");
        assert_eq!(uci_to_san(START_FEN, "zz"), "zz");
        assert_eq!(uci_to_san(START_FEN, "e2e5"), "e2e5");
    }
}
