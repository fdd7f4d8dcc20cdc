use cozy_chess::Board;
use serde::{Deserialize, Serialize};

/// Parse a FEN string into a Board
pub fn parse_fen(fen: &str) -> Result<Board, FenError> {
    if fen.split_whitespace().next().is_none() {
        return Err(FenError::InvalidFormat);
    }
    fen.parse().map_err(|_| FenError::InvalidFormat)
}

/// Format a Board as a FEN string
pub fn format_fen(board: &Board) -> String {
    board.to_string()
}

/// Normalized position fingerprint used to merge transpositions.
///
/// Holds the piece placement, side to move and castling rights of a FEN.
/// The en-passant square and both move counters are dropped, so positions
/// reached by different move orders or at different move numbers share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PositionKey(String);

impl PositionKey {
    pub fn from_fen(fen: &str) -> Result<Self, FenError> {
        let mut fields = fen.split_whitespace();
        let placement = fields.next().ok_or(FenError::InvalidFormat)?;
        if placement.split('/').count() != 8 {
            return Err(FenError::InvalidBoardLayout);
        }
        let side = match fields.next() {
            Some(side @ ("w" | "b")) => side,
            _ => return Err(FenError::InvalidFormat),
        };
        let castling = fields.next().unwrap_or("-");
        Ok(Self(format!("{} {} {}", placement, side, castling)))
    }

    pub fn from_board(board: &Board) -> Self {
        // Board's Display always yields a well-formed FEN.
        let fen = format_fen(board);
        let mut fields = fen.split_whitespace();
        let placement = fields.next().unwrap_or_default();
        let side = fields.next().unwrap_or("w");
        let castling = fields.next().unwrap_or("-");
        Self(format!("{} {} {}", placement, side, castling))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PositionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FenError {
    #[error("Invalid FEN format")]
    InvalidFormat,
    #[error("Invalid board layout")]
    InvalidBoardLayout,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    #[test]
    fn test_key_drops_counters_and_en_passant() {
        let key = PositionKey::from_fen(
            "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq e6 0 2",
        )
        .unwrap();
        assert_eq!(
            key.as_str(),
            "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq"
        );
    }

    #[test]
    fn test_key_from_board_matches_key_from_fen() {
        let board = parse_fen(START_FEN).unwrap();
        assert_eq!(
            PositionKey::from_board(&board),
            PositionKey::from_fen(START_FEN).unwrap()
        );
    }

    #[test]
    fn test_side_to_move_distinguishes_keys() {
        let white = PositionKey::from_fen("8/8/8/8/8/8/8/K6k w - - 0 1").unwrap();
        let black = PositionKey::from_fen("8/8/8/8/8/8/8/K6k b - - 0 1").unwrap();
        assert_ne!(white, black);
    }

    #[test]
    fn test_castling_rights_distinguish_keys() {
        let with = PositionKey::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        let without = PositionKey::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w - - 0 1").unwrap();
        assert_ne!(with, without);
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(PositionKey::from_fen("").is_err());
        assert!(PositionKey::from_fen("8/8/8 w - - 0 1").is_err());
        assert!(PositionKey::from_fen("8/8/8/8/8/8/8/K6k x - - 0 1").is_err());
    }

    #[test]
    fn test_parse_fen_invalid() {
        assert!(parse_fen("not a fen").is_err());
    }

    proptest! {
        #[test]
        fn key_ignores_move_counters(halfmove in 0u32..100, fullmove in 1u32..300) {
            let fen = format!(
                "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - {} {}",
                halfmove, fullmove
            );
            let key = PositionKey::from_fen(&fen).unwrap();
            prop_assert_eq!(
                key.as_str(),
                "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq"
            );
        }
    }
}
