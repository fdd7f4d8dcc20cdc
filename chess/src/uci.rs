//! UCI (Universal Chess Interface) move notation

use cozy_chess::{Board, File, Move, Piece, Rank, Square};

use crate::converters::{format_piece, format_square, parse_piece, parse_square};

/// Convert UCI castling notation to cozy_chess notation
///
/// UCI uses standard notation (king moves 2 squares): e1g1, e1c1, e8g8, e8c8
/// cozy_chess uses king-to-rook notation: e1h1, e1a1, e8h8, e8a8
///
/// The converted move is only returned when it is in `legal_moves`; anything
/// else is passed through untouched.
pub fn convert_uci_castling_to_cozy(mv: Move, legal_moves: &[Move]) -> Move {
    let is_rank_1_or_8 = matches!(mv.from.rank(), Rank::First | Rank::Eighth);
    let is_e_file = matches!(mv.from.file(), File::E);
    let is_g_or_c_file = matches!(mv.to.file(), File::G | File::C);

    if is_rank_1_or_8 && is_e_file && is_g_or_c_file && mv.promotion.is_none() {
        let target_square = match (mv.from.rank(), mv.to.file()) {
            (Rank::First, File::G) => Square::new(File::H, Rank::First),
            (Rank::First, File::C) => Square::new(File::A, Rank::First),
            (Rank::Eighth, File::G) => Square::new(File::H, Rank::Eighth),
            (Rank::Eighth, File::C) => Square::new(File::A, Rank::Eighth),
            _ => return mv,
        };

        let converted = Move {
            from: mv.from,
            to: target_square,
            promotion: None,
        };

        if legal_moves.contains(&converted) {
            return converted;
        }
    }

    mv
}

/// True if `mv` is a castling move in cozy_chess (king-captures-own-rook) form.
pub fn is_cozy_castling(board: &Board, mv: Move) -> bool {
    board.piece_on(mv.from) == Some(Piece::King)
        && board.color_on(mv.from).is_some()
        && board.color_on(mv.from) == board.color_on(mv.to)
}

/// Format a move in raw UCI notation (e.g., "e2e4", "e7e8q")
pub fn format_uci_move(mv: Move) -> String {
    let mut s = format!("{}{}", format_square(mv.from), format_square(mv.to));
    if let Some(promo) = mv.promotion {
        s.push(format_piece(promo));
    }
    s
}

/// Format a move the way an engine expects it, translating cozy_chess
/// castling (e1h1) back to the king's destination square (e1g1).
pub fn format_standard_uci(board: &Board, mv: Move) -> String {
    if is_cozy_castling(board, mv) {
        let file = if (mv.to.file() as u8) > (mv.from.file() as u8) {
            File::G
        } else {
            File::C
        };
        let to = Square::new(file, mv.from.rank());
        return format!("{}{}", format_square(mv.from), format_square(to));
    }
    format_uci_move(mv)
}

/// Parse UCI move format (e2e4, e7e8q) without reference to a position.
pub fn parse_uci_move(s: &str) -> Result<Move, UciMoveError> {
    if !s.is_ascii() || !(4..=5).contains(&s.len()) {
        return Err(UciMoveError::InvalidMove(s.to_string()));
    }

    let from = parse_square(&s[0..2]).ok_or_else(|| UciMoveError::InvalidSquare(s.to_string()))?;
    let to = parse_square(&s[2..4]).ok_or_else(|| UciMoveError::InvalidSquare(s.to_string()))?;

    let promotion = match s[4..].chars().next() {
        None => None,
        Some(c) => match parse_piece(c) {
            Some(p @ (Piece::Queen | Piece::Rook | Piece::Bishop | Piece::Knight)) => Some(p),
            _ => return Err(UciMoveError::InvalidPromotion(s.to_string())),
        },
    };

    Ok(Move {
        from,
        to,
        promotion,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UciMoveError {
    #[error("Invalid move: {0}")]
    InvalidMove(String),
    #[error("Invalid square: {0}")]
    InvalidSquare(String),
    #[error("Invalid promotion: {0}")]
    InvalidPromotion(String),
}
