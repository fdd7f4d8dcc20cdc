use cozy_chess::{BitBoard, Board, GameStatus, Move, Piece};

use crate::converters::{
    char_to_file, char_to_rank, file_to_char, format_piece_upper, format_square, parse_piece,
    parse_square, rank_to_char,
};
use crate::replay::legal_moves;
use crate::uci::{format_uci_move, is_cozy_castling};

/// Parse a Standard Algebraic Notation (SAN) move against `board`.
///
/// Accepts check/mate suffixes, annotation glyphs (`!`, `?`), `0-0` style
/// castling and over-disambiguated moves (`Ngf3` where `Nf3` would do).
pub fn parse_san(board: &Board, san: &str) -> Result<Move, SanError> {
    let cleaned = san
        .trim()
        .trim_end_matches(|c| matches!(c, '+' | '#' | '!' | '?'));
    if cleaned.is_empty() {
        return Err(SanError::InvalidFormat(san.to_string()));
    }

    let legal = legal_moves(board);

    match cleaned {
        "O-O" | "0-0" | "O-O-O" | "0-0-0" => {
            let kingside = cleaned.len() == 3;
            return legal
                .into_iter()
                .find(|mv| {
                    is_cozy_castling(board, *mv)
                        && ((mv.to.file() as u8) > (mv.from.file() as u8)) == kingside
                })
                .ok_or_else(|| SanError::NoLegalMove(san.to_string()));
        }
        _ => {}
    }

    let mut body: Vec<char> = cleaned.chars().filter(|c| !matches!(c, 'x' | '=' | ':')).collect();

    let piece = match body.first() {
        Some(c) if c.is_ascii_uppercase() => {
            let p = parse_piece(*c).ok_or_else(|| SanError::InvalidFormat(san.to_string()))?;
            body.remove(0);
            p
        }
        Some(_) => Piece::Pawn,
        None => return Err(SanError::InvalidFormat(san.to_string())),
    };

    let promotion = match body.last() {
        Some(c) if piece == Piece::Pawn && c.is_ascii_alphabetic() && !c.is_ascii_lowercase() => {
            let p = parse_piece(*c).ok_or_else(|| SanError::InvalidPromotion(san.to_string()))?;
            body.pop();
            Some(p)
        }
        // Some exporters write promotions in lowercase ("e8q").
        Some(c) if piece == Piece::Pawn && body.len() == 3 && matches!(c, 'q' | 'r' | 'n') => {
            let p = parse_piece(*c).ok_or_else(|| SanError::InvalidPromotion(san.to_string()))?;
            body.pop();
            Some(p)
        }
        _ => None,
    };

    if body.len() < 2 {
        return Err(SanError::InvalidFormat(san.to_string()));
    }
    let dest: String = body[body.len() - 2..].iter().collect();
    let to = parse_square(&dest).ok_or_else(|| SanError::InvalidSquare(dest.clone()))?;

    let mut from_file = None;
    let mut from_rank = None;
    for c in &body[..body.len() - 2] {
        if let Some(f) = char_to_file(*c) {
            from_file = Some(f);
        } else if let Some(r) = char_to_rank(*c) {
            from_rank = Some(r);
        } else {
            return Err(SanError::InvalidFormat(san.to_string()));
        }
    }

    let candidates: Vec<Move> = legal
        .into_iter()
        .filter(|mv| {
            mv.to == to
                && mv.promotion == promotion
                && board.piece_on(mv.from) == Some(piece)
                && !is_cozy_castling(board, *mv)
                && from_file.map_or(true, |f| mv.from.file() == f)
                && from_rank.map_or(true, |r| mv.from.rank() == r)
        })
        .collect();

    match candidates.as_slice() {
        [mv] => Ok(*mv),
        [] => Err(SanError::NoLegalMove(san.to_string())),
        _ => Err(SanError::AmbiguousMove(san.to_string())),
    }
}

/// Format a move as SAN, including disambiguation and the check/mate suffix.
///
/// Moves whose origin square is empty fall back to raw UCI notation.
pub fn format_move_as_san(board: &Board, mv: Move) -> String {
    let Some(piece) = board.piece_on(mv.from) else {
        return format_uci_move(mv);
    };

    let mut san = String::new();

    if is_cozy_castling(board, mv) {
        if (mv.to.file() as u8) > (mv.from.file() as u8) {
            san.push_str("O-O");
        } else {
            san.push_str("O-O-O");
        }
    } else if piece == Piece::Pawn {
        // Pawns only change file when capturing, en passant included.
        if mv.from.file() != mv.to.file() {
            san.push(file_to_char(mv.from.file()));
            san.push('x');
        }
        san.push_str(&format_square(mv.to));
        if let Some(promo) = mv.promotion {
            san.push('=');
            san.push(format_piece_upper(promo));
        }
    } else {
        san.push(format_piece_upper(piece));

        let rivals: Vec<Move> = legal_moves(board)
            .into_iter()
            .filter(|other| {
                other.to == mv.to
                    && other.from != mv.from
                    && board.piece_on(other.from) == Some(piece)
            })
            .collect();
        if !rivals.is_empty() {
            let shares_file = rivals.iter().any(|o| o.from.file() == mv.from.file());
            let shares_rank = rivals.iter().any(|o| o.from.rank() == mv.from.rank());
            if !shares_file {
                san.push(file_to_char(mv.from.file()));
            } else if !shares_rank {
                san.push(rank_to_char(mv.from.rank()));
            } else {
                san.push(file_to_char(mv.from.file()));
                san.push(rank_to_char(mv.from.rank()));
            }
        }

        if board.piece_on(mv.to).is_some() {
            san.push('x');
        }
        san.push_str(&format_square(mv.to));
    }

    if board.is_legal(mv) {
        let mut after = board.clone();
        after.play_unchecked(mv);
        if after.checkers() != BitBoard::EMPTY {
            san.push(if after.status() == GameStatus::Won {
                '#'
            } else {
                '+'
            });
        }
    }

    san
}

#[derive(Debug, thiserror::Error)]
pub enum SanError {
    #[error("No legal move found for: {0}")]
    NoLegalMove(String),
    #[error("Ambiguous move: {0}")]
    AmbiguousMove(String),
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
    #[error("Invalid square: {0}")]
    InvalidSquare(String),
    #[error("Invalid promotion: {0}")]
    InvalidPromotion(String),
}
