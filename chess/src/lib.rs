pub mod analysis;
pub mod converters;
pub mod fen;
pub mod pgn;
pub mod replay;
pub mod types;
pub mod uci;

pub use analysis::{AnalysisScore, MATE_SCORE_PAWNS};
pub use converters::*;
pub use fen::{format_fen, parse_fen, FenError, PositionKey};
pub use pgn::{format_move_as_san, parse_pgn, parse_san, PgnError, PgnGame, PgnResult, SanError};
pub use replay::{
    legal_moves, uci_to_san, AppliedMove, CozyReplayer, MoveReplayer, Ply,
    ReplayError, ReplayedGame,
};
pub use types::PlayerSide;
pub use uci::{
    convert_uci_castling_to_cozy, format_standard_uci, format_uci_move, parse_uci_move,
    UciMoveError,
};
