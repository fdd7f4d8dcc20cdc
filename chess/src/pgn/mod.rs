mod parser;
mod san;

pub use parser::{parse_pgn, PgnError, PgnGame, PgnResult};
pub use san::{format_move_as_san, parse_san, SanError};
