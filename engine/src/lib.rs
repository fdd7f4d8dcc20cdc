pub mod search;
pub mod session;
pub mod stockfish;
pub mod uci;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use search::{EngineEvaluation, SearchCollector, SearchPhase};
pub use session::{EngineError, EngineLauncher, EngineSession, EngineTransport};
pub use stockfish::{EngineConfig, ProcessTransport, StockfishLauncher};
pub use uci::{parse_uci_message, UciError, UciMessage};

/// Commands sent to the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCommand {
    Uci,
    IsReady,
    SetPosition { fen: String },
    SetOption { name: String, value: Option<String> },
    /// `go depth <n>`; searches always run to a fixed depth.
    GoDepth(u8),
    Quit,
}

impl EngineCommand {
    /// Render the command as a single UCI line (without the trailing newline).
    pub fn to_uci(&self) -> String {
        match self {
            Self::Uci => "uci".to_string(),
            Self::IsReady => "isready".to_string(),
            Self::SetPosition { fen } => format!("position fen {}", fen),
            Self::SetOption { name, value } => match value {
                Some(val) => format!("setoption name {} value {}", name, val),
                None => format!("setoption name {}", name),
            },
            Self::GoDepth(depth) => format!("go depth {}", depth),
            Self::Quit => "quit".to_string(),
        }
    }
}

/// Engine analysis information carried by an `info` line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineInfo {
    pub depth: Option<u8>,
    pub seldepth: Option<u8>,
    pub time_ms: Option<u64>,
    pub nodes: Option<u64>,
    pub score: Option<chess::AnalysisScore>,
    /// Principal variation as coordinate moves.
    pub pv: Vec<String>,
    pub multipv: Option<u8>,
    pub nps: Option<u64>,
}
