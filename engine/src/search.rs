//! Folding an engine's output stream into a single evaluation.

use chess::AnalysisScore;

use crate::UciMessage;

/// Outcome of one fixed-depth search.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineEvaluation {
    /// Score in pawns from the side to move's perspective. 0.0 when the
    /// engine never reported one.
    pub score: f64,
    /// Last score seen on an `info` line.
    pub raw: Option<AnalysisScore>,
    /// Coordinate move, `None` for `bestmove (none)`.
    pub best_move: Option<String>,
    pub depth: u8,
    pub pv: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPhase {
    /// No score line seen yet.
    AwaitingScore,
    /// A score is held; waiting for `bestmove`.
    AwaitingTerminal,
}

/// Reducer over the lines of a single search.
///
/// Feed every parsed message; the terminal `bestmove` yields the result.
#[derive(Debug, Clone)]
pub struct SearchCollector {
    requested_depth: u8,
    phase: SearchPhase,
    score: Option<AnalysisScore>,
    depth: Option<u8>,
    pv: Vec<String>,
}

impl SearchCollector {
    pub fn new(requested_depth: u8) -> Self {
        Self {
            requested_depth,
            phase: SearchPhase::AwaitingScore,
            score: None,
            depth: None,
            pv: Vec::new(),
        }
    }

    pub fn phase(&self) -> SearchPhase {
        self.phase
    }

    /// Returns the finished evaluation once the terminal line arrives.
    pub fn feed(&mut self, msg: &UciMessage) -> Option<EngineEvaluation> {
        match msg {
            UciMessage::Info(info) => {
                if let Some(score) = info.score {
                    self.score = Some(score);
                    self.phase = SearchPhase::AwaitingTerminal;
                    if info.depth.is_some() {
                        self.depth = info.depth;
                    }
                    if !info.pv.is_empty() {
                        self.pv = info.pv.clone();
                    }
                }
                None
            }
            UciMessage::BestMove { mv, .. } => Some(EngineEvaluation {
                score: self.score.map(|s| s.to_pawns()).unwrap_or(0.0),
                raw: self.score,
                best_move: mv.clone(),
                depth: self.depth.unwrap_or(self.requested_depth),
                pv: std::mem::take(&mut self.pv),
            }),
            _ => None,
        }
    }
}
