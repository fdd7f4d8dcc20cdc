//! Engine score types shared by the indexer, the scheduler and the review pipeline.

use serde::{Deserialize, Serialize};

/// Magnitude a forced mate collapses to when expressed in pawns.
///
/// A mate score compares equal to a finite +/-100.00 evaluation. That is the
/// intended saturation, not a sentinel.
pub const MATE_SCORE_PAWNS: f64 = 100.0;

/// Engine evaluation score as reported on an `info` line.
///
/// Centipawns: positive = side-to-move is better.
/// Mate: positive N = side-to-move mates in N moves,
/// zero or negative N = side-to-move gets mated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisScore {
    Centipawns(i32),
    Mate(i32),
}

impl AnalysisScore {
    pub fn display(&self) -> String {
        match self {
            Self::Centipawns(cp) => format!("{:+.2}", *cp as f64 / 100.0),
            Self::Mate(m) => {
                if *m > 0 {
                    format!("+M{}", m)
                } else {
                    format!("-M{}", m.abs())
                }
            }
        }
    }

    /// Score in fractional pawns. Mate scores saturate to +/-[`MATE_SCORE_PAWNS`].
    pub fn to_pawns(&self) -> f64 {
        match self {
            Self::Centipawns(cp) => *cp as f64 / 100.0,
            Self::Mate(m) if *m > 0 => MATE_SCORE_PAWNS,
            Self::Mate(_) => -MATE_SCORE_PAWNS,
        }
    }

}

impl std::fmt::Display for AnalysisScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centipawns_to_pawns() {
        assert_eq!(AnalysisScore::Centipawns(35).to_pawns(), 0.35);
        assert_eq!(AnalysisScore::Centipawns(-120).to_pawns(), -1.2);
    }

    #[test]
    fn test_mate_saturates_with_sign() {
        assert_eq!(AnalysisScore::Mate(3).to_pawns(), 100.0);
        assert_eq!(AnalysisScore::Mate(-2).to_pawns(), -100.0);
        // Side to move is already mated.
        assert_eq!(AnalysisScore::Mate(0).to_pawns(), -100.0);
    }

    #[test]
    fn test_display() {
        assert_eq!(AnalysisScore::Centipawns(150).to_string(), "+1.50");
        assert_eq!(AnalysisScore::Mate(-3).to_string(), "-M3");
    }
}
