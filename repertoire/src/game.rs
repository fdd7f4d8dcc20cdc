use chess::PlayerSide;
use serde::{Deserialize, Serialize};

/// Declared result of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameResult {
    #[serde(rename = "1-0")]
    WhiteWins,
    #[serde(rename = "0-1")]
    BlackWins,
    #[serde(rename = "1/2-1/2")]
    Draw,
    #[serde(rename = "*")]
    Unfinished,
}

/// A game's result from one player's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Win,
    Loss,
    Draw,
}

impl GameResult {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WhiteWins => "1-0",
            Self::BlackWins => "0-1",
            Self::Draw => "1/2-1/2",
            Self::Unfinished => "*",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "1-0" => Some(Self::WhiteWins),
            "0-1" => Some(Self::BlackWins),
            "1/2-1/2" => Some(Self::Draw),
            "*" => Some(Self::Unfinished),
            _ => None,
        }
    }

    /// Outcome for `side`. Unfinished games count as draws.
    pub fn outcome_for(self, side: PlayerSide) -> Outcome {
        match (self, side) {
            (Self::WhiteWins, PlayerSide::White) | (Self::BlackWins, PlayerSide::Black) => {
                Outcome::Win
            }
            (Self::WhiteWins, PlayerSide::Black) | (Self::BlackWins, PlayerSide::White) => {
                Outcome::Loss
            }
            (Self::Draw | Self::Unfinished, _) => Outcome::Draw,
        }
    }
}

impl std::fmt::Display for GameResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameMetadata {
    pub opening: Option<String>,
    pub ply_count: u32,
    /// Time-control class ("blitz", "rapid", ...).
    pub speed: Option<String>,
    /// How the game ended ("mate", "resign", "outoftime", ...).
    pub status: Option<String>,
    pub duration_secs: Option<u64>,
    pub white_rating: Option<u32>,
    pub black_rating: Option<u32>,
    /// Creation time in milliseconds since the Unix epoch.
    pub created_at: Option<i64>,
    pub url: Option<String>,
}

/// One finished game played by the subject. Read-only once ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub id: String,
    pub pgn: String,
    pub white: String,
    pub black: String,
    pub player_color: PlayerSide,
    pub result: GameResult,
    #[serde(default)]
    pub metadata: GameMetadata,
}

impl Game {
    pub fn outcome(&self) -> Outcome {
        self.result.outcome_for(self.player_color)
    }

    pub fn opponent(&self) -> &str {
        match self.player_color {
            PlayerSide::White => &self.black,
            PlayerSide::Black => &self.white,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_for_each_side() {
        assert_eq!(GameResult::WhiteWins.outcome_for(PlayerSide::White), Outcome::Win);
        assert_eq!(GameResult::WhiteWins.outcome_for(PlayerSide::Black), Outcome::Loss);
        assert_eq!(GameResult::BlackWins.outcome_for(PlayerSide::Black), Outcome::Win);
        assert_eq!(GameResult::Draw.outcome_for(PlayerSide::White), Outcome::Draw);
        assert_eq!(GameResult::Unfinished.outcome_for(PlayerSide::Black), Outcome::Draw);
    }

    #[test]
    fn test_result_tokens() {
        for result in [
            GameResult::WhiteWins,
            GameResult::BlackWins,
            GameResult::Draw,
            GameResult::Unfinished,
        ] {
            assert_eq!(GameResult::parse(result.as_str()), Some(result));
        }
        assert_eq!(GameResult::parse("2-0"), None);
        assert_eq!(serde_json::to_string(&GameResult::Draw).unwrap(), "\"1/2-1/2\"");
    }

    #[test]
    fn test_opponent() {
        let game = Game {
            id: "g1".into(),
            pgn: String::new(),
            white: "alice".into(),
            black: "bob".into(),
            player_color: PlayerSide::Black,
            result: GameResult::BlackWins,
            metadata: GameMetadata::default(),
        };
        assert_eq!(game.opponent(), "alice");
        assert_eq!(game.outcome(), Outcome::Win);
    }
}
