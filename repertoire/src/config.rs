//! Analysis tuning.
//!
//! Defaults are the long-standing values: bulk depth 14, review depth 12,
//! alternatives at depth 10, queue positions seen at least 3 times, flag drops
//! above one pawn, accept alternatives within 0.2 pawns.

use std::ops::RangeInclusive;
use std::path::Path;

use serde::{Deserialize, Serialize};

pub const UNKNOWN_OPENING: &str = "Unknown Opening";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Search depth for repertoire-wide scoring.
    pub bulk_depth: u8,
    /// Search depth for each position of a reviewed game.
    pub review_depth: u8,
    /// Search depth for each candidate reply of a flagged ply.
    pub alternative_depth: u8,
    /// Visit count a position needs before it is queued for scoring.
    pub min_repetitions: u32,
    /// Evaluation drop (pawns) a move must exceed to count as a mistake.
    pub mistake_threshold: f64,
    /// Distance (pawns) from the best evaluation still considered acceptable.
    pub acceptable_margin: f64,
    /// First eligible ply (1-based, inclusive).
    pub min_ply: u32,
    /// Last eligible ply (1-based, inclusive).
    pub max_ply: u32,
    pub unknown_opening: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            bulk_depth: 14,
            review_depth: 12,
            alternative_depth: 10,
            min_repetitions: 3,
            mistake_threshold: 1.0,
            acceptable_margin: 0.2,
            min_ply: 6,
            max_ply: 60,
            unknown_opening: UNKNOWN_OPENING.to_string(),
        }
    }
}

impl AnalysisConfig {
    pub fn ply_window(&self) -> RangeInclusive<u32> {
        self.min_ply..=self.max_ply
    }

    /// Load a JSON config; missing fields keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Pawn thresholds must be non-negative.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("mistake_threshold", self.mistake_threshold),
            ("acceptable_margin", self.acceptable_margin),
        ] {
            if value.is_nan() || value < 0.0 {
                return Err(ConfigError::OutOfRange { name, value });
            }
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{name} must be non-negative, got {value}")]
    OutOfRange { name: &'static str, value: f64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AnalysisConfig::default();
        assert_eq!(config.bulk_depth, 14);
        assert_eq!(config.review_depth, 12);
        assert_eq!(config.alternative_depth, 10);
        assert_eq!(config.min_repetitions, 3);
        assert_eq!(config.mistake_threshold, 1.0);
        assert_eq!(config.acceptable_margin, 0.2);
        assert_eq!(config.ply_window(), 6..=60);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: AnalysisConfig = serde_json::from_str(r#"{"bulk_depth": 18}"#).unwrap();
        assert_eq!(config.bulk_depth, 18);
        assert_eq!(config.review_depth, 12);
        assert_eq!(config.unknown_opening, UNKNOWN_OPENING);
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scout.json");
        std::fs::write(&path, r#"{"mistake_threshold": 1.5, "min_ply": 2}"#).unwrap();
        let config = AnalysisConfig::from_json_file(&path).unwrap();
        assert_eq!(config.mistake_threshold, 1.5);
        assert_eq!(config.ply_window(), 2..=60);

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            AnalysisConfig::from_json_file(&path),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_negative_thresholds_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scout.json");

        std::fs::write(&path, r#"{"mistake_threshold": -0.5}"#).unwrap();
        assert!(matches!(
            AnalysisConfig::from_json_file(&path),
            Err(ConfigError::OutOfRange { name: "mistake_threshold", .. })
        ));

        std::fs::write(&path, r#"{"acceptable_margin": -1}"#).unwrap();
        assert!(matches!(
            AnalysisConfig::from_json_file(&path),
            Err(ConfigError::OutOfRange { name: "acceptable_margin", .. })
        ));

        std::fs::write(&path, r#"{"mistake_threshold": 0.0}"#).unwrap();
        assert!(AnalysisConfig::from_json_file(&path).is_ok());
    }
}
