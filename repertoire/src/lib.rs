//! Repertoire scouting: index a player's games, score their recurring
//! positions and find the moves that cost them.

pub mod config;
pub mod game;
pub mod indexer;
pub mod ingest;
pub mod model;
pub mod review;
pub mod scan;
pub mod scheduler;
pub mod store;

pub use config::AnalysisConfig;
pub use game::{Game, GameMetadata, GameResult, Outcome};
pub use indexer::{index_game, index_games, index_into, IndexReport, SkippedGame};
pub use ingest::{FetchOptions, GameSource, IngestError, NdjsonGameSource};
pub use model::{
    OpeningMap, OpeningStats, OutcomeTally, PositionEvaluation, PositionMap, PositionNode,
    RepertoireState, ScanProgress,
};
pub use review::{
    acceptable_moves, is_acceptable, is_mistake, Mistake, ReviewError, ReviewPipeline,
    ReviewProgress, ReviewState,
};
pub use scan::{select_candidates, ScanError, ScanSummary, Scanner};
pub use scheduler::{SchedulerError, SchedulerHandle, SchedulerStatus};
pub use store::Store;
