//! A full repertoire scan: fetch, index, queue, analyze.

use std::collections::VecDeque;
use std::sync::Arc;

use chess::{MoveReplayer, PositionKey};

use crate::config::AnalysisConfig;
use crate::indexer::{index_into, IndexReport};
use crate::ingest::{FetchOptions, GameSource, IngestError};
use crate::model::{PositionMap, RepertoireState};
use crate::scheduler::{SchedulerError, SchedulerHandle, SchedulerStatus};

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("Failed to fetch games: {0}")]
    Ingest(#[from] IngestError),
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSummary {
    pub games: usize,
    pub index: IndexReport,
    pub positions: usize,
    pub queued: usize,
    pub status: SchedulerStatus,
}

/// Positions visited at least `min_repetitions` times, in indexing order.
pub fn select_candidates(positions: &PositionMap, min_repetitions: u32) -> Vec<PositionKey> {
    positions
        .values()
        .filter(|node| node.visit_count >= min_repetitions)
        .map(|node| node.key.clone())
        .collect()
}

pub struct Scanner {
    source: Arc<dyn GameSource>,
    replayer: Arc<dyn MoveReplayer>,
    scheduler: SchedulerHandle,
    state: RepertoireState,
    config: AnalysisConfig,
}

impl Scanner {
    pub fn new(
        source: Arc<dyn GameSource>,
        replayer: Arc<dyn MoveReplayer>,
        scheduler: SchedulerHandle,
        state: RepertoireState,
        config: AnalysisConfig,
    ) -> Self {
        Self {
            source,
            replayer,
            scheduler,
            state,
            config,
        }
    }

    pub fn scheduler(&self) -> &SchedulerHandle {
        &self.scheduler
    }

    pub fn state(&self) -> &RepertoireState {
        &self.state
    }

    /// Rebuild the model from the subject's games and start bulk analysis.
    ///
    /// Returns once the scheduler has been started; analysis continues in
    /// the background.
    #[tracing::instrument(level = "info", skip(self, options), fields(user = %options.username))]
    pub async fn scan(&self, options: &FetchOptions) -> Result<ScanSummary, ScanError> {
        self.scheduler.stop().await?;
        self.state.reset();
        self.state.is_scanning.set(true);

        let result = self.run(options).await;
        self.state.is_scanning.set(false);
        result
    }

    async fn run(&self, options: &FetchOptions) -> Result<ScanSummary, ScanError> {
        let progress = self.state.progress.clone();
        let on_fetch = move |fetched: usize| progress.update(|p| p.fetched = fetched);
        let games = self.source.fetch_games(options, &on_fetch).await?;
        self.state.progress.update(|p| {
            p.fetched = games.len();
            p.total = games.len();
        });

        let index = index_into(&games, self.replayer.as_ref(), &self.config, &self.state);
        self.state.games.set(games);

        let candidates = self
            .state
            .positions
            .read(|positions| select_candidates(positions, self.config.min_repetitions));
        let queued = candidates.len();
        self.state.progress.update(|p| p.analyze_total = queued);
        self.state.queue.set(VecDeque::from(candidates));
        tracing::info!(queued, "Queued recurring positions for analysis");

        let status = self.scheduler.start().await?;

        Ok(ScanSummary {
            games: self.state.games.read(|g| g.len()),
            index,
            positions: self.state.positions.read(|p| p.len()),
            queued,
            status,
        })
    }
}
