//! Move-quality review: find the moves of one game that dropped the
//! evaluation, and which replies would have held it.

use std::sync::Arc;

use chess::{uci_to_san, MoveReplayer, PlayerSide, Ply, ReplayError};
use engine::{EngineError, EngineEvaluation, EngineLauncher, EngineSession};
use serde::{Deserialize, Serialize};

use crate::config::AnalysisConfig;
use crate::game::Game;
use crate::store::Store;

/// One flagged ply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mistake {
    /// Position before the move.
    pub fen: String,
    pub move_number: u32,
    pub user_move: String,
    /// Origin and destination squares of the played move ("g1f3").
    pub user_move_uci: String,
    pub best_move: Option<String>,
    /// `best_move` in SAN, or the coordinate form when it does not translate.
    pub best_move_san: Option<String>,
    /// Coordinate moves that stay within the acceptable margin of best.
    pub acceptable_moves: Vec<String>,
    /// Pawns, subject's perspective.
    pub eval_before: f64,
    /// Pawns, subject's perspective.
    pub eval_after: f64,
    pub eval_drop: f64,
    pub player_color: PlayerSide,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewProgress {
    pub current: usize,
    pub total: usize,
}

/// Observable review output.
#[derive(Debug, Clone, Default)]
pub struct ReviewState {
    pub mistakes: Store<Vec<Mistake>>,
    pub progress: Store<ReviewProgress>,
    pub is_reviewing: Store<bool>,
}

#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error("Game does not replay: {0}")]
    Replay(#[from] ReplayError),
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
}

/// A drop counts only when it strictly exceeds the threshold.
pub fn is_mistake(drop: f64, threshold: f64) -> bool {
    drop > threshold
}

/// A candidate is acceptable when it is at most `margin` worse than best.
pub fn is_acceptable(best: f64, candidate: f64, margin: f64) -> bool {
    best - candidate <= margin
}

/// Filter `(move, evaluation)` pairs down to the acceptable moves, in order.
pub fn acceptable_moves<'a>(
    best: f64,
    candidates: impl IntoIterator<Item = (&'a str, f64)>,
    margin: f64,
) -> Vec<String> {
    candidates
        .into_iter()
        .filter(|(_, eval)| is_acceptable(best, *eval, margin))
        .map(|(mv, _)| mv.to_string())
        .collect()
}

/// Reviews games one at a time, each with a private engine session.
pub struct ReviewPipeline {
    launcher: Arc<dyn EngineLauncher>,
    replayer: Arc<dyn MoveReplayer>,
    config: AnalysisConfig,
    state: ReviewState,
}

impl ReviewPipeline {
    pub fn new(
        launcher: Arc<dyn EngineLauncher>,
        replayer: Arc<dyn MoveReplayer>,
        config: AnalysisConfig,
        state: ReviewState,
    ) -> Self {
        Self {
            launcher,
            replayer,
            config,
            state,
        }
    }

    pub fn state(&self) -> &ReviewState {
        &self.state
    }

    /// Review `game` and publish its mistakes.
    ///
    /// The previous mistake list is cleared up front. When the game does not
    /// replay or no engine can be started it stays empty.
    #[tracing::instrument(level = "info", skip(self, game), fields(game_id = %game.id))]
    pub async fn review_game(&self, game: &Game) -> Result<Vec<Mistake>, ReviewError> {
        self.state.is_reviewing.set(true);
        self.state.mistakes.set(Vec::new());
        let result = self.run(game).await;
        self.state.is_reviewing.set(false);

        match &result {
            Ok(mistakes) => {
                tracing::info!(mistakes = mistakes.len(), "Review complete");
                self.state.mistakes.set(mistakes.clone());
            }
            Err(e) => tracing::error!("Review aborted: {}", e),
        }
        result
    }

    async fn run(&self, game: &Game) -> Result<Vec<Mistake>, ReviewError> {
        let replayed = self.replayer.replay(&game.pgn)?;
        let plies = replayed.plies;
        let total = plies.len();
        self.state.progress.set(ReviewProgress { current: 0, total });

        let mut session = self.launcher.launch().await?;
        let result = self.judge(game, &plies, &mut session).await;
        session.shutdown().await;
        result
    }

    async fn judge(
        &self,
        game: &Game,
        plies: &[Ply],
        session: &mut EngineSession,
    ) -> Result<Vec<Mistake>, ReviewError> {
        let total = plies.len();
        let mut evals: Vec<Option<EngineEvaluation>> = Vec::with_capacity(total);
        for (i, ply) in plies.iter().enumerate() {
            let eval = self
                .evaluate(session, &ply.fen_before, self.config.review_depth)
                .await?;
            if eval.is_none() {
                tracing::warn!(ply = ply.number, "Scoring position as 0.0");
            }
            evals.push(eval);
            self.state.progress.set(ReviewProgress {
                current: i + 1,
                total,
            });
        }

        let score = |i: usize| evals[i].as_ref().map_or(0.0, |e| e.score);

        let mut mistakes = Vec::new();
        for (i, ply) in plies.iter().enumerate() {
            // The final move has no position after it to judge by.
            if i + 1 >= plies.len() || ply.side_to_move != game.player_color {
                continue;
            }
            let eval_before = score(i);
            let eval_after = -score(i + 1);
            let drop = eval_before - eval_after;
            if !is_mistake(drop, self.config.mistake_threshold) {
                continue;
            }

            let best_move = evals[i].as_ref().and_then(|e| e.best_move.clone());
            let best_move_san = best_move.as_deref().map(|uci| uci_to_san(&ply.fen_before, uci));
            tracing::debug!(
                ply = ply.number,
                san = %ply.san,
                drop,
                "Mistake found"
            );

            let acceptable = self
                .acceptable_alternatives(session, &ply.fen_before, eval_before)
                .await?;

            mistakes.push(Mistake {
                fen: ply.fen_before.clone(),
                move_number: ply.move_number(),
                user_move: ply.san.clone(),
                user_move_uci: format!("{}{}", ply.from_square(), ply.to_square()),
                best_move,
                best_move_san,
                acceptable_moves: acceptable,
                eval_before,
                eval_after,
                eval_drop: drop,
                player_color: game.player_color,
            });
        }

        Ok(mistakes)
    }

    /// Evaluate one position. A failed evaluation yields `None`; if it took
    /// the engine down, a fresh session replaces it first. Only a failed
    /// relaunch is an error.
    async fn evaluate(
        &self,
        session: &mut EngineSession,
        fen: &str,
        depth: u8,
    ) -> Result<Option<EngineEvaluation>, EngineError> {
        match session.evaluate(fen, depth).await {
            Ok(eval) => Ok(Some(eval)),
            Err(e) if e.is_transport_loss() => {
                tracing::warn!("Engine lost, relaunching: {}", e);
                let fresh = self.launcher.launch().await?;
                let dead = std::mem::replace(session, fresh);
                dead.shutdown().await;
                Ok(None)
            }
            Err(e) => {
                tracing::warn!("Evaluation failed: {}", e);
                Ok(None)
            }
        }
    }

    /// Legal moves from `fen` whose resulting position stays within the
    /// acceptable margin of `best`. A candidate whose evaluation fails is
    /// left out.
    async fn acceptable_alternatives(
        &self,
        session: &mut EngineSession,
        fen: &str,
        best: f64,
    ) -> Result<Vec<String>, EngineError> {
        let moves = match self.replayer.legal_moves(fen) {
            Ok(moves) => moves,
            Err(e) => {
                tracing::warn!("Could not list legal moves: {}", e);
                return Ok(Vec::new());
            }
        };

        let mut candidates = Vec::with_capacity(moves.len());
        for uci in &moves {
            let applied = match self.replayer.apply(fen, uci) {
                Ok(applied) => applied,
                Err(e) => {
                    tracing::warn!(mv = %uci, "Could not apply candidate: {}", e);
                    continue;
                }
            };
            match self
                .evaluate(session, &applied.fen_after, self.config.alternative_depth)
                .await?
            {
                Some(eval) => candidates.push((uci.as_str(), -eval.score)),
                None => tracing::warn!(mv = %uci, "Leaving out candidate"),
            }
        }

        Ok(acceptable_moves(
            best,
            candidates,
            self.config.acceptable_margin,
        ))
    }
}
