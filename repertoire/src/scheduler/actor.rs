use std::sync::Arc;

use chess::PositionKey;
use engine::{EngineError, EngineEvaluation, EngineLauncher, EngineSession};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};

use super::{SchedulerCommand, SchedulerStatus};
use crate::model::{PositionEvaluation, RepertoireState};

type LaunchResult = Result<Result<EngineSession, EngineError>, JoinError>;

/// Owns the engine session and drives the queue one position at a time.
pub(super) struct SchedulerActor {
    launcher: Arc<dyn EngineLauncher>,
    state: RepertoireState,
    depth: u8,
    status: SchedulerStatus,
    session: Option<EngineSession>,
    launch: Option<JoinHandle<Result<EngineSession, EngineError>>>,
    in_flight: Option<PositionKey>,
}

impl SchedulerActor {
    pub(super) fn new(launcher: Arc<dyn EngineLauncher>, state: RepertoireState, depth: u8) -> Self {
        state.scheduler_status.set(SchedulerStatus::Idle);
        Self {
            launcher,
            state,
            depth,
            status: SchedulerStatus::Idle,
            session: None,
            launch: None,
            in_flight: None,
        }
    }

    pub(super) async fn run(mut self, mut cmd_rx: mpsc::Receiver<SchedulerCommand>) {
        tracing::info!("Scheduler actor started");

        loop {
            tokio::select! {
                biased;

                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(SchedulerCommand::Shutdown) | None => {
                            tracing::info!("Scheduler actor shutting down");
                            self.stop().await;
                            break;
                        }
                        Some(cmd) => self.handle_command(cmd).await,
                    }
                }

                launched = wait_for_launch(&mut self.launch) => {
                    self.launch = None;
                    self.on_launched(launched).await;
                }

                result = next_evaluation(&mut self.session) => {
                    self.on_result(result).await;
                }
            }
        }

        tracing::info!("Scheduler actor exited");
    }

    async fn handle_command(&mut self, cmd: SchedulerCommand) {
        match cmd {
            SchedulerCommand::Start { reply } => {
                self.start().await;
                let _ = reply.send(self.status);
            }
            SchedulerCommand::Stop { reply } => {
                self.stop().await;
                let _ = reply.send(());
            }
            SchedulerCommand::Enqueue { keys, reply } => {
                let _ = reply.send(self.enqueue(keys));
            }
            SchedulerCommand::Shutdown => {}
        }
    }

    async fn start(&mut self) {
        if self.status != SchedulerStatus::Idle {
            tracing::debug!(status = ?self.status, "Start ignored, already running");
            return;
        }
        if self.state.queue.read(|q| q.is_empty()) {
            tracing::info!("Queue empty, nothing to analyze");
            self.set_status(SchedulerStatus::Idle);
            return;
        }
        if self.session.is_some() {
            self.advance().await;
            return;
        }

        tracing::info!("Launching engine for bulk analysis");
        self.spawn_launch();
    }

    fn spawn_launch(&mut self) {
        let launcher = self.launcher.clone();
        self.launch = Some(tokio::spawn(async move { launcher.launch().await }));
        self.set_status(SchedulerStatus::AwaitingHandshake);
    }

    async fn stop(&mut self) {
        if let Some(launch) = self.launch.take() {
            tracing::info!("Aborting pending engine launch");
            launch.abort();
        }
        if let Some(key) = self.in_flight.take() {
            tracing::debug!(key = %key, "Abandoning in-flight position");
        }
        if let Some(session) = self.session.take() {
            session.shutdown().await;
        }
        self.set_status(SchedulerStatus::Idle);
    }

    fn enqueue(&mut self, keys: Vec<PositionKey>) -> usize {
        let known: Vec<PositionKey> = self.state.positions.read(|positions| {
            keys.into_iter()
                .filter(|key| {
                    let found = positions.contains_key(key);
                    if !found {
                        tracing::warn!(key = %key, "Refusing to queue unindexed position");
                    }
                    found
                })
                .collect()
        });
        let added = known.len();
        self.state.queue.update(|queue| queue.extend(known));
        added
    }

    async fn on_launched(&mut self, launched: LaunchResult) {
        match launched {
            Ok(Ok(session)) => {
                tracing::info!(label = session.label(), "Engine ready, draining queue");
                self.session = Some(session);
                self.advance().await;
            }
            Ok(Err(e)) => {
                tracing::error!("Engine launch failed: {}", e);
                self.set_status(SchedulerStatus::Idle);
            }
            Err(e) => {
                tracing::error!("Engine launch task failed: {}", e);
                self.set_status(SchedulerStatus::Idle);
            }
        }
    }

    async fn on_result(&mut self, result: Result<EngineEvaluation, EngineError>) {
        let Some(key) = self.in_flight.take() else {
            return;
        };
        match result {
            Ok(eval) => {
                tracing::debug!(key = %key, score = eval.score, "Position analyzed");
                let evaluation = PositionEvaluation::from(eval);
                self.state.positions.update(|positions| {
                    if let Some(node) = positions.get_mut(&key) {
                        node.evaluation = Some(evaluation);
                    }
                });
                self.state.progress.update(|p| p.analyzed += 1);
                self.advance().await;
            }
            Err(e) if e.is_transport_loss() => {
                tracing::warn!(key = %key, "Engine lost mid-analysis, skipping position: {}", e);
                self.relaunch().await;
            }
            Err(e) => {
                tracing::warn!(key = %key, "Analysis failed, skipping position: {}", e);
                self.advance().await;
            }
        }
    }

    /// Submit the next queued position, or go idle when there is none.
    async fn advance(&mut self) {
        loop {
            let Some(session) = self.session.as_mut() else {
                self.set_status(SchedulerStatus::Idle);
                return;
            };

            let mut next = None;
            self.state.queue.update(|queue| next = queue.pop_front());
            let Some(key) = next else {
                tracing::info!("Queue drained");
                self.set_status(SchedulerStatus::Idle);
                return;
            };

            let fen = self
                .state
                .positions
                .read(|positions| positions.get(&key).map(|node| node.fen.clone()));
            let Some(fen) = fen else {
                tracing::warn!(key = %key, "Queued position missing from the model, skipping");
                continue;
            };

            match session.begin_search(&fen, self.depth).await {
                Ok(()) => {
                    self.in_flight = Some(key);
                    self.set_status(SchedulerStatus::Draining);
                    return;
                }
                Err(e) if e.is_transport_loss() => {
                    tracing::warn!(key = %key, "Engine lost, skipping position: {}", e);
                    self.relaunch().await;
                    return;
                }
                Err(e) => {
                    tracing::warn!(key = %key, "Could not submit position, skipping: {}", e);
                }
            }
        }
    }

    /// Replace a lost engine and carry on with the rest of the queue.
    async fn relaunch(&mut self) {
        self.in_flight = None;
        if let Some(session) = self.session.take() {
            session.shutdown().await;
        }
        if self.state.queue.read(|q| q.is_empty()) {
            tracing::info!("Queue drained");
            self.set_status(SchedulerStatus::Idle);
            return;
        }
        tracing::info!("Relaunching engine");
        self.spawn_launch();
    }

    fn set_status(&mut self, status: SchedulerStatus) {
        if self.status != status {
            tracing::debug!(from = ?self.status, to = ?status, "Scheduler status");
        }
        self.status = status;
        self.state.scheduler_status.set(status);
    }
}

async fn wait_for_launch(
    launch: &mut Option<JoinHandle<Result<EngineSession, EngineError>>>,
) -> LaunchResult {
    match launch {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

async fn next_evaluation(
    session: &mut Option<EngineSession>,
) -> Result<EngineEvaluation, EngineError> {
    match session {
        Some(session) if session.is_searching() => session.next_result().await,
        _ => std::future::pending().await,
    }
}
