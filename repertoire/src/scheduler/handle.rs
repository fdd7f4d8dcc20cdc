use std::sync::Arc;

use chess::PositionKey;
use engine::EngineLauncher;
use tokio::sync::{mpsc, oneshot};
use tracing::Instrument;

use super::actor::SchedulerActor;
use super::{SchedulerCommand, SchedulerError, SchedulerStatus};
use crate::model::RepertoireState;

/// Cheap, cloneable handle to the scheduler actor.
#[derive(Clone)]
pub struct SchedulerHandle {
    cmd_tx: mpsc::Sender<SchedulerCommand>,
    state: RepertoireState,
}

impl std::fmt::Debug for SchedulerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerHandle")
            .field("status", &self.status())
            .finish()
    }
}

impl SchedulerHandle {
    /// Spawn the actor. It reads and writes the queue, positions, progress
    /// and status stores of `state`.
    pub fn spawn(launcher: Arc<dyn EngineLauncher>, state: RepertoireState, depth: u8) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let actor = SchedulerActor::new(launcher, state.clone(), depth);
        tokio::spawn(
            actor
                .run(cmd_rx)
                .instrument(tracing::info_span!("scheduler", depth)),
        );
        Self { cmd_tx, state }
    }

    /// Begin draining the queue. Returns the status right after the request
    /// was handled.
    pub async fn start(&self) -> Result<SchedulerStatus, SchedulerError> {
        let (tx, rx) = oneshot::channel();
        self.send(SchedulerCommand::Start { reply: tx }).await?;
        rx.await
            .map_err(|_| SchedulerError::Internal("Reply dropped".into()))
    }

    /// Terminate the engine session. The unprocessed queue is kept.
    pub async fn stop(&self) -> Result<(), SchedulerError> {
        let (tx, rx) = oneshot::channel();
        self.send(SchedulerCommand::Stop { reply: tx }).await?;
        rx.await
            .map_err(|_| SchedulerError::Internal("Reply dropped".into()))
    }

    /// Append keys to the queue. Keys with no indexed node are dropped.
    pub async fn enqueue(&self, keys: Vec<PositionKey>) -> Result<usize, SchedulerError> {
        let (tx, rx) = oneshot::channel();
        self.send(SchedulerCommand::Enqueue { keys, reply: tx })
            .await?;
        rx.await
            .map_err(|_| SchedulerError::Internal("Reply dropped".into()))
    }

    pub async fn shutdown(&self) {
        let _ = self.cmd_tx.send(SchedulerCommand::Shutdown).await;
    }

    pub fn status(&self) -> SchedulerStatus {
        self.state.scheduler_status.get()
    }

    /// Resolve once the scheduler reports `Idle`.
    pub async fn wait_idle(&self) {
        let mut rx = self.state.scheduler_status.subscribe();
        let _ = rx.wait_for(|s| *s == SchedulerStatus::Idle).await;
    }

    async fn send(&self, cmd: SchedulerCommand) -> Result<(), SchedulerError> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| SchedulerError::NotRunning)
    }
}
