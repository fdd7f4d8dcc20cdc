//! Bulk analysis: drains the position queue through one engine session.

mod actor;
mod handle;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use chess::PositionKey;

pub use handle::SchedulerHandle;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulerStatus {
    #[default]
    Idle,
    /// Start requested; the engine is still launching.
    AwaitingHandshake,
    Draining,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    #[error("Scheduler is not running")]
    NotRunning,
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Commands sent to the scheduler actor. Each embeds a oneshot for the reply.
pub(crate) enum SchedulerCommand {
    Start {
        reply: oneshot::Sender<SchedulerStatus>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
    Enqueue {
        keys: Vec<PositionKey>,
        reply: oneshot::Sender<usize>,
    },
    Shutdown,
}
