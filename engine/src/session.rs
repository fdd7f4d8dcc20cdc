//! A UCI engine session: handshake, single in-flight search, shutdown.

use async_trait::async_trait;

use crate::search::{EngineEvaluation, SearchCollector};
use crate::uci::{parse_uci_message, UciMessage};
use crate::EngineCommand;

/// Line-oriented link to an engine process.
#[async_trait]
pub trait EngineTransport: Send {
    async fn send_line(&mut self, line: &str) -> Result<(), EngineError>;

    /// Next line from the engine, `None` once the engine has gone away.
    ///
    /// Must be cancellation safe: dropping the future never loses a line.
    async fn recv_line(&mut self) -> Option<String>;

    /// Ask the engine to quit and release the process.
    async fn close(&mut self);
}

/// Produces ready (handshaken) sessions.
#[async_trait]
pub trait EngineLauncher: Send + Sync + 'static {
    async fn launch(&self) -> Result<EngineSession, EngineError>;
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Engine not found")]
    NotFound,
    #[error("Failed to spawn engine: {0}")]
    Spawn(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Engine handshake failed: {0}")]
    HandshakeFailed(String),
    #[error("Engine closed")]
    Closed,
    #[error("A search is already in flight")]
    SearchInFlight,
    #[error("No search in flight")]
    NoSearchPending,
}

impl EngineError {
    /// True when the engine connection itself is gone.
    pub fn is_transport_loss(&self) -> bool {
        matches!(self, Self::Closed | Self::Io(_))
    }
}

/// One live engine. At most one search is outstanding at a time.
pub struct EngineSession {
    transport: Box<dyn EngineTransport>,
    label: String,
    engine_name: Option<String>,
    pending: Option<SearchCollector>,
}

impl std::fmt::Debug for EngineSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineSession")
            .field("label", &self.label)
            .field("engine_name", &self.engine_name)
            .field("searching", &self.pending.is_some())
            .finish()
    }
}

impl EngineSession {
    /// Run the `uci`/`isready` handshake over `transport`.
    ///
    /// Lines other than the awaited acknowledgements are ignored.
    #[tracing::instrument(level = "debug", skip(transport))]
    pub async fn start(
        transport: Box<dyn EngineTransport>,
        label: &str,
    ) -> Result<Self, EngineError> {
        let mut session = Self {
            transport,
            label: label.to_string(),
            engine_name: None,
            pending: None,
        };

        session.send(EngineCommand::Uci).await?;
        session.await_ack(UciMessage::UciOk).await?;
        session.send(EngineCommand::IsReady).await?;
        session.await_ack(UciMessage::ReadyOk).await?;

        tracing::info!(
            label = %session.label,
            engine = session.engine_name.as_deref().unwrap_or("unknown"),
            "Engine ready"
        );
        Ok(session)
    }

    async fn await_ack(&mut self, expected: UciMessage) -> Result<(), EngineError> {
        loop {
            let Some(line) = self.transport.recv_line().await else {
                return Err(EngineError::HandshakeFailed(format!(
                    "engine closed before {:?}",
                    expected
                )));
            };
            tracing::trace!("UCI << {}", line);
            match parse_uci_message(&line) {
                Ok(msg) if msg == expected => return Ok(()),
                Ok(UciMessage::Id { name, value }) if name == "name" => {
                    self.engine_name = Some(value);
                }
                _ => {}
            }
        }
    }

    async fn send(&mut self, cmd: EngineCommand) -> Result<(), EngineError> {
        let line = cmd.to_uci();
        tracing::trace!("UCI >> {}", line);
        self.transport.send_line(&line).await
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Name the engine reported during the handshake.
    pub fn engine_name(&self) -> Option<&str> {
        self.engine_name.as_deref()
    }

    pub fn is_searching(&self) -> bool {
        self.pending.is_some()
    }

    /// Send an engine option. Only valid while idle.
    pub async fn set_option(&mut self, name: &str, value: Option<String>) -> Result<(), EngineError> {
        if self.pending.is_some() {
            return Err(EngineError::SearchInFlight);
        }
        self.send(EngineCommand::SetOption {
            name: name.to_string(),
            value,
        })
        .await
    }

    /// Start a fixed-depth search of `fen`.
    pub async fn begin_search(&mut self, fen: &str, depth: u8) -> Result<(), EngineError> {
        if self.pending.is_some() {
            return Err(EngineError::SearchInFlight);
        }
        tracing::debug!(label = %self.label, depth, "Starting search: {}", fen);
        self.send(EngineCommand::SetPosition {
            fen: fen.to_string(),
        })
        .await?;
        self.send(EngineCommand::GoDepth(depth)).await?;
        self.pending = Some(SearchCollector::new(depth));
        Ok(())
    }

    /// Wait for the in-flight search to finish.
    ///
    /// Cancellation safe: the partial search state lives in the session, so
    /// dropping this future and calling it again resumes where it left off.
    pub async fn next_result(&mut self) -> Result<EngineEvaluation, EngineError> {
        if self.pending.is_none() {
            return Err(EngineError::NoSearchPending);
        }
        loop {
            let Some(line) = self.transport.recv_line().await else {
                self.pending = None;
                tracing::warn!(label = %self.label, "Engine closed mid-search");
                return Err(EngineError::Closed);
            };
            tracing::trace!("UCI << {}", line);
            let Ok(msg) = parse_uci_message(&line) else {
                continue;
            };
            let Some(collector) = self.pending.as_mut() else {
                return Err(EngineError::NoSearchPending);
            };
            if let Some(eval) = collector.feed(&msg) {
                self.pending = None;
                tracing::debug!(
                    label = %self.label,
                    score = eval.score,
                    best_move = eval.best_move.as_deref().unwrap_or("(none)"),
                    "Search finished"
                );
                return Ok(eval);
            }
        }
    }

    /// Evaluate `fen` to `depth` and wait for the result.
    pub async fn evaluate(&mut self, fen: &str, depth: u8) -> Result<EngineEvaluation, EngineError> {
        self.begin_search(fen, depth).await?;
        self.next_result().await
    }

    /// Quit the engine. Any in-flight search is abandoned.
    pub async fn shutdown(mut self) {
        tracing::info!(label = %self.label, "Shutting down engine");
        self.pending = None;
        self.transport.close().await;
    }
}
