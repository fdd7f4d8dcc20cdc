//! Scripted in-memory engine for tests.
//!
//! Available under `cfg(test)` and the `mock` feature so downstream crates
//! can drive an [`EngineSession`] without a real binary.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chess::{AnalysisScore, PositionKey};

use crate::session::{EngineError, EngineLauncher, EngineSession, EngineTransport};

/// What the scripted engine answers for a position.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedReply {
    /// One `info` line with `score`, then `bestmove`.
    Score {
        score: AnalysisScore,
        best_move: Option<String>,
    },
    /// Only a `bestmove` line.
    NoScore { best_move: Option<String> },
    /// Never answer the search.
    Stall,
    /// Drop the connection instead of answering.
    Close,
}

impl ScriptedReply {
    pub fn cp(cp: i32, best_move: &str) -> Self {
        Self::Score {
            score: AnalysisScore::Centipawns(cp),
            best_move: Some(best_move.to_string()),
        }
    }

    pub fn mate(moves: i32, best_move: &str) -> Self {
        Self::Score {
            score: AnalysisScore::Mate(moves),
            best_move: Some(best_move.to_string()),
        }
    }
}

/// Shared record of what scripted engines were asked to do.
#[derive(Debug, Default)]
pub struct EngineLog {
    launches: AtomicUsize,
    sent: Mutex<Vec<String>>,
}

impl EngineLog {
    pub fn launch_count(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    /// Every line sent to any scripted engine, in order.
    pub fn sent_lines(&self) -> Vec<String> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// FENs of every `position fen` command, in order.
    pub fn searched_fens(&self) -> Vec<String> {
        self.sent_lines()
            .iter()
            .filter_map(|l| l.strip_prefix("position fen ").map(str::to_string))
            .collect()
    }

    pub fn search_count(&self) -> usize {
        self.sent_lines().iter().filter(|l| l.starts_with("go")).count()
    }

    fn record(&self, line: &str) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(line.to_string());
        }
    }
}

/// Script for a family of scripted engines.
#[derive(Debug, Clone)]
pub struct ScriptedEngine {
    replies: HashMap<PositionKey, ScriptedReply>,
    default_reply: ScriptedReply,
    fail_handshake: bool,
    stall_handshake: bool,
    log: Arc<EngineLog>,
}

impl Default for ScriptedEngine {
    fn default() -> Self {
        Self {
            replies: HashMap::new(),
            default_reply: ScriptedReply::Score {
                score: AnalysisScore::Centipawns(0),
                best_move: None,
            },
            fail_handshake: false,
            stall_handshake: false,
            log: Arc::new(EngineLog::default()),
        }
    }
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer searches of `fen` (matched by position key) with `reply`.
    pub fn with_reply(mut self, fen: &str, reply: ScriptedReply) -> Self {
        if let Ok(key) = PositionKey::from_fen(fen) {
            self.replies.insert(key, reply);
        }
        self
    }

    /// Answer for positions without an explicit reply.
    pub fn with_default(mut self, reply: ScriptedReply) -> Self {
        self.default_reply = reply;
        self
    }

    /// Close the connection instead of acknowledging `uci`.
    pub fn failing_handshake(mut self) -> Self {
        self.fail_handshake = true;
        self
    }

    /// Never acknowledge `uci`.
    pub fn stalling_handshake(mut self) -> Self {
        self.stall_handshake = true;
        self
    }

    pub fn log(&self) -> Arc<EngineLog> {
        self.log.clone()
    }

    pub fn transport(&self) -> ScriptedTransport {
        ScriptedTransport {
            script: self.clone(),
            outbox: VecDeque::new(),
            position: None,
            closed: false,
        }
    }

    fn reply_for(&self, fen: &str) -> ScriptedReply {
        PositionKey::from_fen(fen)
            .ok()
            .and_then(|key| self.replies.get(&key).cloned())
            .unwrap_or_else(|| self.default_reply.clone())
    }
}

/// In-memory [`EngineTransport`] that answers from a [`ScriptedEngine`].
pub struct ScriptedTransport {
    script: ScriptedEngine,
    outbox: VecDeque<String>,
    position: Option<String>,
    closed: bool,
}

#[async_trait]
impl EngineTransport for ScriptedTransport {
    async fn send_line(&mut self, line: &str) -> Result<(), EngineError> {
        if self.closed {
            return Err(EngineError::Closed);
        }
        self.script.log.record(line);

        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("uci") => {
                if self.script.fail_handshake {
                    self.closed = true;
                } else if !self.script.stall_handshake {
                    self.outbox.push_back("id name Scripted".to_string());
                    self.outbox.push_back("option name Hash type spin".to_string());
                    self.outbox.push_back("uciok".to_string());
                }
            }
            Some("isready") => self.outbox.push_back("readyok".to_string()),
            Some("position") => {
                self.position = line.strip_prefix("position fen ").map(str::to_string);
            }
            Some("go") => {
                let depth = line
                    .strip_prefix("go depth ")
                    .and_then(|d| d.trim().parse::<u8>().ok())
                    .unwrap_or(1);
                let fen = self.position.clone().unwrap_or_default();
                match self.script.reply_for(&fen) {
                    ScriptedReply::Score { score, best_move } => {
                        let score = match score {
                            AnalysisScore::Centipawns(cp) => format!("cp {}", cp),
                            AnalysisScore::Mate(m) => format!("mate {}", m),
                        };
                        let mv = best_move.unwrap_or_else(|| "(none)".to_string());
                        self.outbox
                            .push_back(format!("info depth {} score {} pv {}", depth, score, mv));
                        self.outbox.push_back(format!("bestmove {}", mv));
                    }
                    ScriptedReply::NoScore { best_move } => {
                        let mv = best_move.unwrap_or_else(|| "(none)".to_string());
                        self.outbox.push_back(format!("bestmove {}", mv));
                    }
                    ScriptedReply::Stall => {}
                    ScriptedReply::Close => self.closed = true,
                }
            }
            Some("quit") => self.closed = true,
            _ => {}
        }
        Ok(())
    }

    async fn recv_line(&mut self) -> Option<String> {
        if let Some(line) = self.outbox.pop_front() {
            return Some(line);
        }
        if self.closed {
            return None;
        }
        std::future::pending().await
    }

    async fn close(&mut self) {
        let _ = self.send_line("quit").await;
        self.closed = true;
    }
}

/// [`EngineLauncher`] handing out [`ScriptedTransport`] sessions.
#[derive(Debug, Clone)]
pub struct ScriptedLauncher {
    script: ScriptedEngine,
    /// Launches beyond this many fail.
    max_launches: Option<usize>,
}

impl ScriptedLauncher {
    pub fn new(script: ScriptedEngine) -> Self {
        Self {
            script,
            max_launches: None,
        }
    }

    /// Every launch fails as if the binary were missing.
    pub fn failing(script: ScriptedEngine) -> Self {
        Self::failing_after(script, 0)
    }

    /// The first `launches` launches succeed, later ones fail.
    pub fn failing_after(script: ScriptedEngine, launches: usize) -> Self {
        Self {
            script,
            max_launches: Some(launches),
        }
    }

    pub fn log(&self) -> Arc<EngineLog> {
        self.script.log()
    }
}

#[async_trait]
impl EngineLauncher for ScriptedLauncher {
    async fn launch(&self) -> Result<EngineSession, EngineError> {
        let n = self.script.log.launches.fetch_add(1, Ordering::SeqCst) + 1;
        if self.max_launches.is_some_and(|max| n > max) {
            return Err(EngineError::NotFound);
        }
        EngineSession::start(Box::new(self.script.transport()), &format!("scripted-{}", n)).await
    }
}
