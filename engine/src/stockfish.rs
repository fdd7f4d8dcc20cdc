use crate::session::{EngineError, EngineLauncher, EngineSession, EngineTransport};
use crate::EngineCommand;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin};
use tokio::sync::mpsc;

/// Configuration for launching a UCI engine process.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Explicit binary path; `None` searches the usual locations.
    pub path: Option<PathBuf>,
    pub threads: Option<u32>,
    pub hash_mb: Option<u32>,
    pub handshake_timeout: Duration,
    /// Name used in log lines to tell sessions apart.
    pub label: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            path: None,
            threads: None,
            hash_mb: None,
            handshake_timeout: Duration::from_secs(10),
            label: "engine".to_string(),
        }
    }
}

/// [`EngineTransport`] over a child process's stdin/stdout.
pub struct ProcessTransport {
    process: Child,
    stdin: ChildStdin,
    lines_rx: mpsc::Receiver<String>,
}

impl ProcessTransport {
    #[tracing::instrument(level = "info")]
    pub fn spawn(path: &Path) -> Result<Self, EngineError> {
        tracing::debug!("Spawning engine process");
        let mut process = tokio::process::Command::new(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                tracing::error!("Failed to spawn engine: {}", e);
                EngineError::Spawn(e.to_string())
            })?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| EngineError::Spawn("engine has no stdin".to_string()))?;
        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| EngineError::Spawn("engine has no stdout".to_string()))?;

        // Spawn output reader task
        let (lines_tx, lines_rx) = mpsc::channel::<String>(256);
        tokio::spawn(async move {
            let mut reader = BufReader::new(stdout);
            let mut line = String::new();

            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => {
                        tracing::debug!("Engine stdout EOF");
                        break;
                    }
                    Ok(_) => {
                        if lines_tx.send(line.trim().to_string()).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!("Error reading from engine stdout: {}", e);
                        break;
                    }
                }
            }
            tracing::debug!("Output reader task exiting");
        });

        Ok(Self {
            process,
            stdin,
            lines_rx,
        })
    }
}

#[async_trait]
impl EngineTransport for ProcessTransport {
    async fn send_line(&mut self, line: &str) -> Result<(), EngineError> {
        let mut buf = line.trim_end().to_string();
        buf.push('\n');
        self.stdin.write_all(buf.as_bytes()).await?;
        self.stdin.flush().await?;
        Ok(())
    }

    async fn recv_line(&mut self) -> Option<String> {
        self.lines_rx.recv().await
    }

    async fn close(&mut self) {
        let _ = self.send_line(&EngineCommand::Quit.to_uci()).await;
        let _ = tokio::time::timeout(Duration::from_secs(1), self.process.wait()).await;
        let _ = self.process.kill().await;
    }
}

/// Launches Stockfish (or any UCI binary) processes.
#[derive(Debug, Clone)]
pub struct StockfishLauncher {
    config: EngineConfig,
}

impl StockfishLauncher {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

#[async_trait]
impl EngineLauncher for StockfishLauncher {
    #[tracing::instrument(level = "info", skip(self), fields(label = %self.config.label))]
    async fn launch(&self) -> Result<EngineSession, EngineError> {
        let path = match &self.config.path {
            Some(path) => path.clone(),
            None => find_stockfish_path().ok_or(EngineError::NotFound)?,
        };
        tracing::info!("Launching engine at {:?}", path);

        let transport = ProcessTransport::spawn(&path)?;
        let mut session = tokio::time::timeout(
            self.config.handshake_timeout,
            EngineSession::start(Box::new(transport), &self.config.label),
        )
        .await
        .map_err(|_| {
            tracing::error!("Timeout waiting for engine handshake");
            EngineError::HandshakeFailed("timed out".to_string())
        })??;

        if let Some(threads) = self.config.threads {
            let threads = threads.clamp(1, 16);
            session
                .set_option("Threads", Some(threads.to_string()))
                .await?;
        }
        if let Some(hash_mb) = self.config.hash_mb {
            let hash_mb = hash_mb.clamp(1, 2048);
            session.set_option("Hash", Some(hash_mb.to_string())).await?;
        }

        Ok(session)
    }
}

/// Find Stockfish executable in common locations
pub fn find_stockfish_path() -> Option<PathBuf> {
    let paths = [
        "/usr/local/bin/stockfish",
        "/usr/bin/stockfish",
        "/opt/homebrew/bin/stockfish",
        "/usr/games/stockfish",
    ];

    if let Some(found) = paths.iter().map(Path::new).find(|p| p.exists()) {
        return Some(found.to_path_buf());
    }

    // Fall back to PATH
    std::env::var_os("PATH").and_then(|path| {
        std::env::split_paths(&path)
            .map(|dir| dir.join("stockfish"))
            .find(|candidate| candidate.is_file())
    })
}
