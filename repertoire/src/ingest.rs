//! Game ingestion.
//!
//! [`NdjsonGameSource`] reads a Lichess game export (one JSON object per line,
//! as produced by the games API with `pgnInJson=true`).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chess::PlayerSide;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::game::{Game, GameMetadata, GameResult};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchOptions {
    pub username: String,
    /// Maximum number of games returned.
    pub limit: Option<usize>,
    /// Only games of these speeds, comma separated ("blitz,rapid").
    pub perf_type: Option<String>,
    /// Only games created at or after this time (ms since the Unix epoch).
    pub since: Option<i64>,
}

impl FetchOptions {
    pub fn new(username: &str) -> Self {
        Self {
            username: username.to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("User not found: {0}")]
    NotFound(String),
    #[error("Transport error: {0}")]
    Transport(String),
}

impl From<std::io::Error> for IngestError {
    fn from(e: std::io::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

/// Supplies the subject's finished games.
#[async_trait]
pub trait GameSource: Send + Sync {
    /// `progress` receives the running count of accepted games.
    async fn fetch_games(
        &self,
        options: &FetchOptions,
        progress: &(dyn Fn(usize) + Send + Sync),
    ) -> Result<Vec<Game>, IngestError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExportedGame {
    id: String,
    speed: Option<String>,
    perf: Option<String>,
    created_at: Option<i64>,
    last_move_at: Option<i64>,
    status: Option<String>,
    players: ExportedPlayers,
    winner: Option<String>,
    opening: Option<ExportedOpening>,
    #[serde(default)]
    moves: String,
    pgn: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExportedPlayers {
    white: ExportedPlayer,
    black: ExportedPlayer,
}

#[derive(Debug, Default, Deserialize)]
struct ExportedPlayer {
    user: Option<ExportedUser>,
    rating: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ExportedUser {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ExportedOpening {
    name: String,
}

impl ExportedPlayer {
    fn name(&self) -> &str {
        self.user.as_ref().map_or("Anonymous", |u| u.name.as_str())
    }
}

impl ExportedGame {
    fn result(&self) -> GameResult {
        match self.winner.as_deref() {
            Some("white") => GameResult::WhiteWins,
            Some("black") => GameResult::BlackWins,
            _ => match self.status.as_deref() {
                Some("created" | "started") => GameResult::Unfinished,
                _ => GameResult::Draw,
            },
        }
    }

    fn side_of(&self, username: &str) -> Option<PlayerSide> {
        if self.players.white.name().eq_ignore_ascii_case(username) {
            Some(PlayerSide::White)
        } else if self.players.black.name().eq_ignore_ascii_case(username) {
            Some(PlayerSide::Black)
        } else {
            None
        }
    }

    fn into_game(self, player_color: PlayerSide) -> Game {
        let result = self.result();
        let duration_secs = match (self.created_at, self.last_move_at) {
            (Some(start), Some(end)) if end >= start => Some(((end - start) / 1000) as u64),
            _ => None,
        };
        let pgn = self.pgn.unwrap_or_else(|| self.moves.clone());
        Game {
            white: self.players.white.name().to_string(),
            black: self.players.black.name().to_string(),
            player_color,
            result,
            metadata: GameMetadata {
                opening: self.opening.map(|o| o.name),
                ply_count: self.moves.split_whitespace().count() as u32,
                speed: self.speed.or(self.perf),
                status: self.status,
                duration_secs,
                white_rating: self.players.white.rating,
                black_rating: self.players.black.rating,
                created_at: self.created_at,
                url: Some(format!("https://lichess.org/{}", self.id)),
            },
            pgn,
            id: self.id,
        }
    }
}

/// Reads games from an NDJSON export on disk.
#[derive(Debug, Clone)]
pub struct NdjsonGameSource {
    path: PathBuf,
}

impl NdjsonGameSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl GameSource for NdjsonGameSource {
    #[tracing::instrument(level = "info", skip(self, options, progress), fields(user = %options.username))]
    async fn fetch_games(
        &self,
        options: &FetchOptions,
        progress: &(dyn Fn(usize) + Send + Sync),
    ) -> Result<Vec<Game>, IngestError> {
        let file = tokio::fs::File::open(&self.path).await?;
        let mut lines = BufReader::new(file).lines();

        let mut games = Vec::new();
        let mut seen_user = false;
        let mut line_no = 0usize;

        while let Some(line) = lines.next_line().await? {
            line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            if options.limit.is_some_and(|limit| games.len() >= limit) {
                break;
            }

            let exported: ExportedGame = match serde_json::from_str(&line) {
                Ok(game) => game,
                Err(e) => {
                    tracing::warn!(line = line_no, "Skipping malformed game record: {}", e);
                    continue;
                }
            };
            if exported.id.trim().is_empty() {
                tracing::warn!(line = line_no, "Skipping game record without id");
                continue;
            }

            let Some(side) = exported.side_of(&options.username) else {
                tracing::debug!(game_id = %exported.id, "Skipping game the user did not play");
                continue;
            };
            seen_user = true;

            if let Some(perf) = &options.perf_type {
                let speed = exported.speed.as_deref().or(exported.perf.as_deref());
                if !perf.split(',').map(str::trim).any(|p| Some(p) == speed) {
                    continue;
                }
            }
            if let Some(since) = options.since {
                if exported.created_at.map_or(true, |created| created < since) {
                    continue;
                }
            }

            games.push(exported.into_game(side));
            progress(games.len());
        }

        if !seen_user {
            return Err(IngestError::NotFound(options.username.clone()));
        }

        tracing::info!(games = games.len(), "Games loaded");
        Ok(games)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const EXPORT: &str = r#"{"id":"aaaa0001","speed":"blitz","perf":"blitz","createdAt":1700000000000,"lastMoveAt":1700000300000,"status":"mate","players":{"white":{"user":{"name":"Alice","id":"alice"},"rating":1500},"black":{"user":{"name":"bob","id":"bob"},"rating":1480}},"winner":"white","opening":{"eco":"C50","name":"Italian Game","ply":5},"moves":"e4 e5 Nf3 Nc6 Bc4","pgn":"[Event \"Rated blitz game\"]\n[Opening \"Italian Game\"]\n\n1. e4 e5 2. Nf3 Nc6 3. Bc4 1-0\n"}
this is not json
{"id":"aaaa0002","speed":"rapid","createdAt":1700001000000,"status":"draw","players":{"white":{"user":{"name":"carol"}},"black":{"user":{"name":"alice"}}},"moves":"d4 d5"}
{"id":"aaaa0003","speed":"blitz","createdAt":1600000000000,"status":"resign","players":{"white":{"user":{"name":"dave"}},"black":{"user":{"name":"erin"}}},"winner":"black","moves":"c4"}
"#;

    fn export_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(EXPORT.as_bytes()).unwrap();
        file
    }

    async fn fetch(options: FetchOptions) -> Result<Vec<Game>, IngestError> {
        let file = export_file();
        NdjsonGameSource::new(file.path())
            .fetch_games(&options, &|_| {})
            .await
    }

    #[tokio::test]
    async fn test_reads_user_games_and_skips_garbage() {
        let games = fetch(FetchOptions::new("alice")).await.unwrap();
        assert_eq!(games.len(), 2);

        let first = &games[0];
        assert_eq!(first.id, "aaaa0001");
        assert_eq!(first.player_color, PlayerSide::White);
        assert_eq!(first.result, GameResult::WhiteWins);
        assert_eq!(first.metadata.opening.as_deref(), Some("Italian Game"));
        assert_eq!(first.metadata.duration_secs, Some(300));
        assert_eq!(first.metadata.ply_count, 5);
        assert!(first.pgn.contains("3. Bc4"));

        let second = &games[1];
        assert_eq!(second.player_color, PlayerSide::Black);
        assert_eq!(second.result, GameResult::Draw);
        assert_eq!(second.pgn, "d4 d5");
    }

    #[tokio::test]
    async fn test_filters() {
        let mut options = FetchOptions::new("alice");
        options.perf_type = Some("rapid".into());
        let games = fetch(options).await.unwrap();
        assert_eq!(games.len(), 1);
        assert_eq!(games[0].id, "aaaa0002");

        let mut options = FetchOptions::new("alice");
        options.perf_type = Some("blitz, rapid".into());
        let ids: Vec<String> = fetch(options).await.unwrap().into_iter().map(|g| g.id).collect();
        assert_eq!(ids, vec!["aaaa0001", "aaaa0002"]);

        let mut options = FetchOptions::new("alice");
        options.perf_type = Some("bullet,classical".into());
        assert!(fetch(options).await.unwrap().is_empty());

        let mut options = FetchOptions::new("alice");
        options.since = Some(1700000500000);
        assert_eq!(fetch(options).await.unwrap().len(), 1);

        let mut options = FetchOptions::new("alice");
        options.limit = Some(1);
        assert_eq!(fetch(options).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let err = fetch(FetchOptions::new("mallory")).await.unwrap_err();
        assert!(matches!(err, IngestError::NotFound(name) if name == "mallory"));
    }

    #[tokio::test]
    async fn test_missing_file_is_transport_error() {
        let source = NdjsonGameSource::new("/nonexistent/games.ndjson");
        let err = source
            .fetch_games(&FetchOptions::new("alice"), &|_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Transport(_)));
    }

    #[tokio::test]
    async fn test_progress_counts_games() {
        let file = export_file();
        let calls = AtomicUsize::new(0);
        let last = AtomicUsize::new(0);
        NdjsonGameSource::new(file.path())
            .fetch_games(&FetchOptions::new("ALICE"), &|n| {
                calls.fetch_add(1, Ordering::SeqCst);
                last.store(n, Ordering::SeqCst);
            })
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(last.load(Ordering::SeqCst), 2);
    }
}
