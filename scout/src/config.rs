//! Runtime configuration for the scout binary.
//!
//! Engine settings come from environment variables, each with a default.
//! Analysis settings come from an optional JSON file, then from command-line
//! overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use engine::EngineConfig;
use repertoire::AnalysisConfig;

/// Default engine thread count.
const DEFAULT_ENGINE_THREADS: u32 = 1;

/// Default engine hash table size (in MB).
const DEFAULT_ENGINE_HASH_MB: u32 = 64;

/// Default handshake timeout (in seconds).
const DEFAULT_HANDSHAKE_TIMEOUT_SECS: u64 = 10;

/// Get the engine binary path.
///
/// Priority:
/// 1. `SCOUT_ENGINE_PATH` env variable if set
/// 2. `None`, which makes the launcher search common install locations and `PATH`
pub fn get_engine_path() -> Option<PathBuf> {
    std::env::var_os("SCOUT_ENGINE_PATH").map(PathBuf::from)
}

/// Get the engine thread count.
///
/// Priority:
/// 1. `SCOUT_ENGINE_THREADS` env variable if set (falls back to default if the
///    value cannot be parsed as a `u32`)
/// 2. `1` as fallback
pub fn get_engine_threads() -> u32 {
    if let Ok(threads) = std::env::var("SCOUT_ENGINE_THREADS") {
        return threads.parse().unwrap_or(DEFAULT_ENGINE_THREADS);
    }

    DEFAULT_ENGINE_THREADS
}

/// Get the engine hash size in MB.
///
/// Priority:
/// 1. `SCOUT_ENGINE_HASH_MB` env variable if set (falls back to default if the
///    value cannot be parsed as a `u32`)
/// 2. `64` as fallback
pub fn get_engine_hash_mb() -> u32 {
    if let Ok(hash) = std::env::var("SCOUT_ENGINE_HASH_MB") {
        return hash.parse().unwrap_or(DEFAULT_ENGINE_HASH_MB);
    }

    DEFAULT_ENGINE_HASH_MB
}

/// Engine launch settings for sessions named `label`.
pub fn engine_config(label: &str) -> EngineConfig {
    EngineConfig {
        path: get_engine_path(),
        threads: Some(get_engine_threads()),
        hash_mb: Some(get_engine_hash_mb()),
        handshake_timeout: Duration::from_secs(DEFAULT_HANDSHAKE_TIMEOUT_SECS),
        label: label.to_string(),
    }
}

/// Analysis settings from `path`, or the defaults when no file is given.
pub fn load_analysis_config(path: Option<&Path>) -> anyhow::Result<AnalysisConfig> {
    match path {
        Some(path) => {
            tracing::info!("Loading analysis config from {}", path.display());
            Ok(AnalysisConfig::from_json_file(path)?)
        }
        None => Ok(AnalysisConfig::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_get_engine_path() {
        let path = get_engine_path();
        match std::env::var_os("SCOUT_ENGINE_PATH") {
            Some(val) => assert_eq!(path, Some(PathBuf::from(val))),
            None => assert_eq!(path, None),
        }
    }

    #[test]
    fn test_get_engine_threads_default() {
        if std::env::var("SCOUT_ENGINE_THREADS").is_err() {
            assert_eq!(get_engine_threads(), DEFAULT_ENGINE_THREADS);
        }
    }

    #[test]
    fn test_get_engine_hash_mb_default() {
        if std::env::var("SCOUT_ENGINE_HASH_MB").is_err() {
            assert_eq!(get_engine_hash_mb(), DEFAULT_ENGINE_HASH_MB);
        }
    }

    #[test]
    fn test_engine_config_label() {
        let config = engine_config("bulk");
        assert_eq!(config.label, "bulk");
        assert_eq!(config.handshake_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_load_analysis_config() {
        assert_eq!(load_analysis_config(None).unwrap(), AnalysisConfig::default());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{"review_depth": 16}"#).unwrap();
        let config = load_analysis_config(Some(file.path())).unwrap();
        assert_eq!(config.review_depth, 16);
        assert_eq!(config.bulk_depth, 14);

        assert!(load_analysis_config(Some(Path::new("/nonexistent/scout.json"))).is_err());
    }
}
