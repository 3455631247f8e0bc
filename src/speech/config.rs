use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::{load_json_config, save_json_config};

// ── Endpoint Config ────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub id: String,
    /// One of "google", "googleapis", "google-vn".
    pub style: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Override the style's default host, mainly for tests.
    pub base_url: Option<String>,
}

fn default_true() -> bool {
    true
}

// ── Cache Config ───────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// When false, lookups are skipped and every chunk is resynthesized.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Cache directory; resolved to the platform cache dir when absent.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
        }
    }
}

impl CacheConfig {
    /// The directory audio files are stored in.
    pub fn resolve_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(|| {
            dirs_next::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("mathvoice")
                .join("tts-cache")
        })
    }
}

// ── Fetch Config ───────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_attempts")]
    pub attempts_per_endpoint: u32,
    /// Pause between the attempts of one endpoint, milliseconds.
    #[serde(default = "default_retry_pause_ms")]
    pub retry_pause_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            attempts_per_endpoint: default_attempts(),
            retry_pause_ms: default_retry_pause_ms(),
        }
    }
}

fn default_attempts() -> u32 {
    2
}
fn default_retry_pause_ms() -> u64 {
    500
}

// ── Playback Config ────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Deadline for a terminal playback status, seconds.
    #[serde(default = "default_playback_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_playback_timeout_secs(),
        }
    }
}

fn default_playback_timeout_secs() -> u64 {
    15
}

// ── Chunking Config ────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chunk_chars")]
    pub max_chunk_chars: usize,
    /// Pause between consecutive chunks, milliseconds.
    #[serde(default = "default_gap_ms")]
    pub gap_ms: u64,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: default_max_chunk_chars(),
            gap_ms: default_gap_ms(),
        }
    }
}

fn default_max_chunk_chars() -> usize {
    100
}
fn default_gap_ms() -> u64 {
    300
}

// ── Top-Level System Config ────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechSystemConfig {
    #[serde(default = "default_language")]
    pub default_language: String,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<EndpointConfig>,
}

fn default_language() -> String {
    "vi".to_string()
}

fn default_endpoints() -> Vec<EndpointConfig> {
    vec![
        EndpointConfig {
            id: "google".to_string(),
            style: "google".to_string(),
            enabled: true,
            base_url: None,
        },
        EndpointConfig {
            id: "googleapis".to_string(),
            style: "googleapis".to_string(),
            enabled: true,
            base_url: None,
        },
        EndpointConfig {
            id: "google-vn".to_string(),
            style: "google-vn".to_string(),
            enabled: true,
            base_url: None,
        },
    ]
}

impl Default for SpeechSystemConfig {
    fn default() -> Self {
        Self {
            default_language: default_language(),
            cache: CacheConfig::default(),
            fetch: FetchConfig::default(),
            playback: PlaybackConfig::default(),
            chunking: ChunkingConfig::default(),
            endpoints: default_endpoints(),
        }
    }
}

/// Load speech config from a JSON file. Falls back to defaults if the file
/// is missing or invalid.
pub fn load_config(path: &Path) -> SpeechSystemConfig {
    load_json_config(path, "speech")
}

/// Save speech config to a JSON file.
pub fn save_config(path: &Path, config: &SpeechSystemConfig) -> Result<(), String> {
    save_json_config(path, config, "speech")
}
