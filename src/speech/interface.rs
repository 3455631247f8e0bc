use async_trait::async_trait;
use std::time::Duration;

// ── Error Types ────────────────────────────────────────

/// Errors produced by the speech pipeline.
///
/// `Cancelled` is a control-flow signal, not a failure:
/// [`SpeechService::speak`](super::manager::SpeechService::speak) swallows
/// it and resolves normally. Everything else propagates to the caller,
/// which is expected to log and move on; speech is an enhancement, never a
/// blocking dependency of a screen.
#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    /// A single synthesis attempt failed (connection error, bad status,
    /// empty body). Retried by the fetcher before escalating.
    #[error("synthesis request failed: {0}")]
    Network(String),

    /// Every endpoint and attempt combination failed.
    #[error("all synthesis endpoints failed")]
    SynthesisFailed {
        #[source]
        last: Box<SpeechError>,
    },

    /// Filesystem failure while staging or promoting cached audio.
    #[error("cache I/O failed: {0}")]
    CacheIo(#[from] std::io::Error),

    /// The audio backend failed to load or play a file.
    #[error("playback failed: {0}")]
    Playback(String),

    /// Playback produced no terminal status within the deadline.
    #[error("playback timed out after {0:?}")]
    Timeout(Duration),

    /// The invocation's cancellation token fired.
    #[error("speech cancelled")]
    Cancelled,
}

// ── Requests ───────────────────────────────────────────

/// One `speak` invocation's worth of input. Ephemeral; discarded once the
/// invocation is done, aborted or errored.
#[derive(Debug, Clone)]
pub struct SpeechRequest {
    pub text: String,
    /// BCP-47-ish language code passed through to the endpoints, e.g. "vi".
    pub language: String,
    /// When set, the request is dropped unless this page is active.
    pub page_id: Option<String>,
}

// ── Synthesizer Trait ──────────────────────────────────

/// A synthesis strategy: one way of turning text into encoded audio bytes.
///
/// The fetcher holds an ordered list of these and falls through it with
/// bounded retries, so implementations should fail fast rather than retry
/// internally.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Identifier used in logs and error messages.
    fn id(&self) -> String;

    /// Synthesize `text` in `language` to encoded audio bytes (MP3).
    async fn synthesize(&self, text: &str, language: &str) -> Result<Vec<u8>, SpeechError>;
}
