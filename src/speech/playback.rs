//! Exclusive audio playback.

use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::interface::SpeechError;

/// Deadline for a terminal playback status.
pub const DEFAULT_PLAYBACK_TIMEOUT: Duration = Duration::from_secs(15);

/// Platform audio capability: load a file and start playing it.
///
/// Implementations configure the output route for playback (not
/// recording, audible in silent mode, ducking other audio) before
/// starting, to the extent the platform exposes those knobs.
#[async_trait]
pub trait AudioBackend: Send + Sync {
    /// Load `path` with auto-play at full volume and return a handle to
    /// the live playback. Load failures reject here, before any handle
    /// exists.
    async fn load_and_play(&self, path: &Path) -> Result<Arc<dyn AudioHandle>, SpeechError>;
}

/// A live playback resource.
#[async_trait]
pub trait AudioHandle: Send + Sync {
    /// Resolves when the track reaches a terminal status: `Ok` on natural
    /// end (or after `stop`), `Err` on a playback fault.
    async fn finished(&self) -> Result<(), SpeechError>;

    /// Stop and release the underlying resource. Idempotent.
    fn stop(&self);
}

/// Owns the single live playback resource, process-wide.
///
/// Loading a new file always stops and releases the previous one first;
/// together with the single-flight token protocol this is what keeps a
/// superseded invocation from ever becoming audible.
pub struct PlaybackEngine {
    backend: Arc<dyn AudioBackend>,
    current: Mutex<Option<Arc<dyn AudioHandle>>>,
    timeout: Duration,
}

impl PlaybackEngine {
    pub fn new(backend: Arc<dyn AudioBackend>, timeout: Duration) -> Self {
        Self {
            backend,
            current: Mutex::new(None),
            timeout,
        }
    }

    /// Play `path` to completion.
    ///
    /// Rejects with `Playback` on a load or playback fault, `Timeout`
    /// when no terminal status arrives within the deadline, `Cancelled`
    /// when the token fires first. Every path, success included, releases
    /// the loaded resource before returning.
    pub async fn play_file(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), SpeechError> {
        self.stop();

        let handle = self.backend.load_and_play(path).await?;
        *self.current.lock().unwrap() = Some(Arc::clone(&handle));
        debug!(path = %path.display(), "playback started");

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(SpeechError::Cancelled),
            finished = tokio::time::timeout(self.timeout, handle.finished()) => {
                match finished {
                    Ok(status) => status,
                    Err(_) => Err(SpeechError::Timeout(self.timeout)),
                }
            }
        };

        if result.is_err() {
            handle.stop();
        }
        self.release(&handle);
        result
    }

    /// Stop and release whatever is currently loaded. No-op when idle.
    pub fn stop(&self) {
        if let Some(handle) = self.current.lock().unwrap().take() {
            debug!("stopping active playback");
            handle.stop();
        }
    }

    /// Whether a playback resource is currently loaded.
    pub fn is_loaded(&self) -> bool {
        self.current.lock().unwrap().is_some()
    }

    fn release(&self, handle: &Arc<dyn AudioHandle>) {
        let mut current = self.current.lock().unwrap();
        // A newer invocation may already own the slot.
        if let Some(held) = current.as_ref() {
            if Arc::ptr_eq(held, handle) {
                *current = None;
            }
        }
    }
}
