//! Endpoint fallback, retry and cache promotion.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::cache::{derive_key, AudioCache};
use super::interface::{SpeechError, SpeechSynthesizer};

/// Tries an ordered list of synthesis endpoints with bounded retries and
/// lands every success in the audio cache.
pub struct SynthesisFetcher {
    endpoints: Vec<Arc<dyn SpeechSynthesizer>>,
    cache: Arc<AudioCache>,
    attempts_per_endpoint: u32,
    retry_pause: Duration,
    temp_dir: PathBuf,
}

impl SynthesisFetcher {
    pub fn new(
        endpoints: Vec<Arc<dyn SpeechSynthesizer>>,
        cache: Arc<AudioCache>,
        attempts_per_endpoint: u32,
        retry_pause: Duration,
    ) -> Self {
        Self {
            endpoints,
            cache,
            attempts_per_endpoint,
            retry_pause,
            temp_dir: std::env::temp_dir(),
        }
    }

    pub fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }

    /// Synthesize `text` through the first endpoint that succeeds and
    /// return the cache path of the stored audio.
    ///
    /// Each endpoint gets `attempts_per_endpoint` tries with a cancellable
    /// pause between them; the first success ends the search. Exhaustion
    /// yields `SynthesisFailed` wrapping the last attempt's error. The
    /// token is observed before every attempt and at every await boundary;
    /// once it fires, no cache write happens.
    pub async fn fetch(
        &self,
        text: &str,
        language: &str,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, SpeechError> {
        let key = derive_key(text, language);
        let mut last_err: Option<SpeechError> = None;

        for endpoint in &self.endpoints {
            for attempt in 1..=self.attempts_per_endpoint {
                if cancel.is_cancelled() {
                    return Err(SpeechError::Cancelled);
                }
                match self
                    .attempt(endpoint.as_ref(), &key, text, language, cancel)
                    .await
                {
                    Ok(path) => return Ok(path),
                    Err(SpeechError::Cancelled) => return Err(SpeechError::Cancelled),
                    Err(e) => {
                        warn!(
                            endpoint = %endpoint.id(),
                            attempt,
                            error = %e,
                            "synthesis attempt failed"
                        );
                        last_err = Some(e);
                        if attempt < self.attempts_per_endpoint {
                            tokio::select! {
                                biased;
                                _ = cancel.cancelled() => return Err(SpeechError::Cancelled),
                                _ = tokio::time::sleep(self.retry_pause) => {}
                            }
                        }
                    }
                }
            }
        }

        Err(SpeechError::SynthesisFailed {
            last: Box::new(last_err.unwrap_or_else(|| {
                SpeechError::Network("no synthesis endpoints configured".to_string())
            })),
        })
    }

    /// One attempt: synthesize, stage to a uniquely named temp file,
    /// promote into the cache by copy, delete the temp file.
    ///
    /// The temp file is removed on every exit path, so an interruption can
    /// never leave partial data behind, and a cancelled token is honored
    /// before the cache write.
    async fn attempt(
        &self,
        endpoint: &dyn SpeechSynthesizer,
        key: &str,
        text: &str,
        language: &str,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, SpeechError> {
        let audio = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SpeechError::Cancelled),
            result = endpoint.synthesize(text, language) => result?,
        };

        let temp = self
            .temp_dir
            .join(format!("mathvoice-{key}-{}.tmp", uuid::Uuid::new_v4()));
        tokio::fs::write(&temp, &audio).await?;

        let result = if cancel.is_cancelled() {
            Err(SpeechError::Cancelled)
        } else {
            self.cache.put(key, &temp).await
        };

        if let Err(e) = tokio::fs::remove_file(&temp).await {
            debug!(path = %temp.display(), error = %e, "temp file cleanup failed");
        }
        result
    }
}
