//! Speech service orchestration.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::cache::{derive_key, AudioCache};
use super::config::SpeechSystemConfig;
#[cfg(feature = "playback")]
use super::endpoints::HttpSynthesizer;
use super::fetcher::SynthesisFetcher;
use super::interface::{SpeechError, SpeechRequest, SpeechSynthesizer};
use super::playback::{AudioBackend, PlaybackEngine};
use super::registry::PageRegistry;
use super::text;

/// Single-flight state: the live token and its generation. A new flight
/// cancels the previous token and bumps the generation; a finished flight
/// only clears the speaking flag when its generation is still current.
struct Flight {
    token: CancellationToken,
    generation: u64,
}

// ── SpeechService ──────────────────────────────────────

/// The speech delivery service. Constructed once and cloned freely;
/// clones share the cache index, the playback resource, the page registry
/// and the single-flight state.
#[derive(Clone)]
pub struct SpeechService {
    cache: Arc<AudioCache>,
    fetcher: Arc<SynthesisFetcher>,
    playback: Arc<PlaybackEngine>,
    pages: Arc<RwLock<PageRegistry>>,
    flight: Arc<Mutex<Flight>>,
    speaking: Arc<AtomicBool>,
    cache_enabled: bool,
    default_language: String,
    max_chunk_chars: usize,
    chunk_gap: Duration,
}

impl SpeechService {
    /// Build a service from explicit parts. The endpoint list is ordered:
    /// earlier entries are tried first.
    pub fn new(
        config: &SpeechSystemConfig,
        endpoints: Vec<Arc<dyn SpeechSynthesizer>>,
        backend: Arc<dyn AudioBackend>,
    ) -> Self {
        let cache = Arc::new(AudioCache::new(config.cache.resolve_dir()));
        let fetcher = Arc::new(SynthesisFetcher::new(
            endpoints,
            Arc::clone(&cache),
            config.fetch.attempts_per_endpoint,
            Duration::from_millis(config.fetch.retry_pause_ms),
        ));
        let playback = Arc::new(PlaybackEngine::new(
            backend,
            Duration::from_secs(config.playback.timeout_secs),
        ));
        Self {
            cache,
            fetcher,
            playback,
            pages: Arc::new(RwLock::new(PageRegistry::new())),
            flight: Arc::new(Mutex::new(Flight {
                token: CancellationToken::new(),
                generation: 0,
            })),
            speaking: Arc::new(AtomicBool::new(false)),
            cache_enabled: config.cache.enabled,
            default_language: config.default_language.clone(),
            max_chunk_chars: config.chunking.max_chunk_chars,
            chunk_gap: Duration::from_millis(config.chunking.gap_ms),
        }
    }

    /// Build a service from config, constructing the configured HTTP
    /// endpoints and the default audio backend.
    #[cfg(feature = "playback")]
    pub fn init_from_config(config: &SpeechSystemConfig) -> Self {
        use tracing::{info, warn};

        let mut endpoints: Vec<Arc<dyn SpeechSynthesizer>> = Vec::new();
        for endpoint_config in &config.endpoints {
            if !endpoint_config.enabled {
                debug!(id = %endpoint_config.id, "skipping disabled endpoint");
                continue;
            }
            match HttpSynthesizer::from_config(endpoint_config) {
                Some(endpoint) => {
                    info!(id = %endpoint_config.id, "registering synthesis endpoint");
                    endpoints.push(Arc::new(endpoint));
                }
                None => {
                    warn!(
                        id = %endpoint_config.id,
                        style = %endpoint_config.style,
                        "unknown endpoint style, skipping"
                    );
                }
            }
        }
        Self::new(
            config,
            endpoints,
            Arc::new(super::rodio_backend::RodioBackend::new()),
        )
    }

    // ── Public speech contract ─────────────────────────

    /// Speak `text` in the default language. Resolves when playback of
    /// all chunks completes, the invocation is superseded or stopped, or
    /// a chunk fails.
    pub async fn speak(&self, text: &str) -> Result<(), SpeechError> {
        self.speak_request(SpeechRequest {
            text: text.to_string(),
            language: self.default_language.clone(),
            page_id: None,
        })
        .await
    }

    /// Speak on behalf of a page. Silently dropped unless that page is
    /// the active one.
    pub async fn speak_from(&self, page_id: &str, text: &str) -> Result<(), SpeechError> {
        self.speak_request(SpeechRequest {
            text: text.to_string(),
            language: self.default_language.clone(),
            page_id: Some(page_id.to_string()),
        })
        .await
    }

    /// Full form of the speech pipeline.
    ///
    /// Empty-after-trim text and requests from a non-active page are
    /// silent no-ops. A superseded or stopped invocation also resolves
    /// with `Ok`; only real faults (synthesis exhaustion, cache I/O,
    /// playback, timeout) surface as errors.
    pub async fn speak_request(&self, request: SpeechRequest) -> Result<(), SpeechError> {
        if request.text.trim().is_empty() {
            debug!("empty text, nothing to speak");
            return Ok(());
        }
        if let Some(page_id) = &request.page_id {
            let pages = self.pages.read().await;
            if !pages.is_active(page_id) {
                debug!(
                    page_id = %page_id,
                    active = ?pages.active(),
                    "page not active, dropping request"
                );
                return Ok(());
            }
        }

        let (token, generation) = self.begin_flight();
        let result = self.run_pipeline(&request, &token).await;
        self.finish_flight(generation);

        match result {
            Err(SpeechError::Cancelled) => {
                debug!("speech superseded or stopped");
                Ok(())
            }
            other => other,
        }
    }

    /// Cancel the in-flight invocation, if any, and silence the playback
    /// engine. Always leaves `is_speech_active()` false.
    pub fn stop_speech(&self) {
        {
            let flight = self.flight.lock().unwrap();
            flight.token.cancel();
        }
        self.playback.stop();
        self.speaking.store(false, Ordering::SeqCst);
    }

    pub fn is_speech_active(&self) -> bool {
        self.speaking.load(Ordering::SeqCst)
    }

    /// Drop every cached audio file.
    pub async fn clear_cache(&self) -> Result<(), SpeechError> {
        self.cache.clear().await
    }

    /// Shared audio cache, for maintenance and pre-seeding.
    pub fn cache(&self) -> &AudioCache {
        &self.cache
    }

    /// The playback engine, for state inspection.
    pub fn playback(&self) -> &PlaybackEngine {
        &self.playback
    }

    /// Number of configured synthesis endpoints.
    pub fn endpoint_count(&self) -> usize {
        self.fetcher.endpoint_count()
    }

    // ── Page registry ──────────────────────────────────

    /// Register a page on screen mount.
    pub async fn register_page(&self, page_id: &str) {
        self.pages.write().await.register(page_id);
    }

    /// Mark a page active on screen focus.
    pub async fn set_active_page(&self, page_id: &str) {
        self.pages.write().await.set_active(page_id);
    }

    /// Deregister a page, clearing the active slot if it held it.
    pub async fn cleanup_page(&self, page_id: &str) {
        self.pages.write().await.cleanup(page_id);
    }

    pub async fn active_page(&self) -> Option<String> {
        self.pages.read().await.active().map(str::to_string)
    }

    // ── Pipeline ───────────────────────────────────────

    fn begin_flight(&self) -> (CancellationToken, u64) {
        let mut flight = self.flight.lock().unwrap();
        // Newest wins: the previous invocation must never speak again.
        flight.token.cancel();
        flight.token = CancellationToken::new();
        flight.generation += 1;
        self.speaking.store(true, Ordering::SeqCst);
        (flight.token.clone(), flight.generation)
    }

    fn finish_flight(&self, generation: u64) {
        let flight = self.flight.lock().unwrap();
        if flight.generation == generation {
            self.speaking.store(false, Ordering::SeqCst);
        }
    }

    async fn run_pipeline(
        &self,
        request: &SpeechRequest,
        token: &CancellationToken,
    ) -> Result<(), SpeechError> {
        let normalized = text::normalize(&request.text);
        let chunks = text::chunk(&normalized, self.max_chunk_chars);
        debug!(chunks = chunks.len(), language = %request.language, "speaking");

        for (i, chunk) in chunks.iter().enumerate() {
            if i > 0 {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return Err(SpeechError::Cancelled),
                    _ = tokio::time::sleep(self.chunk_gap) => {}
                }
            }
            if token.is_cancelled() {
                return Err(SpeechError::Cancelled);
            }

            let path = match self.lookup(chunk, &request.language).await {
                Some(path) => path,
                None => self.fetcher.fetch(chunk, &request.language, token).await?,
            };
            self.playback.play_file(&path, token).await?;
        }
        Ok(())
    }

    async fn lookup(&self, chunk: &str, language: &str) -> Option<PathBuf> {
        if !self.cache_enabled {
            return None;
        }
        self.cache.get(&derive_key(chunk, language)).await
    }
}

// ── Screen lifecycle handle ────────────────────────────

/// Options for a screen's lifecycle binding.
#[derive(Debug, Clone)]
pub struct ScreenSpeechOptions {
    /// Stop speech when the screen loses focus.
    pub stop_on_blur: bool,
    /// Stop speech and deregister the page when the screen unmounts.
    pub cleanup_on_unmount: bool,
}

impl Default for ScreenSpeechOptions {
    fn default() -> Self {
        Self {
            stop_on_blur: true,
            cleanup_on_unmount: true,
        }
    }
}

/// A screen's handle onto the speech service, bound to one page id.
///
/// The UI layer forwards its mount/focus/blur/unmount events here; the
/// handle keeps the page registry in sync and gates `speak` on the page
/// being active.
#[derive(Clone)]
pub struct ScreenSpeech {
    service: SpeechService,
    page_id: String,
    options: ScreenSpeechOptions,
}

impl ScreenSpeech {
    pub fn new(
        service: SpeechService,
        page_id: impl Into<String>,
        options: ScreenSpeechOptions,
    ) -> Self {
        Self {
            service,
            page_id: page_id.into(),
            options,
        }
    }

    pub fn page_id(&self) -> &str {
        &self.page_id
    }

    /// Screen mounted: register and activate the page.
    pub async fn on_mount(&self) {
        self.service.register_page(&self.page_id).await;
        self.service.set_active_page(&self.page_id).await;
    }

    /// Screen focused: (re)activate the page.
    pub async fn on_focus(&self) {
        self.service.set_active_page(&self.page_id).await;
    }

    /// Screen blurred: optionally silence it.
    pub async fn on_blur(&self) {
        if self.options.stop_on_blur {
            self.service.stop_speech();
        }
    }

    /// Screen unmounted: optionally silence and deregister.
    pub async fn on_unmount(&self) {
        if self.options.cleanup_on_unmount {
            self.service.stop_speech();
            self.service.cleanup_page(&self.page_id).await;
        }
    }

    /// Speak on behalf of this page; dropped unless the page is active.
    pub async fn speak(&self, text: &str) -> Result<(), SpeechError> {
        self.service.speak_from(&self.page_id, text).await
    }

    pub fn stop_speech(&self) {
        self.service.stop_speech();
    }

    pub fn is_speech_active(&self) -> bool {
        self.service.is_speech_active()
    }
}
