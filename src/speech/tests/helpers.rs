use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use crate::speech::config::SpeechSystemConfig;
use crate::speech::interface::{SpeechError, SpeechSynthesizer};
use crate::speech::manager::SpeechService;
use crate::speech::playback::{AudioBackend, AudioHandle};

// ── Tracing ─────────────────────────────────────────────────

/// Install a fmt subscriber once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

// ── Audio byte generator ────────────────────────────────────

/// Generate MP3-looking bytes: frame sync header + padding to `size`.
pub fn make_mp3_bytes(size: usize) -> Vec<u8> {
    let mut bytes = vec![0xFF, 0xFB, 0x90, 0x64];
    bytes.resize(size.max(4), 0xAB);
    bytes
}

/// Write `bytes` under `tmp` and return the path, for cache pre-seeding.
pub fn write_audio_file(tmp: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
    let path = tmp.path().join(name);
    std::fs::write(&path, bytes).expect("failed to write audio fixture");
    path
}

// ── Mock synthesizer ────────────────────────────────────────

pub enum Behavior {
    /// Every call succeeds with this audio.
    Succeed(Vec<u8>),
    /// Every call fails.
    Fail,
    /// The first `failures` calls fail, the rest succeed.
    FailFirst { failures: u32, audio: Vec<u8> },
    /// Succeeds after sleeping, to leave a window for cancellation.
    Slow { audio: Vec<u8>, delay: Duration },
}

pub struct MockSynthesizer {
    id: String,
    calls: AtomicU32,
    behavior: Behavior,
}

impl MockSynthesizer {
    pub fn with_behavior(id: &str, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            calls: AtomicU32::new(0),
            behavior,
        })
    }

    pub fn succeeding(id: &str) -> Arc<Self> {
        Self::with_behavior(id, Behavior::Succeed(make_mp3_bytes(64)))
    }

    pub fn failing(id: &str) -> Arc<Self> {
        Self::with_behavior(id, Behavior::Fail)
    }

    pub fn flaky(id: &str, failures: u32) -> Arc<Self> {
        Self::with_behavior(
            id,
            Behavior::FailFirst {
                failures,
                audio: make_mp3_bytes(64),
            },
        )
    }

    pub fn slow(id: &str, delay: Duration) -> Arc<Self> {
        Self::with_behavior(
            id,
            Behavior::Slow {
                audio: make_mp3_bytes(64),
                delay,
            },
        )
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechSynthesizer for MockSynthesizer {
    fn id(&self) -> String {
        self.id.clone()
    }

    async fn synthesize(&self, _text: &str, _language: &str) -> Result<Vec<u8>, SpeechError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Succeed(audio) => Ok(audio.clone()),
            Behavior::Fail => Err(SpeechError::Network(format!(
                "{}: injected failure",
                self.id
            ))),
            Behavior::FailFirst { failures, audio } => {
                if call < *failures {
                    Err(SpeechError::Network(format!(
                        "{}: injected failure",
                        self.id
                    )))
                } else {
                    Ok(audio.clone())
                }
            }
            Behavior::Slow { audio, delay } => {
                tokio::time::sleep(*delay).await;
                Ok(audio.clone())
            }
        }
    }
}

// ── Mock audio backend ──────────────────────────────────────

#[derive(Clone, Copy)]
pub enum PlayMode {
    /// Tracks end naturally after this long.
    Finish(Duration),
    /// Tracks never end on their own.
    Hang,
    /// Loading rejects.
    FailLoad,
    /// Loading succeeds, playback faults immediately.
    FailPlayback,
}

pub struct MockAudioBackend {
    mode: PlayMode,
    plays: Mutex<Vec<PathBuf>>,
    handles: Mutex<Vec<Arc<MockAudioHandle>>>,
}

impl MockAudioBackend {
    pub fn with_mode(mode: PlayMode) -> Arc<Self> {
        Arc::new(Self {
            mode,
            plays: Mutex::new(Vec::new()),
            handles: Mutex::new(Vec::new()),
        })
    }

    /// Backend whose tracks finish quickly on their own.
    pub fn finishing() -> Arc<Self> {
        Self::with_mode(PlayMode::Finish(Duration::from_millis(20)))
    }

    /// Paths loaded so far, in load order.
    pub fn plays(&self) -> Vec<PathBuf> {
        self.plays.lock().unwrap().clone()
    }

    pub fn play_count(&self) -> usize {
        self.plays.lock().unwrap().len()
    }

    pub fn handle(&self, index: usize) -> Arc<MockAudioHandle> {
        Arc::clone(&self.handles.lock().unwrap()[index])
    }
}

pub struct MockAudioHandle {
    stopped: AtomicBool,
    duration: Option<Duration>,
    fault: bool,
}

impl MockAudioHandle {
    pub fn was_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioHandle for MockAudioHandle {
    async fn finished(&self) -> Result<(), SpeechError> {
        if self.fault {
            return Err(SpeechError::Playback("injected playback fault".to_string()));
        }
        match self.duration {
            Some(duration) => {
                tokio::time::sleep(duration).await;
                Ok(())
            }
            None => std::future::pending().await,
        }
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl AudioBackend for MockAudioBackend {
    async fn load_and_play(&self, path: &Path) -> Result<Arc<dyn AudioHandle>, SpeechError> {
        if matches!(self.mode, PlayMode::FailLoad) {
            return Err(SpeechError::Playback("injected load failure".to_string()));
        }
        self.plays.lock().unwrap().push(path.to_path_buf());
        let handle = Arc::new(MockAudioHandle {
            stopped: AtomicBool::new(false),
            duration: match self.mode {
                PlayMode::Finish(duration) => Some(duration),
                _ => None,
            },
            fault: matches!(self.mode, PlayMode::FailPlayback),
        });
        self.handles.lock().unwrap().push(Arc::clone(&handle));
        Ok(handle)
    }
}

// ── Service setup ───────────────────────────────────────────

/// Config with an isolated cache dir and test-friendly timings.
pub fn test_config(tmp: &TempDir) -> SpeechSystemConfig {
    let mut config = SpeechSystemConfig::default();
    config.cache.dir = Some(tmp.path().join("tts-cache"));
    config.chunking.gap_ms = 10;
    config.fetch.retry_pause_ms = 10;
    config
}

/// Widen mock synthesizers to the trait objects the service wants.
pub fn as_endpoints(mocks: Vec<Arc<MockSynthesizer>>) -> Vec<Arc<dyn SpeechSynthesizer>> {
    mocks
        .into_iter()
        .map(|mock| mock as Arc<dyn SpeechSynthesizer>)
        .collect()
}

pub fn setup_service(
    tmp: &TempDir,
    endpoints: Vec<Arc<MockSynthesizer>>,
    backend: Arc<MockAudioBackend>,
) -> SpeechService {
    setup_service_with(test_config(tmp), as_endpoints(endpoints), backend)
}

pub fn setup_service_with(
    config: SpeechSystemConfig,
    endpoints: Vec<Arc<dyn SpeechSynthesizer>>,
    backend: Arc<MockAudioBackend>,
) -> SpeechService {
    init_tracing();
    SpeechService::new(&config, endpoints, backend)
}

// ── Polling helper ──────────────────────────────────────────

/// Poll `cond` until it holds or `timeout` elapses; returns the final
/// evaluation.
pub async fn wait_until(mut cond: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cond()
}
