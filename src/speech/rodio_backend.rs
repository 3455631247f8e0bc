//! rodio-based audio backend.

use async_trait::async_trait;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{oneshot, watch};

use super::interface::SpeechError;
use super::playback::{AudioBackend, AudioHandle};

/// Plays audio files through the default output device.
///
/// rodio output streams are not `Send`, so each load runs on a dedicated
/// thread that owns the stream and sink for the lifetime of the track and
/// reports the terminal status through a watch channel.
pub struct RodioBackend;

impl RodioBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RodioBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioBackend for RodioBackend {
    async fn load_and_play(&self, path: &Path) -> Result<Arc<dyn AudioHandle>, SpeechError> {
        // Decode up front so load errors reject before any handle exists.
        let file = File::open(path)
            .map_err(|e| SpeechError::Playback(format!("open {}: {}", path.display(), e)))?;
        let source = rodio::Decoder::new(BufReader::new(file))
            .map_err(|e| SpeechError::Playback(format!("decode {}: {}", path.display(), e)))?;

        let (ready_tx, ready_rx) = oneshot::channel::<Result<Arc<rodio::Sink>, String>>();
        let (status_tx, status_rx) = watch::channel(None::<Result<(), String>>);

        std::thread::Builder::new()
            .name("mathvoice-playback".into())
            .spawn(move || {
                let stream = match rodio::OutputStreamBuilder::open_default_stream() {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(format!("audio output: {e}")));
                        return;
                    }
                };
                let sink = Arc::new(rodio::Sink::connect_new(stream.mixer()));
                sink.set_volume(1.0);
                sink.append(source);
                let _ = ready_tx.send(Ok(Arc::clone(&sink)));
                // Returns when the track drains naturally or `stop` clears
                // the sink; the stream must outlive it either way.
                sink.sleep_until_end();
                let _ = status_tx.send(Some(Ok(())));
            })
            .map_err(|e| SpeechError::Playback(format!("playback thread: {e}")))?;

        let sink = ready_rx
            .await
            .map_err(|_| SpeechError::Playback("playback thread exited".to_string()))?
            .map_err(SpeechError::Playback)?;

        Ok(Arc::new(RodioHandle { sink, status_rx }))
    }
}

struct RodioHandle {
    sink: Arc<rodio::Sink>,
    status_rx: watch::Receiver<Option<Result<(), String>>>,
}

#[async_trait]
impl AudioHandle for RodioHandle {
    async fn finished(&self) -> Result<(), SpeechError> {
        let mut rx = self.status_rx.clone();
        loop {
            if let Some(status) = rx.borrow_and_update().clone() {
                return status.map_err(SpeechError::Playback);
            }
            if rx.changed().await.is_err() {
                return Err(SpeechError::Playback("playback thread exited".to_string()));
            }
        }
    }

    fn stop(&self) {
        self.sink.stop();
    }
}
