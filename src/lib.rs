//! Speech delivery engine for a children's math-learning app.
//!
//! Turns lesson text into spoken audio: normalizes and chunks the text,
//! synthesizes each chunk through an ordered list of HTTP endpoints with
//! bounded retries, caches the resulting audio on disk, and plays chunks
//! back strictly in order through a single exclusive playback resource.
//! A single-flight cancellation protocol guarantees that only the newest
//! `speak` invocation can ever become audible, no matter how many screens
//! trigger speech concurrently.

pub mod config;
pub mod speech;

pub use speech::config::{load_config, save_config, SpeechSystemConfig};
pub use speech::interface::{SpeechError, SpeechRequest, SpeechSynthesizer};
pub use speech::manager::{ScreenSpeech, ScreenSpeechOptions, SpeechService};
pub use speech::playback::{AudioBackend, AudioHandle, PlaybackEngine};
#[cfg(feature = "playback")]
pub use speech::rodio_backend::RodioBackend;
