pub mod cache;
pub mod config;
pub mod endpoints;
pub mod fetcher;
pub mod interface;
pub mod manager;
pub mod playback;
pub mod registry;
#[cfg(feature = "playback")]
pub mod rodio_backend;
pub mod text;

pub use config::{load_config, save_config, SpeechSystemConfig};
pub use interface::{SpeechError, SpeechRequest, SpeechSynthesizer};
pub use manager::{ScreenSpeech, ScreenSpeechOptions, SpeechService};

#[cfg(test)]
mod tests;
