//! HTTP synthesis endpoints.
//!
//! The default configuration speaks to three interchangeable
//! translate-TTS mirrors that differ only in host and client parameter.
//! Each instance is one strategy in the fetcher's ordered fallback list;
//! provider-specific knowledge stays confined to the request URL.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use std::fmt::Write;
use std::time::Duration;
use tracing::debug;

use super::config::EndpointConfig;
use super::interface::{SpeechError, SpeechSynthesizer};

/// Per-request timeout. Generous: the mirrors can be slow on long chunks.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// The mirrors reject requests carrying a default client user agent.
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// One HTTP synthesis strategy: a host plus its query parameter style.
pub struct HttpSynthesizer {
    client: Client,
    endpoint_id: String,
    base_url: String,
    client_param: String,
}

impl HttpSynthesizer {
    pub fn new(
        endpoint_id: impl Into<String>,
        base_url: impl Into<String>,
        client_param: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .user_agent(USER_AGENT)
                .build()
                .unwrap_or_else(|_| Client::new()),
            endpoint_id: endpoint_id.into(),
            base_url: base_url.into(),
            client_param: client_param.into(),
        }
    }

    /// Primary mirror.
    pub fn google_style(base_url: Option<String>) -> Self {
        Self::new(
            "google",
            base_url.unwrap_or_else(|| "https://translate.google.com/translate_tts".to_string()),
            "tw-ob",
        )
    }

    /// googleapis host, `gtx` client.
    pub fn googleapis_style(base_url: Option<String>) -> Self {
        Self::new(
            "googleapis",
            base_url
                .unwrap_or_else(|| "https://translate.googleapis.com/translate_tts".to_string()),
            "gtx",
        )
    }

    /// Regional mirror.
    pub fn google_vn_style(base_url: Option<String>) -> Self {
        Self::new(
            "google-vn",
            base_url
                .unwrap_or_else(|| "https://translate.google.com.vn/translate_tts".to_string()),
            "tw-ob",
        )
    }

    /// Construct from a config entry. Returns `None` for unknown styles.
    pub fn from_config(config: &EndpointConfig) -> Option<Self> {
        let built = match config.style.as_str() {
            "google" => Self::google_style(config.base_url.clone()),
            "googleapis" => Self::googleapis_style(config.base_url.clone()),
            "google-vn" => Self::google_vn_style(config.base_url.clone()),
            _ => return None,
        };
        Some(Self {
            endpoint_id: config.id.clone(),
            ..built
        })
    }

    /// The full request URL for `text` in `language`. Pure; what a request
    /// looks like is testable without touching the network.
    pub fn request_url(&self, text: &str, language: &str) -> String {
        format!(
            "{}?ie=UTF-8&client={}&tl={}&q={}",
            self.base_url,
            self.client_param,
            language,
            urlencode(text)
        )
    }
}

/// Percent-encode `text` for use as a query parameter value.
fn urlencode(text: &str) -> String {
    let mut out = String::with_capacity(text.len() * 3);
    for b in text.as_bytes() {
        match *b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(*b as char);
            }
            b => write!(&mut out, "%{b:02X}").unwrap(),
        }
    }
    out
}

#[async_trait]
impl SpeechSynthesizer for HttpSynthesizer {
    fn id(&self) -> String {
        self.endpoint_id.clone()
    }

    async fn synthesize(&self, text: &str, language: &str) -> Result<Vec<u8>, SpeechError> {
        let url = self.request_url(text, language);
        debug!(endpoint = %self.endpoint_id, "requesting synthesis");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SpeechError::Network(format!("{}: {}", self.endpoint_id, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SpeechError::Network(format!(
                "{}: status {}",
                self.endpoint_id, status
            )));
        }

        let mut audio = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(part) = stream.next().await {
            let part = part.map_err(|e| {
                SpeechError::Network(format!("{}: body read: {}", self.endpoint_id, e))
            })?;
            audio.extend_from_slice(&part);
        }

        if audio.is_empty() {
            return Err(SpeechError::Network(format!(
                "{}: empty audio body",
                self.endpoint_id
            )));
        }
        Ok(audio)
    }
}
