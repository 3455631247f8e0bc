//! Content-addressed on-disk audio cache with an in-memory index.
//!
//! One file per distinct `(text, language)` pair, named by the derived
//! key. Thread safety is handled here via `RwLock`; the service shares one
//! instance through an `Arc`.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::interface::SpeechError;

/// Extension of stored audio files.
pub const AUDIO_EXT: &str = "mp3";

/// Width of the derived key in hex characters.
const KEY_WIDTH: usize = 32;

/// Deterministic cache key for a `(text, language)` pair: sha256 over
/// `"{text}-{language}"`, rendered as a fixed-width lowercase hex string.
/// Stable across processes, which is what lets files cached in one run be
/// reused in the next.
pub fn derive_key(text: &str, language: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hasher.update(b"-");
    hasher.update(language.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..KEY_WIDTH].to_string()
}

/// On-disk audio store addressed by derived key.
///
/// Invariant: an indexed path pointed at an existing file when it was
/// inserted. A lookup that finds the file gone evicts the entry and
/// reports a miss. The index starts empty each process; a file left from
/// an earlier run is simply rewritten in place the next time its key is
/// synthesized.
pub struct AudioCache {
    dir: PathBuf,
    index: RwLock<HashMap<String, PathBuf>>,
}

impl AudioCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            index: RwLock::new(HashMap::new()),
        }
    }

    /// Directory holding the cached audio files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Try to retrieve the audio file for `key`. Returns `None` if not
    /// indexed or if the indexed file has disappeared out-of-band.
    pub async fn get(&self, key: &str) -> Option<PathBuf> {
        let path = {
            let index = self.index.read().await;
            index.get(key).cloned()
        }?;
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Some(path);
        }
        warn!(key, path = %path.display(), "cached file missing, evicting index entry");
        self.index.write().await.remove(key);
        None
    }

    /// Copy `source` into the cache under `key` and index the result,
    /// returning the final path.
    ///
    /// Safe against duplicate puts for the same key: the copy lands in a
    /// uniquely named staging file inside the cache directory, then is
    /// renamed over the final name. Readers only ever observe a complete
    /// file and the last writer wins.
    pub async fn put(&self, key: &str, source: &Path) -> Result<PathBuf, SpeechError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let final_path = self.dir.join(format!("{key}.{AUDIO_EXT}"));
        let staging = self
            .dir
            .join(format!("{key}.{}.part", uuid::Uuid::new_v4()));

        tokio::fs::copy(source, &staging).await?;
        if let Err(e) = tokio::fs::rename(&staging, &final_path).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e.into());
        }

        self.index
            .write()
            .await
            .insert(key.to_string(), final_path.clone());
        debug!(key, path = %final_path.display(), "stored synthesized audio");
        Ok(final_path)
    }

    /// Delete the cache directory and forget every entry. Idempotent.
    pub async fn clear(&self) -> Result<(), SpeechError> {
        self.index.write().await.clear();
        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Number of indexed entries.
    pub async fn len(&self) -> usize {
        self.index.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.index.read().await.is_empty()
    }
}
