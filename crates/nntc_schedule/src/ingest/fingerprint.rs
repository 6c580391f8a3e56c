//! Content fingerprints for detecting upstream document changes.
//!
//! The download server's `Last-Modified` header is missing or stale often
//! enough to be useless, so change detection hashes the full document.

use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// SHA-256 digest of a document.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn of(bytes: &[u8]) -> Self {
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&Sha256::digest(bytes));
        Self(digest)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Short form is enough to correlate log lines
        write!(f, "{}", &self.to_hex()[..12])
    }
}

mod hex {
    pub fn encode(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

/// Compares freshly downloaded bytes with the last successfully ingested
/// document, which is kept on disk at `ingested_path`.
///
/// Fingerprints installed by this process are also remembered in memory and
/// take precedence over the file, so a document whose copy could not be
/// written to `ingested_path` still counts as ingested.
#[derive(Debug)]
pub struct ChangeDetector {
    ingested_path: PathBuf,
    installed: Mutex<Option<Fingerprint>>,
}

impl ChangeDetector {
    pub fn new(ingested_path: impl Into<PathBuf>) -> Self {
        Self {
            ingested_path: ingested_path.into(),
            installed: Mutex::new(None),
        }
    }

    pub fn ingested_path(&self) -> &Path {
        &self.ingested_path
    }

    /// Records that the store now holds the document with `fingerprint`.
    pub fn mark_ingested(&self, fingerprint: Fingerprint) {
        if let Ok(mut installed) = self.installed.lock() {
            *installed = Some(fingerprint);
        }
    }

    /// Fingerprint of the last ingested document, if there is one.
    pub async fn previous(&self) -> std::io::Result<Option<Fingerprint>> {
        let installed = self.installed.lock().ok().and_then(|guard| *guard);
        if installed.is_some() {
            return Ok(installed);
        }

        match tokio::fs::read(&self.ingested_path).await {
            Ok(bytes) => Ok(Some(Fingerprint::of(&bytes))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// True unless `current` is byte-identical to the last ingested
    /// document. With nothing ingested yet, everything counts as changed.
    pub async fn has_changed(&self, current: &Fingerprint) -> std::io::Result<bool> {
        Ok(self.previous().await?.as_ref() != Some(current))
    }
}
