//! Delivery fingerprints and the store that remembers which ones went out.
//!
//! A fingerprint is the SHA-256 of an item's canonical identity. It is committed
//! only after the notification was confirmed delivered, so a failed send stays
//! eligible for the next run.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::ingest::types::FeedItem;

/// Which item fields make up the identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FingerprintMode {
    /// Same headline under a different link is a different disclosure.
    #[default]
    TitleAndLink,
    /// Same headline is the same disclosure, whatever the link.
    TitleOnly,
}

impl FingerprintMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "title_link" | "title+link" | "title_and_link" => Some(Self::TitleAndLink),
            "title" | "title_only" => Some(Self::TitleOnly),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn fingerprint(item: &FeedItem, mode: FingerprintMode) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(item.title.trim().as_bytes());
    if mode == FingerprintMode::TitleAndLink {
        hasher.update(b"\n");
        hasher.update(item.link.trim().as_bytes());
    }
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for b in digest.iter() {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    Fingerprint(out)
}

pub trait FingerprintStore: Send + Sync {
    fn seen(&self, fp: &Fingerprint) -> bool;
    fn commit(&mut self, fp: Fingerprint) -> Result<()>;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-lifetime store.
#[derive(Debug, Default)]
pub struct MemoryFingerprintStore {
    seen: HashSet<Fingerprint>,
}

impl MemoryFingerprintStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FingerprintStore for MemoryFingerprintStore {
    fn seen(&self, fp: &Fingerprint) -> bool {
        self.seen.contains(fp)
    }

    fn commit(&mut self, fp: Fingerprint) -> Result<()> {
        self.seen.insert(fp);
        Ok(())
    }

    fn len(&self) -> usize {
        self.seen.len()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredLine {
    fp: Fingerprint,
    ts: chrono::DateTime<chrono::Utc>,
}

/// Same semantics as [`MemoryFingerprintStore`], backed by a JSON-lines file so
/// delivered items survive a restart.
pub struct FileFingerprintStore {
    path: PathBuf,
    mem: MemoryFingerprintStore,
    file: File,
}

impl FileFingerprintStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating {}", dir.display()))?;
        }

        let mut mem = MemoryFingerprintStore::new();
        if path.exists() {
            let f = File::open(&path).with_context(|| format!("opening {}", path.display()))?;
            for (n, line) in BufReader::new(f).lines().enumerate() {
                let line = line.with_context(|| format!("reading {}", path.display()))?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<StoredLine>(&line) {
                    Ok(s) => {
                        mem.seen.insert(s.fp);
                    }
                    Err(e) => {
                        tracing::warn!(
                            target: "fingerprint",
                            path = %path.display(),
                            line = n + 1,
                            error = %e,
                            "skipping malformed fingerprint line"
                        );
                    }
                }
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening {} for append", path.display()))?;

        tracing::info!(
            target: "fingerprint",
            path = %path.display(),
            loaded = mem.len(),
            "fingerprint store opened"
        );
        Ok(Self { path, mem, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FingerprintStore for FileFingerprintStore {
    fn seen(&self, fp: &Fingerprint) -> bool {
        self.mem.seen(fp)
    }

    /// The in-memory entry is kept even if the append fails; the delivery already happened.
    fn commit(&mut self, fp: Fingerprint) -> Result<()> {
        if self.mem.seen(&fp) {
            return Ok(());
        }
        let line = serde_json::to_string(&StoredLine {
            fp: fp.clone(),
            ts: chrono::Utc::now(),
        })?;
        self.mem.commit(fp)?;
        writeln!(self.file, "{line}")
            .and_then(|_| self.file.flush())
            .with_context(|| format!("appending to {}", self.path.display()))
    }

    fn len(&self) -> usize {
        self.mem.len()
    }
}
