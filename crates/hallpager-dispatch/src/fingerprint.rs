//! File-based fingerprint store — remembers which calls already went out.
//!
//! One `fingerprint|unix_seconds` line per delivery, appended under an
//! exclusive advisory lock and rewritten on cleanup. Every I/O failure is
//! logged and swallowed: a broken store means an occasional duplicate page,
//! never an aborted tick.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use hallpager_core::config::{StoreConfig, expand_path};
use hallpager_core::{TalkEvent, Variant};
use sha2::{Digest, Sha256};

/// Hex chars kept from the SHA-256 digest.
const FINGERPRINT_LEN: usize = 16;

/// Dedup key of one call: talk identity plus variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Derive the fingerprint of `talk`'s `variant` call.
    pub fn compute(talk: &TalkEvent, variant: Variant) -> Self {
        let mut hasher = Sha256::new();
        for part in [
            talk.id.as_str(),
            talk.start_time.as_str(),
            talk.room.as_str(),
            variant.tag(),
        ] {
            hasher.update(part.as_bytes());
            hasher.update([0x1f]);
        }
        let digest = hex::encode(hasher.finalize());
        Self(digest[..FINGERPRINT_LEN].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Fingerprint {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Persisted set of delivered fingerprints with a retention horizon.
pub struct FingerprintStore {
    path: PathBuf,
    entries: HashMap<String, i64>,
    retention_secs: i64,
    max_bytes: u64,
}

impl FingerprintStore {
    /// Open the store at `path`, loading whatever is readable.
    pub fn open(path: &Path, retention_secs: u64, max_bytes: u64) -> Self {
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!("⚠️ Cannot create store dir {}: {e}", parent.display());
            }
        }
        let entries = match std::fs::read_to_string(path) {
            Ok(content) => parse_lines(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                tracing::warn!("⚠️ Failed to read fingerprint store {}: {e}", path.display());
                HashMap::new()
            }
        };
        tracing::debug!("💾 Loaded {} fingerprints from {}", entries.len(), path.display());
        Self {
            path: path.to_path_buf(),
            entries,
            retention_secs: retention_secs.min(i64::MAX as u64) as i64,
            max_bytes,
        }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self::open(&expand_path(&config.path), config.retention_secs, config.max_bytes)
    }

    /// Number of fingerprints currently held in memory.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True if `fingerprint` was delivered within the retention horizon.
    /// An expired entry is evicted on the spot.
    pub fn is_duplicate(&mut self, fingerprint: &Fingerprint, now: DateTime<Utc>) -> bool {
        let Some(&seen) = self.entries.get(fingerprint.as_str()) else {
            return false;
        };
        if self.is_expired(seen, now) {
            self.entries.remove(fingerprint.as_str());
            tracing::debug!("⌛ Fingerprint {fingerprint} expired, evicted");
            return false;
        }
        true
    }

    /// Record a delivery. Re-marking refreshes the timestamp.
    pub fn mark_sent(&mut self, fingerprint: &Fingerprint, now: DateTime<Utc>) {
        let ts = now.timestamp();
        self.entries.insert(fingerprint.as_str().to_string(), ts);
        if let Err(e) = self.append_line(fingerprint.as_str(), ts) {
            tracing::warn!("⚠️ Failed to persist fingerprint {fingerprint}: {e}");
        }
    }

    /// Drop expired entries and rewrite the file. If the file has grown past
    /// the byte cap it is reset entirely. Returns how many entries were dropped.
    pub fn cleanup(&mut self, now: DateTime<Utc>) -> usize {
        match self.rewrite(now) {
            Ok(removed) => removed,
            Err(e) => {
                tracing::warn!("⚠️ Fingerprint cleanup failed: {e}");
                self.drop_stale(now)
            }
        }
    }

    fn is_expired(&self, seen: i64, now: DateTime<Utc>) -> bool {
        is_stale(seen, now.timestamp(), self.retention_secs)
    }

    fn drop_stale(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        let retention = self.retention_secs;
        let now = now.timestamp();
        self.entries.retain(|_, seen| !is_stale(*seen, now, retention));
        before - self.entries.len()
    }

    fn append_line(&self, fingerprint: &str, ts: i64) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.lock_exclusive()?;
        let result = writeln!(file, "{fingerprint}|{ts}").and_then(|_| file.flush());
        FileExt::unlock(&file)?;
        result
    }

    fn rewrite(&mut self, now: DateTime<Utc>) -> std::io::Result<usize> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&self.path)?;
        file.lock_exclusive()?;
        let result = self.rewrite_locked(&mut file, now);
        FileExt::unlock(&file)?;
        result
    }

    fn rewrite_locked(&mut self, file: &mut File, now: DateTime<Utc>) -> std::io::Result<usize> {
        let size = file.metadata()?.len();
        if size > self.max_bytes {
            let dropped = self.entries.len();
            file.set_len(0)?;
            self.entries.clear();
            tracing::warn!(
                "🧹 Fingerprint store {} is {} bytes (cap {}), reset",
                self.path.display(),
                size,
                self.max_bytes
            );
            return Ok(dropped);
        }

        // Pick up lines another invocation may have appended since we loaded.
        let mut content = String::new();
        file.read_to_string(&mut content)?;
        for (fingerprint, seen) in parse_lines(&content) {
            let slot = self.entries.entry(fingerprint).or_insert(seen);
            *slot = (*slot).max(seen);
        }

        let removed = self.drop_stale(now);

        let mut sorted: Vec<(&String, &i64)> = self.entries.iter().collect();
        sorted.sort_by(|a, b| a.1.cmp(b.1).then_with(|| a.0.cmp(b.0)));
        let mut out = String::with_capacity(sorted.len() * (FINGERPRINT_LEN + 12));
        for (fingerprint, seen) in sorted {
            out.push_str(fingerprint);
            out.push('|');
            out.push_str(&seen.to_string());
            out.push('\n');
        }

        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(out.as_bytes())?;
        file.flush()?;

        if removed > 0 {
            tracing::info!("🧹 Purged {removed} expired fingerprints ({} kept)", self.entries.len());
        }
        Ok(removed)
    }
}

/// Older than the retention horizon, or stamped further than that ahead of
/// `now` (clock skew, damaged line).
fn is_stale(seen: i64, now: i64, retention: i64) -> bool {
    let age = now.saturating_sub(seen);
    age > retention || age < retention.saturating_neg()
}

/// Parse `fingerprint|unix_seconds` lines; malformed lines are skipped and
/// the newest timestamp wins for repeated keys.
fn parse_lines(content: &str) -> HashMap<String, i64> {
    let mut entries = HashMap::new();
    for line in content.lines() {
        let Some((fingerprint, ts)) = line.trim().split_once('|') else {
            continue;
        };
        let fingerprint = fingerprint.trim();
        let Ok(ts) = ts.trim().parse::<i64>() else {
            continue;
        };
        if fingerprint.is_empty() || ts < 0 {
            continue;
        }
        let slot = entries.entry(fingerprint.to_string()).or_insert(ts);
        *slot = (*slot).max(ts);
    }
    entries
}
