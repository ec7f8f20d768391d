//! Hit storage for the beacon.
//!
//! Only hits inside the summary window are kept in memory. When a path is
//! configured, every hit is also appended to a JSON-lines log, which keeps
//! the full history across restarts.

use std::collections::{BTreeMap, VecDeque};
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};

/// Length of the window `summary` counts over.
pub const SUMMARY_WINDOW_SECS: f64 = 24.0 * 60.0 * 60.0;

/// One recorded page view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    pub domain: String,
    pub path: String,
    /// Seconds since the Unix epoch
    pub time: f64,
}

/// Hit counts keyed by domain, then path.
pub type Summary = BTreeMap<String, BTreeMap<String, u64>>;

/// Append handle plus the length of the last complete line.
struct HitLog {
    file: File,
    len: u64,
}

impl HitLog {
    /// Appends one line, cutting the file back to its previous length if
    /// the write fails partway.
    async fn append(&mut self, line: &[u8]) -> anyhow::Result<()> {
        let written = async {
            self.file.write_all(line).await?;
            self.file.flush().await
        }
        .await;

        if let Err(e) = written {
            if let Err(trunc) = self.file.set_len(self.len).await {
                tracing::warn!(error = %trunc, "Failed to roll back partial hit");
            }
            return Err(e).context("Failed to append hit");
        }

        self.len += line.len() as u64;
        Ok(())
    }
}

pub struct HitStore {
    /// Hits in roughly arrival order
    hits: RwLock<VecDeque<Hit>>,
    log: Option<Mutex<HitLog>>,
}

impl HitStore {
    pub fn in_memory() -> Self {
        Self {
            hits: RwLock::new(VecDeque::new()),
            log: None,
        }
    }

    /// Opens the log at `path`, creating it if absent, and loads the hits
    /// recorded in the last 24 hours.
    ///
    /// Lines that fail to parse are skipped with a warning.
    pub async fn open(path: &Path) -> anyhow::Result<Self> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .with_context(|| format!("Failed to open hit log {}", path.display()))?;

        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read hit log {}", path.display()))?;

        let cutoff = super::unix_now() - SUMMARY_WINDOW_SECS;
        let mut hits = VecDeque::new();
        for (number, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<Hit>(line) {
                Ok(hit) if hit.time >= cutoff => hits.push_back(hit),
                Ok(_) => {}
                Err(e) => tracing::warn!(
                    log = %path.display(),
                    line = number + 1,
                    error = %e,
                    "Skipping unreadable hit"
                ),
            }
        }

        // Terminate a torn last line so the next hit starts on its own
        let mut len = raw.len() as u64;
        if !raw.is_empty() && !raw.ends_with('\n') {
            file.write_all(b"\n")
                .await
                .with_context(|| format!("Failed to repair hit log {}", path.display()))?;
            file.flush().await?;
            len += 1;
        }

        tracing::info!(log = %path.display(), hits = hits.len(), "Hit log loaded");

        Ok(Self {
            hits: RwLock::new(hits),
            log: Some(Mutex::new(HitLog { file, len })),
        })
    }

    /// Stores a hit and drops in-memory hits that fell out of the window
    /// ending at the hit's time.
    pub async fn record(&self, hit: Hit) -> anyhow::Result<()> {
        if let Some(log) = &self.log {
            let mut line = serde_json::to_vec(&hit).context("Failed to encode hit")?;
            line.push(b'\n');
            log.lock().await.append(&line).await?;
        }

        let cutoff = hit.time - SUMMARY_WINDOW_SECS;
        let mut hits = self.hits.write().await;
        hits.push_back(hit);
        prune(&mut hits, cutoff);
        Ok(())
    }

    /// Number of hits held in memory.
    pub async fn len(&self) -> usize {
        self.hits.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Counts hits per domain and path over the 24 hours before `now`.
    pub async fn summary(&self, now: f64) -> Summary {
        let since = now - SUMMARY_WINDOW_SECS;
        let mut hits = self.hits.write().await;
        prune(&mut hits, since);

        let mut summary = Summary::new();
        for hit in hits.iter().filter(|h| h.time >= since) {
            *summary
                .entry(hit.domain.clone())
                .or_default()
                .entry(hit.path.clone())
                .or_default() += 1;
        }

        summary
    }
}

// Hits arrive in time order, so expired ones collect at the front. A stray
// older hit further back is still excluded by the summary filter.
fn prune(hits: &mut VecDeque<Hit>, cutoff: f64) {
    while hits.front().is_some_and(|h| h.time < cutoff) {
        hits.pop_front();
    }
}
