//! Per-session turn tracking.
//!
//! Turns are counted in memory, or in one small marker file per session when
//! every hook call runs in its own process. A session is forgotten when it
//! ends, when it has been idle longer than the TTL, or when the in-memory
//! table is full and it is the least recently seen.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime};

use dashmap::DashMap;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

/// Sessions kept in memory before the least recently seen is evicted.
pub const MAX_TRACKED_SESSIONS: usize = 4096;

/// Idle time after which a session's turn count is discarded.
pub const SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy)]
struct TurnState {
    next: u32,
    seen: Instant,
    tick: u64,
}

/// Counts prompt builds per session key.
#[derive(Debug)]
pub struct SessionTracker {
    turns: DashMap<String, TurnState>,
    clock: AtomicU64,
    capacity: usize,
    ttl: Duration,
    markers: Option<PathBuf>,
}

impl Default for SessionTracker {
    fn default() -> Self {
        Self {
            turns: DashMap::new(),
            clock: AtomicU64::new(0),
            capacity: MAX_TRACKED_SESSIONS,
            ttl: SESSION_TTL,
            markers: None,
        }
    }
}

impl SessionTracker {
    /// Create an empty in-memory tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep turn counts as marker files under `dir` so separate processes
    /// share them. Stale markers are pruned on open.
    pub fn persistent(dir: impl Into<PathBuf>) -> Self {
        let tracker = Self {
            markers: Some(dir.into()),
            ..Self::default()
        };
        tracker.prune();
        tracker
    }

    /// Cap on sessions held in memory.
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Idle time after which a session starts over at turn 0.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Record a prompt build and return its 0-based turn index.
    pub fn begin_turn(&self, session_key: &str) -> u32 {
        if let Some(dir) = &self.markers {
            match begin_marked_turn(dir, session_key) {
                Ok(turn) => return turn,
                Err(error) => warn!(%error, "session marker unavailable, counting in memory"),
            }
        }
        self.begin_in_memory(session_key)
    }

    fn begin_in_memory(&self, session_key: &str) -> u32 {
        let now = Instant::now();
        if !self.turns.contains_key(session_key) {
            self.evict(now);
        }
        let tick = self.clock.fetch_add(1, Ordering::Relaxed);
        let mut state = self
            .turns
            .entry(session_key.to_string())
            .or_insert(TurnState {
                next: 0,
                seen: now,
                tick,
            });
        if now.duration_since(state.seen) > self.ttl {
            state.next = 0;
        }
        let turn = state.next;
        state.next = turn.saturating_add(1);
        state.seen = now;
        state.tick = tick;
        turn
    }

    /// Drop idle sessions, then the least recently seen while full.
    fn evict(&self, now: Instant) {
        self.turns
            .retain(|_, state| now.duration_since(state.seen) <= self.ttl);
        while self.turns.len() >= self.capacity {
            let oldest = self
                .turns
                .iter()
                .min_by_key(|entry| entry.value().tick)
                .map(|entry| entry.key().clone());
            let Some(key) = oldest else {
                break;
            };
            let _ = self.turns.remove(&key);
            debug!(session_key = %key, "evicted least recently seen session");
        }
    }

    /// Discard idle sessions and stale marker files.
    pub fn prune(&self) {
        self.turns
            .retain(|_, state| state.seen.elapsed() <= self.ttl);
        if let Some(dir) = &self.markers {
            prune_markers(dir, self.ttl);
        }
    }

    /// Forget a session.
    pub fn end(&self, session_key: &str) {
        let _ = self.turns.remove(session_key);
        if let Some(dir) = &self.markers {
            match std::fs::remove_file(marker_path(dir, session_key)) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(error) => warn!(%error, "failed to remove session marker"),
            }
        }
    }

    /// Sessions currently held in memory.
    pub fn active(&self) -> usize {
        self.turns.len()
    }
}

fn marker_path(dir: &Path, session_key: &str) -> PathBuf {
    let digest = Sha256::digest(session_key.as_bytes());
    dir.join(format!("{digest:x}"))
}

fn begin_marked_turn(dir: &Path, session_key: &str) -> std::io::Result<u32> {
    std::fs::create_dir_all(dir)?;
    let path = marker_path(dir, session_key);
    let turn = match std::fs::read_to_string(&path) {
        // An unreadable count still means the session was seen.
        Ok(content) => content.trim().parse::<u32>().unwrap_or(1),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
        Err(e) => return Err(e),
    };
    std::fs::write(&path, turn.saturating_add(1).to_string())?;
    Ok(turn)
}

fn prune_markers(dir: &Path, ttl: Duration) {
    let Ok(read_dir) = std::fs::read_dir(dir) else {
        return;
    };
    let now = SystemTime::now();
    for entry in read_dir.flatten() {
        let stale = entry
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .is_some_and(|age| age > ttl);
        if stale {
            let _ = std::fs::remove_file(entry.path());
        }
    }
}
