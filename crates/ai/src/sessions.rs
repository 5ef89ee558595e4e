//! Registry of shared chat sessions.
//!
//! Each session sits behind its own async mutex. A send holds the lock for
//! the whole stream, and a second send on the same session is rejected with
//! `SessionBusy` instead of queueing behind it. Reads never take that lock:
//! they return the snapshot published when the lock was last released.
//!
//! Sessions idle past the TTL are dropped when a new one is created. When the
//! registry is full, the least recently used idle session makes room.

use log::{debug, info};
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::backend::ChatBackend;
use crate::chat::{ChatSession, ChatSessionConfig, ChatSessionSnapshot};
use crate::error::AiError;

pub const DEFAULT_MAX_SESSIONS: usize = 1_000;
pub const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(60 * 60);

// ============================================================================
// Registry Entries
// ============================================================================

struct Settled {
    snapshot: ChatSessionSnapshot,
    touched_at: Instant,
    /// Registry-wide use counter; lower means less recently used.
    sequence: u64,
}

struct SessionEntry<B: ChatBackend + ?Sized> {
    session: Arc<Mutex<ChatSession<B>>>,
    settled: Arc<RwLock<Settled>>,
}

impl<B: ChatBackend + ?Sized> SessionEntry<B> {
    /// Held by a guard or about to be.
    fn is_busy(&self) -> bool {
        Arc::strong_count(&self.session) > 1
    }

    fn is_idle(&self, now: Instant, ttl: Duration) -> bool {
        self.settled
            .read()
            .map(|s| now.duration_since(s.touched_at) >= ttl)
            .unwrap_or(false)
    }

    fn sequence(&self) -> u64 {
        self.settled.read().map(|s| s.sequence).unwrap_or(u64::MAX)
    }
}

impl<B: ChatBackend + ?Sized> Clone for SessionEntry<B> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
            settled: self.settled.clone(),
        }
    }
}

/// Exclusive access to one session.
///
/// Dropping the guard publishes the session's current snapshot for readers.
pub struct SessionGuard<B: ChatBackend + ?Sized> {
    session: OwnedMutexGuard<ChatSession<B>>,
    settled: Arc<RwLock<Settled>>,
    clock: Arc<AtomicU64>,
}

impl<B: ChatBackend + ?Sized> Deref for SessionGuard<B> {
    type Target = ChatSession<B>;

    fn deref(&self) -> &ChatSession<B> {
        &self.session
    }
}

impl<B: ChatBackend + ?Sized> DerefMut for SessionGuard<B> {
    fn deref_mut(&mut self) -> &mut ChatSession<B> {
        &mut self.session
    }
}

impl<B: ChatBackend + ?Sized> Drop for SessionGuard<B> {
    fn drop(&mut self) {
        let snapshot = self.session.snapshot();
        if let Ok(mut settled) = self.settled.write() {
            settled.snapshot = snapshot;
            settled.touched_at = Instant::now();
            settled.sequence = self.clock.fetch_add(1, Ordering::Relaxed);
        }
    }
}

// ============================================================================
// Chat Sessions
// ============================================================================

pub struct ChatSessions<B: ChatBackend + ?Sized> {
    backend: Arc<B>,
    config: Arc<ChatSessionConfig>,
    sessions: RwLock<HashMap<String, SessionEntry<B>>>,
    clock: Arc<AtomicU64>,
    max_sessions: usize,
    idle_ttl: Duration,
}

impl<B: ChatBackend + ?Sized> ChatSessions<B> {
    pub fn new(backend: Arc<B>, config: ChatSessionConfig) -> Self {
        Self {
            backend,
            config: Arc::new(config),
            sessions: RwLock::new(HashMap::new()),
            clock: Arc::new(AtomicU64::new(0)),
            max_sessions: DEFAULT_MAX_SESSIONS,
            idle_ttl: DEFAULT_IDLE_TTL,
        }
    }

    /// Cap the number of sessions and how long an untouched one survives.
    pub fn with_limits(mut self, max_sessions: usize, idle_ttl: Duration) -> Self {
        self.max_sessions = max_sessions.max(1);
        self.idle_ttl = idle_ttl;
        self
    }

    /// Create an active session and return its initial view.
    pub fn create(&self) -> Result<ChatSessionSnapshot, AiError> {
        let session = ChatSession::create(self.backend.clone(), self.config.clone());
        let snapshot = session.snapshot();
        let entry = SessionEntry {
            session: Arc::new(Mutex::new(session)),
            settled: Arc::new(RwLock::new(Settled {
                snapshot: snapshot.clone(),
                touched_at: Instant::now(),
                sequence: self.clock.fetch_add(1, Ordering::Relaxed),
            })),
        };

        let mut sessions = self
            .sessions
            .write()
            .map_err(|e| AiError::internal(e.to_string()))?;
        self.evict(&mut sessions);
        sessions.insert(snapshot.id.clone(), entry);
        info!("Created chat session {}", snapshot.id);
        Ok(snapshot)
    }

    /// Drop idle sessions, then least recently used ones until there is room.
    /// Busy sessions are never dropped, so the cap can be exceeded briefly.
    fn evict(&self, sessions: &mut HashMap<String, SessionEntry<B>>) {
        let now = Instant::now();
        sessions.retain(|id, entry| {
            let keep = entry.is_busy() || !entry.is_idle(now, self.idle_ttl);
            if !keep {
                debug!("Dropping idle chat session {}", id);
            }
            keep
        });

        while sessions.len() >= self.max_sessions {
            let oldest = sessions
                .iter()
                .filter(|(_, entry)| !entry.is_busy())
                .min_by_key(|(_, entry)| entry.sequence())
                .map(|(id, _)| id.clone());
            match oldest {
                Some(id) => {
                    sessions.remove(&id);
                    info!("Evicted least recently used chat session {}", id);
                }
                None => break,
            }
        }
    }

    fn entry(&self, id: &str) -> Result<SessionEntry<B>, AiError> {
        self.sessions
            .read()
            .map_err(|e| AiError::internal(e.to_string()))?
            .get(id)
            .cloned()
            .ok_or_else(|| AiError::SessionNotFound(id.to_string()))
    }

    /// Take exclusive ownership of a session, failing if it is in use.
    pub fn acquire(&self, id: &str) -> Result<SessionGuard<B>, AiError> {
        let entry = self.entry(id)?;
        let session = entry
            .session
            .try_lock_owned()
            .map_err(|_| AiError::SessionBusy(id.to_string()))?;
        Ok(SessionGuard {
            session,
            settled: entry.settled,
            clock: self.clock.clone(),
        })
    }

    /// Last settled view of a session. While a reply streams, the turns of
    /// that exchange are not included yet.
    pub fn snapshot(&self, id: &str) -> Result<ChatSessionSnapshot, AiError> {
        let entry = self.entry(id)?;
        let settled = entry
            .settled
            .read()
            .map_err(|e| AiError::internal(e.to_string()))?;
        Ok(settled.snapshot.clone())
    }

    pub fn reset(&self, id: &str) -> Result<ChatSessionSnapshot, AiError> {
        let mut session = self.acquire(id)?;
        session.reset();
        Ok(session.snapshot())
    }

    /// Forget a session. A stream in flight keeps its own handle and finishes.
    pub fn remove(&self, id: &str) -> Result<(), AiError> {
        let removed = self
            .sessions
            .write()
            .map_err(|e| AiError::internal(e.to_string()))?
            .remove(id);
        match removed {
            Some(_) => {
                info!("Removed chat session {}", id);
                Ok(())
            }
            None => Err(AiError::SessionNotFound(id.to_string())),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions
            .read()
            .map(|s| s.contains_key(id))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
