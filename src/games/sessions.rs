//! In-memory store for multi-step games.
//!
//! Each session sits behind its own mutex, and every operation holds that
//! lock from the first read to the final write. A finished session is
//! removed while the lock is still held. A request that was queued on the
//! same lock then finds it closed and gets `NotFound`, so a round can only
//! be settled once.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::Instant;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Session not found")]
    NotFound,
    #[error("Session belongs to another user")]
    Forbidden,
}

pub struct Session<S> {
    pub owner: String,
    pub state: S,
    touched_at: Instant,
    closed: bool,
}

pub struct SessionStore<S> {
    sessions: Arc<DashMap<Uuid, Arc<Mutex<Session<S>>>>>,
    ttl: Duration,
}

impl<S> Clone for SessionStore<S> {
    fn clone(&self) -> Self {
        SessionStore {
            sessions: self.sessions.clone(),
            ttl: self.ttl,
        }
    }
}

impl<S: Send + 'static> SessionStore<S> {
    pub fn new(ttl: Duration) -> Self {
        SessionStore {
            sessions: Arc::new(DashMap::new()),
            ttl,
        }
    }

    pub fn insert(&self, owner: &str, state: S) -> Uuid {
        let id = Uuid::new_v4();
        let session = Session {
            owner: owner.to_string(),
            state,
            touched_at: Instant::now(),
            closed: false,
        };
        self.sessions.insert(id, Arc::new(Mutex::new(session)));
        id
    }

    pub async fn lock(&self, id: Uuid, owner: &str) -> Result<SessionGuard<S>, SessionError> {
        // The map shard guard must not be held across the await below.
        let session = self
            .sessions
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(SessionError::NotFound)?;

        let mut guard = session.lock_owned().await;
        if guard.closed {
            return Err(SessionError::NotFound);
        }
        if guard.owner != owner {
            return Err(SessionError::Forbidden);
        }
        guard.touched_at = Instant::now();

        Ok(SessionGuard {
            id,
            guard,
            sessions: self.sessions.clone(),
        })
    }

    /// Ids of the open sessions owned by `owner`.
    pub async fn owned_by(&self, owner: &str) -> Vec<Uuid> {
        let candidates: Vec<(Uuid, Arc<Mutex<Session<S>>>)> = self
            .sessions
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        let mut ids = Vec::new();
        for (id, session) in candidates {
            let session = session.lock().await;
            if !session.closed && session.owner == owner {
                ids.push(id);
            }
        }
        ids
    }

    /// Drops every session idle for longer than the TTL and returns the
    /// `(id, owner)` pairs that were evicted. Sessions busy in a request are kept.
    pub fn sweep(&self) -> Vec<(Uuid, String)> {
        let mut evicted = Vec::new();
        self.sessions.retain(|id, session| match session.try_lock() {
            Ok(mut session) => {
                if session.touched_at.elapsed() < self.ttl {
                    true
                } else {
                    session.closed = true;
                    evicted.push((*id, session.owner.clone()));
                    false
                }
            }
            Err(_) => true,
        });
        evicted
    }

    pub fn start_sweeper(&self, game: &'static str, every: Duration) {
        let store = self.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);

            loop {
                interval.tick().await;

                for (id, owner) in store.sweep() {
                    log::warn!("Expired {} session {} of user {}.", game, id, owner);
                }
            }
        });

        log::info!("{} session sweeper started", game);
    }
}

/// Exclusive access to one session for the duration of a request.
pub struct SessionGuard<S> {
    id: Uuid,
    guard: OwnedMutexGuard<Session<S>>,
    sessions: Arc<DashMap<Uuid, Arc<Mutex<Session<S>>>>>,
}

impl<S> SessionGuard<S> {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> &S {
        &self.guard.state
    }

    pub fn replace(&mut self, state: S) {
        self.guard.state = state;
    }

    /// Closes the session for good. Waiters on the same lock see `NotFound`.
    pub fn finish(mut self) {
        self.guard.closed = true;
        self.sessions.remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lock_checks_owner() {
        let store = SessionStore::new(Duration::from_secs(60));
        let id = store.insert("ana", 1u32);

        assert_eq!(*store.lock(id, "ana").await.unwrap().state(), 1);
        assert_eq!(store.lock(id, "luis").await.err(), Some(SessionError::Forbidden));
        assert_eq!(
            store.lock(Uuid::new_v4(), "ana").await.err(),
            Some(SessionError::NotFound)
        );
    }

    #[tokio::test]
    async fn test_replace_persists_between_locks() {
        let store = SessionStore::new(Duration::from_secs(60));
        let id = store.insert("ana", 1u32);

        let mut guard = store.lock(id, "ana").await.unwrap();
        guard.replace(5);
        drop(guard);

        assert_eq!(*store.lock(id, "ana").await.unwrap().state(), 5);
    }

    #[tokio::test]
    async fn test_waiter_sees_finished_session_as_gone() {
        let store = SessionStore::new(Duration::from_secs(60));
        let id = store.insert("ana", 0u32);

        let guard = store.lock(id, "ana").await.unwrap();
        let waiter = {
            let store = store.clone();
            tokio::spawn(async move { store.lock(id, "ana").await.map(|g| *g.state()) })
        };
        tokio::task::yield_now().await;

        guard.finish();
        assert_eq!(waiter.await.unwrap(), Err(SessionError::NotFound));
        assert_eq!(store.sessions.len(), 0);
    }

    #[tokio::test]
    async fn test_sweep_evicts_idle_sessions() {
        let store = SessionStore::new(Duration::ZERO);
        store.insert("ana", ());
        store.insert("luis", ());

        let mut evicted = store.sweep();
        evicted.sort_by(|a, b| a.1.cmp(&b.1));
        assert_eq!(evicted.len(), 2);
        assert_eq!(evicted[0].1, "ana");
        assert_eq!(store.sessions.len(), 0);

        let store = SessionStore::new(Duration::from_secs(3600));
        store.insert("ana", ());
        assert!(store.sweep().is_empty());
        assert_eq!(store.sessions.len(), 1);
    }

    #[tokio::test]
    async fn test_owned_by() {
        let store = SessionStore::new(Duration::from_secs(60));
        let a = store.insert("ana", ());
        store.insert("luis", ());

        assert_eq!(store.owned_by("ana").await, vec![a]);
    }
}
