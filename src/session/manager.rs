use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::AuthError;
use crate::indexers::IndexerProfile;
use crate::session::auth::Authenticate;
use crate::session::store::{SessionArtifact, SessionStore};

/// Per-site coordination: an async gate serializing logins plus the
/// invalidation flag flipped when a fetch sees the session rejected.
struct SiteSlot {
    gate: tokio::sync::Mutex<()>,
    invalidated: AtomicBool,
}

/// Session status snapshot for the /status endpoint
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub authenticated: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub last_validated: Option<DateTime<Utc>>,
}

/// Owns the lifecycle of every site session.
///
/// `ensure_session` returns a session that was valid at call time, logging
/// in when the stored artifact is stale, absent or marked invalid. The
/// per-site gate is held only across the validity check and the login
/// itself, never across fetch or parse, so unrelated reads are not blocked
/// by a slow page.
pub struct SessionManager<A: Authenticate> {
    store: SessionStore,
    auth: A,
    ttl: Duration,
    slots: Mutex<HashMap<String, Arc<SiteSlot>>>,
    cache: Mutex<HashMap<String, SessionArtifact>>,
}

impl<A: Authenticate> SessionManager<A> {
    pub fn new(store: SessionStore, auth: A, ttl_hours: i64) -> Self {
        Self {
            store,
            auth,
            ttl: Duration::hours(ttl_hours),
            slots: Mutex::new(HashMap::new()),
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self, indexer: &str) -> Arc<SiteSlot> {
        let mut slots = self.slots.lock().unwrap();
        slots
            .entry(indexer.to_string())
            .or_insert_with(|| {
                Arc::new(SiteSlot {
                    gate: tokio::sync::Mutex::new(()),
                    invalidated: AtomicBool::new(false),
                })
            })
            .clone()
    }

    /// Cached artifact, falling back to the on-disk store once
    fn current(&self, indexer: &str) -> Option<SessionArtifact> {
        let mut cache = self.cache.lock().unwrap();
        if let Some(artifact) = cache.get(indexer) {
            return Some(artifact.clone());
        }
        let artifact = self.store.load(indexer)?;
        cache.insert(indexer.to_string(), artifact.clone());
        Some(artifact)
    }

    fn is_fresh(&self, artifact: &SessionArtifact) -> bool {
        artifact.age() < self.ttl
    }

    /// Return a session guaranteed valid at call time.
    ///
    /// A valid artifact is returned without any I/O. Stale, absent or
    /// invalidated sessions trigger exactly one login; concurrent callers
    /// for the same site wait on the gate and reuse the result.
    pub async fn ensure_session(
        &self,
        profile: &IndexerProfile,
    ) -> Result<SessionArtifact, AuthError> {
        let slot = self.slot(&profile.id);
        let _guard = slot.gate.lock().await;

        if !slot.invalidated.load(Ordering::SeqCst) {
            if let Some(artifact) = self.current(&profile.id) {
                if self.is_fresh(&artifact) {
                    log::debug!("Using existing session for {}", profile.id);
                    return Ok(artifact);
                }
                log::info!("Session for {} is stale, re-authenticating", profile.id);
            }
        }

        self.login_locked(profile, &slot).await
    }

    /// Flag the site's session as rejected. Called by the fetch layer when
    /// a response turns out to be a login page; the next `ensure_session`
    /// will re-authenticate.
    pub fn mark_invalid(&self, indexer: &str) {
        log::warn!("Marking session for {} as invalid", indexer);
        self.slot(indexer).invalidated.store(true, Ordering::SeqCst);
    }

    /// Invalidate and re-authenticate regardless of current validity.
    /// Used by the renewal scheduler and by the expired-session retry path.
    pub async fn force_refresh(
        &self,
        profile: &IndexerProfile,
    ) -> Result<SessionArtifact, AuthError> {
        let slot = self.slot(&profile.id);
        let _guard = slot.gate.lock().await;
        log::info!("Force refreshing session for {}", profile.id);
        self.login_locked(profile, &slot).await
    }

    /// Drop the site's artifact entirely (cache and disk)
    pub fn forget(&self, indexer: &str) {
        self.cache.lock().unwrap().remove(indexer);
        self.store.delete(indexer);
        self.slot(indexer).invalidated.store(true, Ordering::SeqCst);
    }

    pub fn status(&self, indexer: &str) -> SessionStatus {
        let invalidated = self.slot(indexer).invalidated.load(Ordering::SeqCst);
        match self.current(indexer) {
            Some(artifact) => SessionStatus {
                authenticated: !invalidated && self.is_fresh(&artifact),
                created_at: Some(artifact.created_at),
                last_validated: Some(artifact.last_validated),
            },
            None => SessionStatus {
                authenticated: false,
                created_at: None,
                last_validated: None,
            },
        }
    }

    /// Runs with the site gate already held by the caller
    async fn login_locked(
        &self,
        profile: &IndexerProfile,
        slot: &SiteSlot,
    ) -> Result<SessionArtifact, AuthError> {
        let artifact = self.auth.login(profile).await?;

        if let Err(e) = self.store.save(&artifact) {
            log::error!("Failed to persist session for {}: {}", profile.id, e);
        }
        self.cache
            .lock()
            .unwrap()
            .insert(profile.id.clone(), artifact.clone());
        slot.invalidated.store(false, Ordering::SeqCst);

        Ok(artifact)
    }
}
