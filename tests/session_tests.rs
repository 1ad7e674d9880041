use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use trackrr::error::AuthError;
use trackrr::indexers::IndexerProfile;
use trackrr::session::{Authenticate, SessionArtifact, SessionManager, SessionStore, StoredCookie};

/// Counts logins and optionally dawdles so two callers can overlap
struct FakeAuthenticator {
    logins: Arc<AtomicUsize>,
    delay_ms: u64,
}

impl FakeAuthenticator {
    fn new(delay_ms: u64) -> (Self, Arc<AtomicUsize>) {
        let logins = Arc::new(AtomicUsize::new(0));
        (
            Self {
                logins: logins.clone(),
                delay_ms,
            },
            logins,
        )
    }
}

impl Authenticate for FakeAuthenticator {
    fn login(
        &self,
        profile: &IndexerProfile,
    ) -> impl Future<Output = Result<SessionArtifact, AuthError>> + Send {
        let logins = self.logins.clone();
        let delay = self.delay_ms;
        let indexer = profile.id.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(delay)).await;
            logins.fetch_add(1, Ordering::SeqCst);
            Ok(SessionArtifact::new(
                &indexer,
                vec![StoredCookie {
                    name: "laravel_session".to_string(),
                    value: format!("fresh-{}", logins.load(Ordering::SeqCst)),
                    domain: Some(".t.example".to_string()),
                    path: Some("/".to_string()),
                    expires: None,
                    secure: Some(true),
                    http_only: Some(true),
                }],
            ))
        }
    }
}

/// Always rejects, for the failure-propagation path
struct RejectingAuthenticator;

impl Authenticate for RejectingAuthenticator {
    fn login(
        &self,
        profile: &IndexerProfile,
    ) -> impl Future<Output = Result<SessionArtifact, AuthError>> + Send {
        let indexer = profile.id.clone();
        async move { Err(AuthError::InvalidCredentials(indexer)) }
    }
}

fn profile(id: &str) -> IndexerProfile {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "name": id,
        "url": "https://t.example",
        "username": "u",
        "password": "p",
        "enabled": true
    }))
    .unwrap()
}

fn store(dir: &tempfile::TempDir) -> SessionStore {
    SessionStore::new(dir.path().to_path_buf()).unwrap()
}

#[tokio::test]
async fn first_ensure_logs_in_then_reuses() {
    let dir = tempfile::tempdir().unwrap();
    let (auth, logins) = FakeAuthenticator::new(0);
    let manager = SessionManager::new(store(&dir), auth, 24);
    let profile = profile("t");

    let artifact = manager.ensure_session(&profile).await.unwrap();
    assert_eq!(artifact.indexer, "t");
    assert_eq!(logins.load(Ordering::SeqCst), 1);

    // valid artifact comes back without another login
    manager.ensure_session(&profile).await.unwrap();
    manager.ensure_session(&profile).await.unwrap();
    assert_eq!(logins.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn mark_invalid_forces_exactly_one_login_even_concurrently() {
    let dir = tempfile::tempdir().unwrap();
    let (auth, logins) = FakeAuthenticator::new(50);
    let manager = SessionManager::new(store(&dir), auth, 24);
    let profile = profile("t");

    manager.ensure_session(&profile).await.unwrap();
    assert_eq!(logins.load(Ordering::SeqCst), 1);

    manager.mark_invalid("t");

    // Two queries race in; only one login may execute, the other waits on
    // the site gate and reuses the fresh artifact.
    let (a, b) = futures_util::join!(
        manager.ensure_session(&profile),
        manager.ensure_session(&profile)
    );
    let a = a.unwrap();
    let b = b.unwrap();

    assert_eq!(logins.load(Ordering::SeqCst), 2);
    assert_eq!(a.cookies[0].value, b.cookies[0].value);
}

#[tokio::test]
async fn force_refresh_reauthenticates_even_when_valid() {
    let dir = tempfile::tempdir().unwrap();
    let (auth, logins) = FakeAuthenticator::new(0);
    let manager = SessionManager::new(store(&dir), auth, 24);
    let profile = profile("t");

    manager.ensure_session(&profile).await.unwrap();
    manager.force_refresh(&profile).await.unwrap();
    assert_eq!(logins.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn zero_ttl_means_every_use_reauthenticates() {
    let dir = tempfile::tempdir().unwrap();
    let (auth, logins) = FakeAuthenticator::new(0);
    let manager = SessionManager::new(store(&dir), auth, 0);
    let profile = profile("t");

    manager.ensure_session(&profile).await.unwrap();
    manager.ensure_session(&profile).await.unwrap();
    assert_eq!(logins.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn artifact_survives_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let profile = profile("t");

    {
        let (auth, logins) = FakeAuthenticator::new(0);
        let manager = SessionManager::new(store(&dir), auth, 24);
        manager.ensure_session(&profile).await.unwrap();
        assert_eq!(logins.load(Ordering::SeqCst), 1);
    }

    // A fresh manager over the same store finds the artifact on disk
    let (auth, logins) = FakeAuthenticator::new(0);
    let manager = SessionManager::new(store(&dir), auth, 24);
    manager.ensure_session(&profile).await.unwrap();
    assert_eq!(logins.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn auth_failure_propagates_classified() {
    let dir = tempfile::tempdir().unwrap();
    let manager = SessionManager::new(store(&dir), RejectingAuthenticator, 24);
    let profile = profile("t");

    match manager.ensure_session(&profile).await {
        Err(AuthError::InvalidCredentials(indexer)) => assert_eq!(indexer, "t"),
        other => panic!("expected InvalidCredentials, got {:?}", other.map(|_| ())),
    }

    // not authenticated in the status view either
    assert!(!manager.status("t").authenticated);
}

#[tokio::test]
async fn forget_drops_the_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let (auth, logins) = FakeAuthenticator::new(0);
    let manager = SessionManager::new(store(&dir), auth, 24);
    let profile = profile("t");

    manager.ensure_session(&profile).await.unwrap();
    manager.forget("t");
    manager.ensure_session(&profile).await.unwrap();
    assert_eq!(logins.load(Ordering::SeqCst), 2);
}
