use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// One cookie captured from the authenticated browser context.
///
/// Serialized camelCase so the on-disk artifact round-trips against the
/// CDP cookie shape without a translation table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub expires: Option<f64>,
    #[serde(default)]
    pub secure: Option<bool>,
    #[serde(default)]
    pub http_only: Option<bool>,
}

/// The authenticated state required to act as a logged-in user on a site.
///
/// An artifact is *valid* while younger than the configured TTL, *stale*
/// once past it, and *invalid* after the manager marks it so. Only the
/// manager and the authenticator mutate artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionArtifact {
    pub indexer: String,
    pub cookies: Vec<StoredCookie>,
    pub created_at: DateTime<Utc>,
    pub last_validated: DateTime<Utc>,
}

impl SessionArtifact {
    pub fn new(indexer: &str, cookies: Vec<StoredCookie>) -> Self {
        let now = Utc::now();
        Self {
            indexer: indexer.to_string(),
            cookies,
            created_at: now,
            last_validated: now,
        }
    }

    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.created_at
    }

    /// Render the cookies as a single Cookie request header value
    pub fn cookie_header(&self) -> String {
        self.cookies
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Disk persistence for session artifacts: one JSON blob per site id
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: PathBuf) -> std::io::Result<Self> {
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, indexer: &str) -> PathBuf {
        self.dir.join(format!("{}_session.json", indexer))
    }

    pub fn load(&self, indexer: &str) -> Option<SessionArtifact> {
        let path = self.path_for(indexer);
        let content = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&content) {
            Ok(artifact) => Some(artifact),
            Err(e) => {
                log::error!("Corrupt session artifact for {}: {}", indexer, e);
                None
            }
        }
    }

    pub fn save(&self, artifact: &SessionArtifact) -> std::io::Result<()> {
        let path = self.path_for(&artifact.indexer);
        let content = serde_json::to_string(artifact)?;
        fs::write(&path, content)?;
        log::info!("Saved session artifact for {}", artifact.indexer);
        Ok(())
    }

    pub fn delete(&self, indexer: &str) -> bool {
        let path = self.path_for(indexer);
        match fs::remove_file(&path) {
            Ok(()) => {
                log::info!("Deleted session artifact for {}", indexer);
                true
            }
            Err(_) => false,
        }
    }
}
