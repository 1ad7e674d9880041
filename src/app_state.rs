//! Shared application state for the Actix-web server.
//!
//! Wrapped in `web::Data` and cloned into every handler. The session
//! manager carries its own per-site locking, so nothing here needs an
//! outer mutex.

use crate::browser::SharedBrowser;
use crate::config::Config;
use crate::fetch::http::HttpFetcher;
use crate::indexers::IndexerRegistry;
use crate::metrics::MetricsTracker;
use crate::session::{BrowserAuthenticator, SessionManager};

pub struct AppState {
    /// Application configuration (config.toml)
    pub config: Config,
    /// API key required on every Torznab request
    pub api_key: String,
    /// Site profiles (indexers.json), read-only to the core
    pub registry: IndexerRegistry,
    /// Session lifecycle: ensure / invalidate / force-refresh
    pub sessions: SessionManager<BrowserAuthenticator>,
    /// Lazily launched shared Chrome, used by login, rendered fetches and
    /// the thanks click
    pub browser: SharedBrowser,
    /// Plain HTTP fetch client
    pub http: HttpFetcher,
    /// Per-indexer counters
    pub metrics: MetricsTracker,
}
