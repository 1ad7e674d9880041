//! Headless Chrome plumbing shared by the authenticator, the rendered
//! fetch strategy and the download thanks action.

pub mod config;
pub mod manager;
pub mod page;

pub use config::BrowserConfig;
pub use manager::{BrowserError, BrowserManager};

use std::sync::{Arc, Mutex};

/// Lazily launched, process-wide browser handle.
///
/// Chrome is only started the first time something actually needs it, so a
/// deployment of pure-HTTP indexers never pays the launch cost.
#[derive(Clone)]
pub struct SharedBrowser {
    config: BrowserConfig,
    inner: Arc<Mutex<Option<Arc<BrowserManager>>>>,
}

impl SharedBrowser {
    pub fn new(config: BrowserConfig) -> Self {
        Self {
            config,
            inner: Arc::new(Mutex::new(None)),
        }
    }

    /// Get the running browser, launching it on first use
    pub fn get(&self) -> Result<Arc<BrowserManager>, BrowserError> {
        let mut guard = self.inner.lock().unwrap();
        if let Some(manager) = guard.as_ref() {
            return Ok(manager.clone());
        }
        log::info!("Launching headless browser");
        let manager = Arc::new(BrowserManager::new(self.config.clone())?);
        *guard = Some(manager.clone());
        Ok(manager)
    }
}
