use super::config::BrowserConfig;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::sync::Arc;

/// Manages the browser instance and tab creation
pub struct BrowserManager {
    browser: Browser,
    config: BrowserConfig,
}

impl BrowserManager {
    /// Launch Chrome with the given configuration
    pub fn new(config: BrowserConfig) -> Result<Self, BrowserError> {
        // Owned argument strings must outlive the LaunchOptions borrow
        let images_arg = if config.disable_images {
            Some("--blink-settings=imagesEnabled=false".to_string())
        } else {
            None
        };
        let user_agent_arg = config
            .user_agent
            .as_ref()
            .map(|ua| format!("--user-agent={}", ua));

        let mut args: Vec<&OsStr> = vec![
            OsStr::new("--disable-blink-features=AutomationControlled"),
            OsStr::new("--disable-dev-shm-usage"),
            OsStr::new("--no-sandbox"),
            OsStr::new("--disable-setuid-sandbox"),
        ];
        if let Some(ref img) = images_arg {
            args.push(OsStr::new(img));
        }
        if let Some(ref ua) = user_agent_arg {
            args.push(OsStr::new(ua));
        }

        let launch_options = LaunchOptions::default_builder()
            .headless(config.headless)
            .window_size(Some((config.window_width, config.window_height)))
            .args(args)
            .build()
            .map_err(|e| BrowserError::Configuration(e.to_string()))?;

        let browser =
            Browser::new(launch_options).map_err(|e| BrowserError::Initialization(e.to_string()))?;

        Ok(Self { browser, config })
    }

    /// Create a new tab with the configured default timeout applied
    pub fn new_tab(&self) -> Result<Arc<Tab>, BrowserError> {
        let tab = self
            .browser
            .new_tab()
            .map_err(|e| BrowserError::TabCreation(e.to_string()))?;
        tab.set_default_timeout(self.config.timeout);
        Ok(tab)
    }

    pub fn config(&self) -> &BrowserConfig {
        &self.config
    }
}

/// Errors that can occur during browser operations
#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    #[error("browser initialization failed: {0}")]
    Initialization(String),

    #[error("browser configuration error: {0}")]
    Configuration(String),

    #[error("tab creation failed: {0}")]
    TabCreation(String),

    #[error("navigation error: {0}")]
    Navigation(String),

    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("timeout waiting for: {0}")]
    Timeout(String),

    #[error("html extraction error: {0}")]
    HtmlExtraction(String),
}
