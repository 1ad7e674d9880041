use rand::Rng;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub browser: BrowserSection,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// URL the *arr clients can reach us on, used for the download links
    /// written into the feed. Defaults to http://{host}:{port}.
    #[serde(default)]
    pub external_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    /// Hours an artifact is trusted before the next use re-authenticates
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: i64,

    /// Start of the daily renewal window, "HH:MM" local time
    #[serde(default = "default_window_start")]
    pub renewal_window_start: String,

    /// Length of the renewal window; each indexer gets a random slot inside
    #[serde(default = "default_window_minutes")]
    pub renewal_window_minutes: u32,

    /// Scheduler polling interval
    #[serde(default = "default_poll_secs")]
    pub poll_interval_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetchConfig {
    /// Timeout for a single search fetch, in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Randomized inter-request delay bounds in milliseconds
    #[serde(default = "default_min_delay")]
    pub min_delay_ms: u64,
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BrowserSection {
    #[serde(default = "default_true")]
    pub headless: bool,
    #[serde(default = "default_window_width")]
    pub window_width: u32,
    #[serde(default = "default_window_height")]
    pub window_height: u32,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_true")]
    pub disable_images: bool,
}

fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 9797 }
fn default_data_dir() -> String { "data".to_string() }
fn default_ttl_hours() -> i64 { 24 }
fn default_window_start() -> String { "08:00".to_string() }
fn default_window_minutes() -> u32 { 60 }
fn default_poll_secs() -> u64 { 30 }
fn default_timeout() -> u64 { 30 }
fn default_min_delay() -> u64 { 300 }
fn default_max_delay() -> u64 { 1000 }
fn default_true() -> bool { true }
fn default_window_width() -> u32 { 1920 }
fn default_window_height() -> u32 { 1080 }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            external_url: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { data_dir: default_data_dir() }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_hours: default_ttl_hours(),
            renewal_window_start: default_window_start(),
            renewal_window_minutes: default_window_minutes(),
            poll_interval_secs: default_poll_secs(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            min_delay_ms: default_min_delay(),
            max_delay_ms: default_max_delay(),
        }
    }
}

impl Default for BrowserSection {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: default_window_width(),
            window_height: default_window_height(),
            timeout_secs: default_timeout(),
            disable_images: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            session: SessionConfig::default(),
            fetch: FetchConfig::default(),
            browser: BrowserSection::default(),
        }
    }
}

impl Config {
    pub fn load() -> Self {
        let path = Path::new("config.toml");
        if path.exists() {
            if let Ok(content) = fs::read_to_string(path) {
                match toml::from_str::<Config>(&content) {
                    Ok(cfg) => return cfg,
                    Err(e) => log::error!("config.toml is invalid, using defaults: {}", e),
                }
            }
        }
        Self::default()
    }

    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.storage.data_dir)
    }

    pub fn cookie_dir(&self) -> PathBuf {
        self.data_dir().join("cookies")
    }

    pub fn indexers_path(&self) -> PathBuf {
        self.data_dir().join("indexers.json")
    }

    pub fn external_url(&self) -> String {
        self.server
            .external_url
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}", self.server.host, self.server.port))
    }

    /// Read the API key from {data_dir}/api_key.txt, generating and
    /// persisting a fresh one on first start.
    pub fn api_key(&self) -> std::io::Result<String> {
        let key_file = self.data_dir().join("api_key.txt");
        if key_file.exists() {
            return Ok(fs::read_to_string(&key_file)?.trim().to_string());
        }
        fs::create_dir_all(self.data_dir())?;
        let key = generate_api_key();
        fs::write(&key_file, &key)?;
        log::info!("Generated new API key at {}", key_file.display());
        Ok(key)
    }

    /// Build the browser configuration from the [browser] section
    pub fn browser_config(&self) -> crate::browser::BrowserConfig {
        crate::browser::BrowserConfig {
            headless: self.browser.headless,
            window_width: self.browser.window_width,
            window_height: self.browser.window_height,
            timeout: std::time::Duration::from_secs(self.browser.timeout_secs),
            disable_images: self.browser.disable_images,
            user_agent: None,
        }
    }
}

fn generate_api_key() -> String {
    let mut rng = rand::thread_rng();
    (0..16)
        .map(|_| format!("{:02x}", rng.gen::<u8>()))
        .collect()
}
