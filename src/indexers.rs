//! Indexer profile registry
//!
//! Profiles are loaded from `indexers.json` (one entry per site id) and are
//! read-only to the rest of the crate. Credentials, operating hours, the
//! user-agent policy and the fetch strategy all live here; edits to the file
//! are picked up with `reload()`.

use chrono::{Local, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::RwLock;

use crate::fetch::FetchStrategy;
use crate::trackers::TrackerVariant;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoursWindow {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_start_time")]
    pub start_time: String,
    #[serde(default = "default_end_time")]
    pub end_time: String,
}

fn default_start_time() -> String { "10:00".to_string() }
fn default_end_time() -> String { "23:59".to_string() }

impl Default for HoursWindow {
    fn default() -> Self {
        Self {
            enabled: false,
            start_time: default_start_time(),
            end_time: default_end_time(),
        }
    }
}

impl HoursWindow {
    /// Whether `now` falls inside the allowed window. Windows may cross
    /// midnight (start > end). Unparseable bounds allow everything rather
    /// than silently disabling the indexer.
    pub fn contains(&self, now: NaiveTime) -> bool {
        if !self.enabled {
            return true;
        }
        let start = NaiveTime::parse_from_str(&self.start_time, "%H:%M");
        let end = NaiveTime::parse_from_str(&self.end_time, "%H:%M");
        match (start, end) {
            (Ok(start), Ok(end)) => {
                if start <= end {
                    start <= now && now <= end
                } else {
                    now >= start || now <= end
                }
            }
            _ => {
                log::error!("invalid time restriction {}-{}", self.start_time, self.end_time);
                true
            }
        }
    }
}

/// User-agent selection policy, mirroring the indexers.json shape:
/// mode is "random", "list" (index into the pool) or "custom".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAgentPolicy {
    #[serde(default = "default_ua_mode")]
    pub mode: String,
    #[serde(default)]
    pub list_index: usize,
    #[serde(default)]
    pub custom_value: String,
}

fn default_ua_mode() -> String { "random".to_string() }

impl Default for UserAgentPolicy {
    fn default() -> Self {
        Self {
            mode: default_ua_mode(),
            list_index: 0,
            custom_value: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerProfile {
    pub id: String,
    pub name: String,
    pub url: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub fetch_strategy: FetchStrategy,
    #[serde(default)]
    pub variant: TrackerVariant,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_auto_thanks")]
    pub auto_thanks: bool,
    #[serde(default)]
    pub time_restrictions: HoursWindow,
    #[serde(default)]
    pub user_agent: UserAgentPolicy,
}

fn default_timezone() -> String { "Europe/Madrid".to_string() }
fn default_auto_thanks() -> bool { true }

impl IndexerProfile {
    /// Tracker-local timezone used when parsing absolute listing dates
    pub fn tz(&self) -> chrono_tz::Tz {
        self.timezone
            .parse()
            .unwrap_or(chrono_tz::Europe::Madrid)
    }

    pub fn within_hours(&self, now: NaiveTime) -> bool {
        self.time_restrictions.contains(now)
    }

    /// Enabled and inside the operating-hours window right now
    pub fn can_search(&self) -> bool {
        self.enabled && self.within_hours(Local::now().time())
    }
}

pub struct IndexerRegistry {
    path: PathBuf,
    profiles: RwLock<HashMap<String, IndexerProfile>>,
}

impl IndexerRegistry {
    pub fn load(path: PathBuf) -> Self {
        let profiles = Self::read_file(&path);
        Self {
            path,
            profiles: RwLock::new(profiles),
        }
    }

    fn read_file(path: &PathBuf) -> HashMap<String, IndexerProfile> {
        match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<HashMap<String, IndexerProfile>>(&content) {
                Ok(map) => {
                    log::info!("Loaded {} indexers from {}", map.len(), path.display());
                    map
                }
                Err(e) => {
                    log::error!("Failed to parse {}: {}", path.display(), e);
                    HashMap::new()
                }
            },
            Err(_) => {
                log::warn!("Indexers config not found: {}", path.display());
                HashMap::new()
            }
        }
    }

    pub fn reload(&self) {
        let fresh = Self::read_file(&self.path);
        *self.profiles.write().unwrap() = fresh;
    }

    pub fn get(&self, id: &str) -> Option<IndexerProfile> {
        self.profiles.read().unwrap().get(id).cloned()
    }

    pub fn all(&self) -> Vec<IndexerProfile> {
        self.profiles.read().unwrap().values().cloned().collect()
    }

    pub fn enabled(&self) -> Vec<IndexerProfile> {
        self.profiles
            .read()
            .unwrap()
            .values()
            .filter(|p| p.enabled)
            .cloned()
            .collect()
    }
}
