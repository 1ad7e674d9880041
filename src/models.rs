use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single search result in site-agnostic form.
///
/// Built fresh for every query by the tracker parsers, rendered into the
/// Torznab feed and then discarded. `title` carries the normalized form
/// (language markers canonicalized, Spanish season phrasing rewritten);
/// `original_title` is the text exactly as the tracker listed it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Torrent {
    pub title: String,
    pub original_title: String,
    pub guid: String,
    pub indexer: String,
    pub download_url: String,
    pub info_url: String,
    pub publish_date: DateTime<Utc>,
    /// Size in bytes. 0 when the listing carried no parseable size.
    pub size: u64,
    pub seeders: u32,
    pub leechers: u32,
    /// Torznab category code (e.g. "5040" for TV/HD, "8000" for Other)
    pub category: String,
    pub languages: Vec<String>,
    pub imdb_id: Option<String>,
    pub tmdb_id: Option<String>,
    pub tvdb_id: Option<String>,
}

impl Torrent {
    /// Site-internal torrent id, extracted from the guid ("{indexer}-{id}")
    pub fn torrent_id(&self) -> &str {
        self.guid.rsplit('-').next().unwrap_or(&self.guid)
    }
}

/// A search request in site-agnostic form, built from the Torznab query
/// string. Registry ids take priority over the free-text term when the
/// tracker supports them.
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub query: Option<String>,
    pub category: Option<String>,
    pub imdb_id: Option<String>,
    pub tvdb_id: Option<String>,
    pub tmdb_id: Option<String>,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub limit: usize,
    pub offset: usize,
}

impl SearchRequest {
    pub fn has_external_ids(&self) -> bool {
        self.tmdb_id.is_some() || self.imdb_id.is_some() || self.tvdb_id.is_some()
    }
}
