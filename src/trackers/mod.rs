//! Site-specific search URL building and result-row extraction.
//!
//! Each variant knows the repeating row element of its listing markup and
//! the per-field rules inside it; everything extracted runs through
//! `crate::normalize` so records come out in canonical form regardless of
//! site formatting.

pub mod torrentland;
pub mod unit3d;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::indexers::IndexerProfile;
use crate::models::{SearchRequest, Torrent};

/// Which parser/URL dialect a site speaks. Fixed per profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackerVariant {
    Torrentland,
    Unit3d,
}

impl Default for TrackerVariant {
    fn default() -> Self {
        TrackerVariant::Unit3d
    }
}

pub fn build_search_url(profile: &IndexerProfile, request: &SearchRequest) -> String {
    match profile.variant {
        TrackerVariant::Torrentland => torrentland::search_url(&profile.url, request),
        TrackerVariant::Unit3d => unit3d::search_url(&profile.url, request),
    }
}

pub fn parse_results(profile: &IndexerProfile, html: &str, limit: usize) -> Vec<Torrent> {
    let results = match profile.variant {
        TrackerVariant::Torrentland => torrentland::parse(html, profile, limit),
        TrackerVariant::Unit3d => unit3d::parse(html, profile, limit),
    };
    log::info!("Parsed {} torrents from {}", results.len(), profile.id);
    results
}

/// Site-internal torrent id from an info URL like /torrents/48213
pub(crate) fn extract_torrent_id(url: &str) -> Option<String> {
    static ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"/torrents/(\d+)").unwrap());
    ID_RE.captures(url).map(|c| c[1].to_string())
}

/// Map Torznab category codes to the Unit3D site codes
/// (2xxx movies -> 1, 5xxx tv -> 2, anime tv -> 3+4). Defaults to both
/// movie and tv when nothing usable was requested.
pub(crate) fn site_category_codes(cat_str: &str) -> Vec<String> {
    let mut codes: Vec<String> = Vec::new();
    for cat in cat_str.split(',') {
        let cat = cat.trim();
        let code = if cat == "5070" {
            Some("3")
        } else if cat.starts_with('2') {
            Some("1")
        } else if cat.starts_with('5') {
            Some("2")
        } else {
            None
        };
        if let Some(code) = code {
            if !codes.iter().any(|c| c == code) {
                codes.push(code.to_string());
            }
        }
        if cat == "5070" && !codes.iter().any(|c| c == "4") {
            codes.push("4".to_string());
        }
    }
    if codes.is_empty() {
        codes = vec!["1".to_string(), "2".to_string()];
    }
    codes
}

/// Shared query-parameter assembly: id lookups beat free text, and only
/// live torrents are requested.
pub(crate) fn search_params(request: &SearchRequest) -> Vec<(String, String)> {
    let mut params = vec![("alive".to_string(), "true".to_string())];

    if let Some(tmdb) = &request.tmdb_id {
        params.push(("tmdbId".to_string(), tmdb.clone()));
    } else if let Some(imdb) = &request.imdb_id {
        // Unit3D wants the bare number without the tt prefix
        let clean = imdb.strip_prefix("tt").unwrap_or(imdb);
        params.push(("imdbId".to_string(), clean.to_string()));
    } else if let Some(tvdb) = &request.tvdb_id {
        params.push(("tvdbId".to_string(), tvdb.clone()));
    } else if let Some(query) = &request.query {
        if !query.is_empty() {
            params.push(("name".to_string(), query.clone()));
        }
    }

    if let Some(category) = &request.category {
        for (idx, code) in site_category_codes(category).into_iter().enumerate() {
            params.push((format!("categories[{}]", idx), code));
        }
    }

    params
}

pub(crate) fn encode_params(base: &str, path: &str, params: &[(String, String)]) -> String {
    let query = params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    format!("{}{}?{}", base.trim_end_matches('/'), path, query)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn torrent_id_extraction() {
        assert_eq!(
            extract_torrent_id("https://t.example/torrents/48213"),
            Some("48213".to_string())
        );
        assert_eq!(extract_torrent_id("https://t.example/profile"), None);
    }

    #[test]
    fn category_translation() {
        assert_eq!(site_category_codes("2000,2040"), vec!["1"]);
        assert_eq!(site_category_codes("5000,5030,5040"), vec!["2"]);
        assert_eq!(site_category_codes("5070"), vec!["3", "4"]);
        assert_eq!(site_category_codes(""), vec!["1", "2"]);
    }

    #[test]
    fn id_lookup_beats_free_text() {
        let request = SearchRequest {
            query: Some("ignored".to_string()),
            tmdb_id: Some("175".to_string()),
            ..Default::default()
        };
        let params = search_params(&request);
        assert!(params.contains(&("tmdbId".to_string(), "175".to_string())));
        assert!(!params.iter().any(|(k, _)| k == "name"));
    }

    #[test]
    fn imdb_prefix_stripped() {
        let request = SearchRequest {
            imdb_id: Some("tt0903747".to_string()),
            ..Default::default()
        };
        let params = search_params(&request);
        assert!(params.contains(&("imdbId".to_string(), "0903747".to_string())));
    }

    #[test]
    fn url_encoding() {
        let params = vec![("name".to_string(), "30 monedas".to_string())];
        let url = encode_params("https://t.example/", "/torrents", &params);
        assert_eq!(url, "https://t.example/torrents?name=30%20monedas");
    }
}
