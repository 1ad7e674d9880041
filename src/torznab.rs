//! Torznab endpoint: maps the query protocol onto the session/fetch/parse
//! pipeline and renders results back as RSS.
//!
//! Disabled and out-of-hours indexers answer with an empty but well-formed
//! feed so the *arr clients read "no results right now" instead of marking
//! the indexer broken; genuine failures come back as a torznab `<error>`
//! document. An expired session is recovered exactly once per query.

use actix_web::{get, web, HttpResponse, HttpResponseBuilder, Responder};
use serde::Deserialize;
use std::time::Instant;

use crate::app_state::AppState;
use crate::error::{BridgeError, FetchError};
use crate::fetch;
use crate::indexers::IndexerProfile;
use crate::models::{SearchRequest, Torrent};
use crate::normalize;
use crate::session::SessionArtifact;
use crate::trackers;

pub const APP_NAME: &str = "trackrr";
const MAX_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
pub struct TorznabParams {
    pub t: Option<String>,
    pub q: Option<String>,
    pub cat: Option<String>,
    pub imdbid: Option<String>,
    pub tvdbid: Option<String>,
    pub tmdbid: Option<String>,
    pub season: Option<u32>,
    pub ep: Option<u32>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub apikey: Option<String>,
}

/// Torznab API endpoint, consumed by Prowlarr/Sonarr/Radarr as a
/// "Generic Torznab" indexer pointing at /api/v1/torznab/{indexer}
#[get("/api/v1/torznab/{indexer}")]
pub async fn torznab_api(
    data: web::Data<AppState>,
    path: web::Path<String>,
    params: web::Query<TorznabParams>,
) -> impl Responder {
    let indexer = path.into_inner();

    if params.apikey.as_deref() != Some(data.api_key.as_str()) {
        return xml_response(
            HttpResponse::Unauthorized(),
            error_xml(100, "Incorrect user credentials"),
        );
    }

    // The profile must exist, but caps are answered even for disabled sites
    let profile = match data.registry.get(&indexer) {
        Some(profile) => profile,
        None => {
            let err = BridgeError::UnknownIndexer(indexer);
            return xml_response(HttpResponse::NotFound(), error_xml(201, &err.to_string()));
        }
    };

    match params.t.as_deref().unwrap_or("") {
        "caps" => xml_response(HttpResponse::Ok(), caps_xml()),
        action @ ("search" | "tvsearch" | "movie") => {
            handle_search(&data, &profile, &params, action).await
        }
        other => xml_response(
            HttpResponse::BadRequest(),
            error_xml(202, &format!("Unknown function: {}", other)),
        ),
    }
}

async fn handle_search(
    data: &web::Data<AppState>,
    profile: &IndexerProfile,
    params: &TorznabParams,
    action: &str,
) -> HttpResponse {
    let offset = params.offset.unwrap_or(0);
    let episodic = action == "tvsearch";
    let external_url = data.config.external_url();

    if !profile.can_search() {
        log::info!(
            "{} cannot search (disabled or outside hours), returning empty feed",
            profile.id
        );
        return xml_response(
            HttpResponse::Ok(),
            feed_xml(&[], offset, episodic, &external_url),
        );
    }

    let request = build_request(params);
    let started = Instant::now();

    match run_search(data, profile, &request).await {
        Ok(mut torrents) => {
            if let Some(season) = request.season {
                if action != "movie" {
                    let before = torrents.len();
                    torrents = filter_by_season(torrents, season, request.episode);
                    log::info!(
                        "Season filter for {}: {} -> {} results",
                        profile.id,
                        before,
                        torrents.len()
                    );
                }
            }
            data.metrics
                .record_search(&profile.id, started.elapsed(), torrents.len());
            xml_response(
                HttpResponse::Ok(),
                feed_xml(&torrents, offset, episodic, &external_url),
            )
        }
        Err(BridgeError::Fetch(FetchError::OutOfHours)) => xml_response(
            HttpResponse::Ok(),
            feed_xml(&[], offset, episodic, &external_url),
        ),
        Err(e) => {
            log::error!("Search failed on {}: {}", profile.id, e);
            data.metrics.record_failure(&profile.id, &e.to_string());
            xml_response(HttpResponse::Ok(), error_xml(900, &e.to_string()))
        }
    }
}

fn build_request(params: &TorznabParams) -> SearchRequest {
    let mut request = SearchRequest {
        query: params.q.clone(),
        category: params.cat.clone(),
        imdb_id: params.imdbid.clone(),
        tvdb_id: params.tvdbid.clone(),
        tmdb_id: params.tmdbid.clone(),
        season: params.season,
        episode: params.ep,
        limit: params.limit.unwrap_or(MAX_LIMIT).min(MAX_LIMIT),
        offset: params.offset.unwrap_or(0),
    };
    // free text only matters when no registry id was supplied
    if request.has_external_ids() {
        request.query = None;
    }
    request
}

/// Full search pipeline with the single expired-session retry.
///
/// A `SessionExpired` from the fetch invalidates the session, forces one
/// re-authentication and repeats the fetch exactly once; a second
/// rejection propagates to the caller as a protocol error.
pub async fn run_search(
    data: &web::Data<AppState>,
    profile: &IndexerProfile,
    request: &SearchRequest,
) -> Result<Vec<Torrent>, BridgeError> {
    let session = data.sessions.ensure_session(profile).await?;
    let url = trackers::build_search_url(profile, request);
    log::info!("Searching {}: {}", profile.id, url);

    match search_once(data, profile, request, &session, &url).await {
        Err(FetchError::SessionExpired) => {
            log::warn!(
                "Session expired mid-search for {}, renewing and retrying once",
                profile.id
            );
            data.metrics.record_expired_session(&profile.id);
            data.sessions.mark_invalid(&profile.id);
            let session = data.sessions.force_refresh(profile).await?;
            data.metrics.record_renewal(&profile.id);
            Ok(search_once(data, profile, request, &session, &url).await?)
        }
        other => other.map_err(Into::into),
    }
}

async fn search_once(
    data: &web::Data<AppState>,
    profile: &IndexerProfile,
    request: &SearchRequest,
    session: &SessionArtifact,
    url: &str,
) -> Result<Vec<Torrent>, FetchError> {
    let html = fetch::fetch_page(
        &data.http,
        &data.browser,
        profile,
        session,
        url,
        &data.config.fetch,
    )
    .await?;
    let limit = if request.limit == 0 {
        MAX_LIMIT
    } else {
        request.limit.min(MAX_LIMIT)
    };
    Ok(trackers::parse_results(profile, &html, limit))
}

/// Keep only rows matching the requested season. With an episode number,
/// only that exact episode survives; without one the caller wants season
/// packs, so individual episodes are dropped.
pub fn filter_by_season(torrents: Vec<Torrent>, season: u32, episode: Option<u32>) -> Vec<Torrent> {
    torrents
        .into_iter()
        .filter(|t| {
            let (row_season, row_episode) = normalize::parse_season_episode(&t.title);
            let (row_season, is_pack) = match row_season {
                Some(s) => (Some(s), false),
                None => (normalize::parse_season_only(&t.title), true),
            };
            if row_season != Some(season) {
                return false;
            }
            match episode {
                Some(ep) => row_episode == Some(ep),
                None => is_pack,
            }
        })
        .collect()
}

fn xml_response(mut builder: HttpResponseBuilder, body: String) -> HttpResponse {
    builder
        .content_type("application/xml; charset=utf-8")
        .body(body)
}

/// Escape XML special characters
pub fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

pub fn error_xml(code: u32, description: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<error code=\"{}\" description=\"{}\"/>",
        code,
        xml_escape(description)
    )
}

/// Capabilities document for Prowlarr's indexer probe
pub fn caps_xml() -> String {
    let categories = [
        ("2000", "Movies"),
        ("2030", "Movies/SD"),
        ("2040", "Movies/HD"),
        ("2050", "Movies/UHD"),
        ("5000", "TV"),
        ("5030", "TV/SD"),
        ("5040", "TV/HD"),
        ("5050", "TV/UHD"),
        ("5070", "TV/Anime"),
        ("8000", "Other"),
    ];

    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<caps>\n");
    xml.push_str(&format!(
        "  <server title=\"{}\" version=\"{}\"/>\n",
        APP_NAME,
        env!("CARGO_PKG_VERSION")
    ));
    xml.push_str("  <limits max=\"100\" default=\"100\"/>\n");
    xml.push_str("  <searching>\n");
    xml.push_str("    <search available=\"yes\" supportedParams=\"q\"/>\n");
    xml.push_str(
        "    <tv-search available=\"yes\" supportedParams=\"q,season,ep,imdbid,tvdbid,tmdbid\"/>\n",
    );
    xml.push_str("    <movie-search available=\"yes\" supportedParams=\"q,imdbid,tmdbid\"/>\n");
    xml.push_str("  </searching>\n");
    xml.push_str("  <categories>\n");
    for (id, name) in categories {
        xml.push_str(&format!("    <category id=\"{}\" name=\"{}\"/>\n", id, name));
    }
    xml.push_str("  </categories>\n</caps>");
    xml
}

/// Render results as a Torznab RSS feed. Download links point at our own
/// proxy so the client never needs the tracker session.
pub fn feed_xml(torrents: &[Torrent], offset: usize, episodic: bool, external_url: &str) -> String {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str("<rss version=\"2.0\" xmlns:atom=\"http://www.w3.org/2005/Atom\" xmlns:torznab=\"http://torznab.com/schemas/2015/feed\">\n");
    xml.push_str("<channel>\n");
    xml.push_str(&format!("  <title>{}</title>\n", APP_NAME));
    xml.push_str(&format!(
        "  <description>{} - Unit3D bridge</description>\n",
        APP_NAME
    ));
    xml.push_str(&format!("  <link>{}</link>\n", xml_escape(external_url)));
    xml.push_str(&format!(
        "  <torznab:response offset=\"{}\" total=\"{}\"/>\n",
        offset,
        torrents.len()
    ));

    for torrent in torrents {
        let title = normalize::normalize_title(&torrent.original_title, episodic);
        let download_url = format!(
            "{}/api/v1/download/{}/{}",
            external_url.trim_end_matches('/'),
            torrent.indexer,
            torrent.torrent_id()
        );

        xml.push_str("  <item>\n");
        xml.push_str(&format!("    <title>{}</title>\n", xml_escape(&title)));
        xml.push_str(&format!(
            "    <guid isPermaLink=\"false\">{}</guid>\n",
            xml_escape(&torrent.guid)
        ));
        xml.push_str(&format!("    <link>{}</link>\n", xml_escape(&download_url)));
        xml.push_str(&format!(
            "    <comments>{}</comments>\n",
            xml_escape(&torrent.info_url)
        ));
        xml.push_str(&format!(
            "    <pubDate>{}</pubDate>\n",
            torrent
                .publish_date
                .format("%a, %d %b %Y %H:%M:%S +0000")
        ));
        xml.push_str(&torznab_attr("size", &torrent.size.to_string()));
        xml.push_str(&torznab_attr("seeders", &torrent.seeders.to_string()));
        xml.push_str(&torznab_attr(
            "peers",
            &(torrent.seeders + torrent.leechers).to_string(),
        ));
        xml.push_str(&torznab_attr("category", &torrent.category));
        xml.push_str(&torznab_attr("downloadvolumefactor", "1"));
        xml.push_str(&torznab_attr("uploadvolumefactor", "1"));

        let (season, episode) = normalize::parse_season_episode(&title);
        match (season, episode) {
            (Some(season), Some(episode)) => {
                xml.push_str(&torznab_attr("season", &season.to_string()));
                xml.push_str(&torznab_attr("episode", &episode.to_string()));
            }
            _ => {
                if let Some(season) = normalize::parse_season_only(&title) {
                    xml.push_str(&torznab_attr("season", &season.to_string()));
                }
            }
        }

        if let Some(imdb) = &torrent.imdb_id {
            xml.push_str(&torznab_attr("imdbid", imdb));
        }
        if let Some(tmdb) = &torrent.tmdb_id {
            xml.push_str(&torznab_attr("tmdbid", tmdb));
        }
        if let Some(tvdb) = &torrent.tvdb_id {
            xml.push_str(&torznab_attr("tvdbid", tvdb));
        }

        xml.push_str(&format!(
            "    <enclosure url=\"{}\" length=\"{}\" type=\"application/x-bittorrent\"/>\n",
            xml_escape(&download_url),
            torrent.size
        ));
        xml.push_str("  </item>\n");
    }

    xml.push_str("</channel>\n</rss>");
    xml
}

fn torznab_attr(name: &str, value: &str) -> String {
    format!(
        "    <torznab:attr name=\"{}\" value=\"{}\"/>\n",
        name,
        xml_escape(value)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn torrent(title: &str) -> Torrent {
        Torrent {
            title: normalize::normalize_title(title, false),
            original_title: title.to_string(),
            guid: "xbytesv2-39637".to_string(),
            indexer: "xbytesv2".to_string(),
            download_url: "https://xbytes.example/torrents/download/39637".to_string(),
            info_url: "https://xbytes.example/torrents/39637".to_string(),
            publish_date: Utc.with_ymd_and_hms(2023, 12, 7, 16, 37, 29).unwrap(),
            size: 2_576_980_377,
            seeders: 21,
            leechers: 2,
            category: "5040".to_string(),
            languages: vec!["Spanish".to_string()],
            imdb_id: Some("tt10059518".to_string()),
            tmdb_id: None,
            tvdb_id: None,
        }
    }

    #[test]
    fn escaping() {
        assert_eq!(xml_escape("a & b <c>"), "a &amp; b &lt;c&gt;");
    }

    #[test]
    fn empty_feed_is_well_formed() {
        let xml = feed_xml(&[], 0, false, "http://trackrr:9797");
        assert!(xml.contains("<rss"));
        assert!(xml.contains("offset=\"0\" total=\"0\""));
        assert!(xml.contains("</rss>"));
        assert!(!xml.contains("<item>"));
    }

    #[test]
    fn feed_contains_proxy_download_link() {
        let xml = feed_xml(&[torrent("Show S01E02 1080p ESP")], 0, false, "http://trackrr:9797");
        assert!(xml.contains("http://trackrr:9797/api/v1/download/xbytesv2/39637"));
        assert!(xml.contains("<torznab:attr name=\"size\" value=\"2576980377\"/>"));
        assert!(xml.contains("<torznab:attr name=\"seeders\" value=\"21\"/>"));
        assert!(xml.contains("<torznab:attr name=\"peers\" value=\"23\"/>"));
        assert!(xml.contains("<torznab:attr name=\"season\" value=\"1\"/>"));
        assert!(xml.contains("<torznab:attr name=\"episode\" value=\"2\"/>"));
        assert!(xml.contains("<torznab:attr name=\"imdbid\" value=\"tt10059518\"/>"));
        assert!(xml.contains("Thu, 07 Dec 2023 16:37:29 +0000"));
    }

    #[test]
    fn episodic_feed_strips_trailing_year() {
        let xml = feed_xml(&[torrent("Show S01 (2023)")], 0, true, "http://x");
        assert!(xml.contains("<title>Show S01</title>"));

        let xml = feed_xml(&[torrent("Movie (2023)")], 0, false, "http://x");
        assert!(xml.contains("<title>Movie (2023)</title>"));
    }

    #[test]
    fn caps_lists_categories_and_modes() {
        let xml = caps_xml();
        assert!(xml.contains("<tv-search available=\"yes\""));
        assert!(xml.contains("<category id=\"5040\" name=\"TV/HD\"/>"));
        assert!(xml.contains("<category id=\"8000\" name=\"Other\"/>"));
    }

    #[test]
    fn error_document() {
        let xml = error_xml(900, "it broke & burned");
        assert!(xml.contains("code=\"900\""));
        assert!(xml.contains("it broke &amp; burned"));
    }

    #[test]
    fn season_filter_keeps_matching_episode() {
        let torrents = vec![
            torrent("Show S02E01 1080p"),
            torrent("Show S02E05 1080p"),
            torrent("Show S01E01 1080p"),
        ];
        let filtered = filter_by_season(torrents, 2, Some(5));
        assert_eq!(filtered.len(), 1);
        assert!(filtered[0].title.contains("S02E05"));
    }

    #[test]
    fn season_filter_without_episode_wants_packs() {
        let torrents = vec![
            torrent("Show S02E01 1080p"),
            torrent("Show - Segunda temporada (2023/WEB-DL/1080p)"),
        ];
        let filtered = filter_by_season(torrents, 2, None);
        assert_eq!(filtered.len(), 1);
        assert!(filtered[0].title.contains("S02 ["));
    }

    #[test]
    fn season_filter_drops_other_seasons() {
        let torrents = vec![torrent("Show S03E01")];
        assert!(filter_by_season(torrents, 2, Some(1)).is_empty());
    }
}
