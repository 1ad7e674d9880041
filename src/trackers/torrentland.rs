//! Torrentland listing parser.
//!
//! The listing is a `table.modern-data-table` with badge spans for the
//! numeric cells and Spanish relative ages ("hace 2 días"). Torrentland
//! serves this markup fully rendered only to a real browser, so profiles
//! for it pair this parser with the browser fetch strategy.

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::indexers::IndexerProfile;
use crate::models::{SearchRequest, Torrent};
use crate::normalize;
use crate::trackers::{encode_params, extract_torrent_id, search_params};

pub fn search_url(base: &str, request: &SearchRequest) -> String {
    encode_params(base, "/torrents", &search_params(request))
}

pub fn parse(html: &str, profile: &IndexerProfile, limit: usize) -> Vec<Torrent> {
    let row_selector = Selector::parse("table.modern-data-table tbody tr").unwrap();
    let document = Html::parse_document(html);

    let mut torrents = Vec::new();
    for row in document.select(&row_selector).take(limit) {
        if let Some(torrent) = parse_row(&row, profile) {
            torrents.push(torrent);
        }
    }
    torrents
}

fn parse_row(row: &ElementRef, profile: &IndexerProfile) -> Option<Torrent> {
    static TMDB_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"/torrents/similar/\d+\.(\d+)").unwrap());

    let title_sel = Selector::parse("a.view-torrent.torrent-listings-name").unwrap();
    let size_sel = Selector::parse("td.torrent-listings-size span.badge-extra").unwrap();
    let seeders_sel = Selector::parse("td.torrent-listings-seeders span.badge-extra").unwrap();
    let leechers_sel = Selector::parse("td.torrent-listings-leechers span.badge-extra").unwrap();
    let age_sel = Selector::parse("td.torrent-listings-age span.badge-extra").unwrap();
    let category_sel = Selector::parse(r#"span.label[data-original-title="Categoria"]"#).unwrap();
    let imdb_sel = Selector::parse("div#imdb_id").unwrap();
    let tmdb_sel = Selector::parse(r#"a[href*="/torrents/similar/"]"#).unwrap();

    let base = profile.url.trim_end_matches('/');

    // Title and download reference are the two fields a row cannot live
    // without; everything else degrades to a sentinel.
    let title_elem = row.select(&title_sel).next()?;
    let title = text_of(&title_elem);
    if title.is_empty() {
        return None;
    }
    let href = title_elem.value().attr("href")?;
    let info_url = absolute_url(base, href);
    let torrent_id = extract_torrent_id(&info_url)?;

    let size_text = row
        .select(&size_sel)
        .next()
        .map(|el| text_of(&el))
        .unwrap_or_default();
    let size = normalize::parse_size(&size_text);

    let seeders = row
        .select(&seeders_sel)
        .next()
        .and_then(|el| text_of(&el).parse().ok())
        .unwrap_or(0);
    let leechers = row
        .select(&leechers_sel)
        .next()
        .and_then(|el| text_of(&el).parse().ok())
        .unwrap_or(0);

    let publish_date = row
        .select(&age_sel)
        .next()
        .map(|el| normalize::parse_relative_date(&text_of(&el).to_lowercase(), Utc::now()))
        .unwrap_or_else(Utc::now);

    let category_text = row
        .select(&category_sel)
        .next()
        .map(|el| text_of(&el))
        .unwrap_or_default();
    let category = normalize::map_category(&category_text, &title);

    let imdb_id = row
        .select(&imdb_sel)
        .next()
        .map(|el| text_of(&el))
        .filter(|id| !id.is_empty());

    let tmdb_id = row.select(&tmdb_sel).next().and_then(|el| {
        let href = el.value().attr("href")?;
        TMDB_RE.captures(href).map(|c| c[1].to_string())
    });

    Some(Torrent {
        title: normalize::normalize_title(&title, false),
        original_title: title.clone(),
        guid: format!("{}-{}", profile.id, torrent_id),
        indexer: profile.id.clone(),
        download_url: format!("{}/torrents/download/{}", base, torrent_id),
        info_url,
        publish_date,
        size,
        seeders,
        leechers,
        category,
        languages: normalize::parse_languages(&title),
        imdb_id,
        tmdb_id,
        tvdb_id: None,
    })
}

fn text_of(element: &ElementRef) -> String {
    element
        .text()
        .collect::<String>()
        .replace('\u{a0}', " ")
        .trim()
        .to_string()
}

fn absolute_url(base: &str, href: &str) -> String {
    if href.starts_with("http") {
        href.to_string()
    } else {
        format!("{}/{}", base, href.trim_start_matches('/'))
    }
}
