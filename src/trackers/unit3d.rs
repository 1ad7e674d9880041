//! Modern Unit3D listing parser (the `torrent-search--list` theme).
//!
//! These sites put the interesting fields in `data-*` attributes on the row
//! and an absolute `<time datetime="...">` stamp in the tracker's local
//! timezone, so the raw HTTP body is enough and no rendering is needed.

use chrono::Utc;
use scraper::{ElementRef, Html, Selector};

use crate::indexers::IndexerProfile;
use crate::models::{SearchRequest, Torrent};
use crate::normalize;
use crate::trackers::{encode_params, extract_torrent_id, search_params};

pub fn search_url(base: &str, request: &SearchRequest) -> String {
    encode_params(base, "/torrents", &search_params(request))
}

pub fn parse(html: &str, profile: &IndexerProfile, limit: usize) -> Vec<Torrent> {
    let row_selector =
        Selector::parse("table.data-table tbody tr.torrent-search--list__row").unwrap();
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
    let title_sel = Selector::parse("a.torrent-search--list__name").unwrap();
    let size_sel = Selector::parse("td.torrent-search--list__size span").unwrap();
    let seeders_sel = Selector::parse("td.torrent-search--list__seeders span").unwrap();
    let leechers_sel = Selector::parse("td.torrent-search--list__leechers span").unwrap();
    let time_sel = Selector::parse("td.torrent-search--list__age time").unwrap();

    let base = profile.url.trim_end_matches('/');

    let title_elem = row.select(&title_sel).next()?;
    let title = title_elem
        .text()
        .collect::<String>()
        .trim()
        .to_string();
    if title.is_empty() {
        return None;
    }
    let href = title_elem.value().attr("href")?;
    let info_url = if href.starts_with("http") {
        href.to_string()
    } else {
        format!("{}/{}", base, href.trim_start_matches('/'))
    };

    let torrent_id = row
        .value()
        .attr("data-torrent-id")
        .map(|id| id.to_string())
        .or_else(|| extract_torrent_id(&info_url))?;

    let size_text = row
        .select(&size_sel)
        .next()
        .map(|el| el.text().collect::<String>())
        .unwrap_or_default();
    let size = normalize::parse_size(&size_text);

    let seeders = row
        .select(&seeders_sel)
        .next()
        .and_then(|el| el.text().collect::<String>().trim().parse().ok())
        .unwrap_or(0);
    let leechers = row
        .select(&leechers_sel)
        .next()
        .and_then(|el| el.text().collect::<String>().trim().parse().ok())
        .unwrap_or(0);

    let publish_date = row
        .select(&time_sel)
        .next()
        .and_then(|el| el.value().attr("datetime"))
        .and_then(|stamp| normalize::parse_absolute_date(stamp, profile.tz()))
        .unwrap_or_else(Utc::now);

    let category_label = match row.value().attr("data-category-id") {
        Some("1") => "Movies",
        Some("2") => "TV",
        Some("3") => "Anime Movies",
        Some("4") => "Anime TV Series",
        _ => "",
    };
    let category = normalize::map_category(category_label, &title);

    let imdb_id = row
        .value()
        .attr("data-imdb-id")
        .filter(|id| *id != "0" && !id.is_empty())
        .map(|id| format!("tt{}", id.trim_start_matches("tt")));
    let tmdb_id = row
        .value()
        .attr("data-tmdb-id")
        .filter(|id| *id != "0" && !id.is_empty())
        .map(|id| id.to_string());
    let tvdb_id = row
        .value()
        .attr("data-tvdb-id")
        .filter(|id| *id != "0" && !id.is_empty())
        .map(|id| id.to_string());

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
        tvdb_id,
    })
}
