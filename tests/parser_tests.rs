use trackrr::indexers::IndexerProfile;
use trackrr::trackers;

fn profile(id: &str, variant: &str) -> IndexerProfile {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "name": id,
        "url": "https://t.example",
        "username": "u",
        "password": "p",
        "enabled": true,
        "variant": variant
    }))
    .unwrap()
}

const TORRENTLAND_PAGE: &str = r#"
<html><body>
<table class="modern-data-table"><tbody>
  <tr>
    <td><a class="view-torrent torrent-listings-name" href="/torrents/100">
        La Casa - Primera temporada (2022/WEB-DL/ESP/1080p)</a>
        <span class="label" data-original-title="Categoria">Series</span></td>
    <td class="torrent-listings-size"><span class="badge-extra">4.0 GiB</span></td>
    <td class="torrent-listings-seeders"><span class="badge-extra">9</span></td>
    <td class="torrent-listings-leechers"><span class="badge-extra">1</span></td>
    <td class="torrent-listings-age"><span class="badge-extra">hace 3 horas</span></td>
  </tr>
  <tr>
    <td>an advertisement row with no torrent link</td>
  </tr>
  <tr>
    <td><a class="view-torrent torrent-listings-name" href="/torrents/101">
        Otra Cosa (2021) DUAL 2160p</a>
        <span class="label" data-original-title="Categoria">Películas</span></td>
    <td class="torrent-listings-seeders"><span class="badge-extra">not-a-number</span></td>
  </tr>
</tbody></table>
</body></html>"#;

const UNIT3D_PAGE: &str = r#"
<html><body>
<table class="data-table"><tbody>
  <tr class="torrent-search--list__row" data-torrent-id="555"
      data-category-id="1" data-imdb-id="0" data-tmdb-id="888" data-tvdb-id="0">
    <td><a class="torrent-search--list__name" href="/torrents/555">
        Una Peli (2024) SPA 1080p</a></td>
    <td class="torrent-search--list__size"><span>9.8 GiB</span></td>
    <td class="torrent-search--list__seeders"><span>30</span></td>
    <td class="torrent-search--list__leechers"><span>4</span></td>
    <td class="torrent-search--list__age">
        <time datetime="2024-01-15 12:30:45">un rato</time></td>
  </tr>
</tbody></table>
</body></html>"#;

#[test]
fn variant_dispatch_routes_to_the_right_parser() {
    let tl = profile("tl", "torrentland");
    let results = trackers::parse_results(&tl, TORRENTLAND_PAGE, 100);
    assert_eq!(results.len(), 2);

    let u3 = profile("xb", "unit3d");
    let results = trackers::parse_results(&u3, UNIT3D_PAGE, 100);
    assert_eq!(results.len(), 1);

    // Markup of the other variant yields nothing, not garbage
    assert!(trackers::parse_results(&tl, UNIT3D_PAGE, 100).is_empty());
    assert!(trackers::parse_results(&u3, TORRENTLAND_PAGE, 100).is_empty());
}

#[test]
fn rows_without_a_download_reference_are_skipped() {
    let tl = profile("tl", "torrentland");
    let results = trackers::parse_results(&tl, TORRENTLAND_PAGE, 100);
    // 3 rows in the fixture, the ad row is dropped
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].guid, "tl-100");
    assert_eq!(results[1].guid, "tl-101");
}

#[test]
fn partial_rows_degrade_to_sentinels() {
    let tl = profile("tl", "torrentland");
    let results = trackers::parse_results(&tl, TORRENTLAND_PAGE, 100);

    let degraded = &results[1];
    assert_eq!(degraded.size, 0);
    assert_eq!(degraded.seeders, 0);
    assert_eq!(degraded.leechers, 0);
    // category still mapped from its label
    assert_eq!(degraded.category, "2050");
    assert_eq!(degraded.languages, vec!["Spanish", "English"]);
}

#[test]
fn canonical_fields_are_normalized() {
    let tl = profile("tl", "torrentland");
    let results = trackers::parse_results(&tl, TORRENTLAND_PAGE, 100);

    let first = &results[0];
    assert_eq!(first.size, 4_294_967_296);
    assert_eq!(first.category, "5040");
    assert!(first.title.starts_with("La Casa S01 ["));
    assert!(first.title.contains("SPANiSH"));
    assert!(first.original_title.contains("Primera temporada"));

    let u3 = profile("xb", "unit3d");
    let results = trackers::parse_results(&u3, UNIT3D_PAGE, 100);
    let only = &results[0];
    assert_eq!(only.tmdb_id.as_deref(), Some("888"));
    assert!(only.imdb_id.is_none());
    assert_eq!(only.category, "2040");
}
