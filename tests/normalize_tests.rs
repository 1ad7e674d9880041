use trackrr::normalize::{
    map_category, normalize_title, parse_relative_date, parse_season_episode, parse_size,
};

use chrono::{Duration, TimeZone, Utc};

#[test]
fn season_phrasings_map_to_padded_tokens() {
    let cases = [
        ("Temporada 3", "S03"),
        ("Tercera temporada", "S03"),
        ("Segunda Temporada", "S02"),
        ("Décima temporada", "S10"),
    ];
    for (input, expected) in cases {
        assert_eq!(normalize_title(input, true), expected, "for {:?}", input);
    }
}

#[test]
fn episodic_mode_drops_trailing_year_search_mode_keeps_it() {
    let title = "La Mesías - Temporada 1 (2023/WEB-DL/1080p)";
    let episodic = normalize_title(title, true);
    assert_eq!(episodic, "La Mesías S01 [WEB-DL/1080p]");

    assert_eq!(normalize_title("Wonka (2023)", false), "Wonka (2023)");
    assert_eq!(normalize_title("Wonka (2023)", true), "Wonka");
}

#[test]
fn normalization_is_idempotent_across_modes() {
    let samples = [
        "30 Monedas - Segunda temporada (2023/HMAX/WEB-DL/1080p)",
        "Serie - Temporada 2 (2020) Full BluRay",
        "Pelicula (2023) ESP/ING 4K",
        "Show /S01/E13/ CAST 1080p",
        "Temporada 7",
        "Algo sin marcas 720p",
    ];
    for sample in samples {
        for episodic in [true, false] {
            let once = normalize_title(sample, episodic);
            assert_eq!(
                normalize_title(&once, episodic),
                once,
                "not idempotent for {:?} (episodic={})",
                sample,
                episodic
            );
        }
    }
}

#[test]
fn size_convention_is_binary() {
    assert_eq!(parse_size("1.5 GB"), 1_610_612_736);
    assert_eq!(parse_size("750 MB"), 786_432_000);
    assert_eq!(parse_size("750 MiB"), 786_432_000);
    assert_eq!(parse_size("not a size"), 0);
}

#[test]
fn relative_dates_resolve_against_anchor() {
    let anchor = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();
    assert_eq!(
        parse_relative_date("hace 1 día", anchor),
        anchor - Duration::days(1)
    );
    assert_eq!(
        parse_relative_date("hace 5 horas", anchor),
        anchor - Duration::hours(5)
    );
    assert_eq!(parse_relative_date("hoy", anchor), anchor);
}

#[test]
fn unmapped_category_label_still_yields_a_code() {
    assert_eq!(map_category("Juegos", "Some Game"), "8000");
    assert_eq!(map_category("Películas", "Movie 2160p"), "2050");
}

#[test]
fn season_episode_round_trip_through_normalization() {
    let normalized = normalize_title("Serie /S02/E07/ WEB-DL ESP", true);
    assert_eq!(parse_season_episode(&normalized), (Some(2), Some(7)));
}
