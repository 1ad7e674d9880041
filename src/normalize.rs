//! Normalization of scraped tracker text into canonical values
//!
//! Everything the tracker parsers extract passes through here: size strings
//! become byte counts, Spanish relative dates become UTC timestamps, category
//! labels become Torznab codes, and listing titles are rewritten into the
//! shape the *arr clients can match against. Title normalization is
//! idempotent: running it over an already-normalized title is a no-op.

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;

/// Parse a size string like "1.5 GB" or "750 MiB" into bytes.
///
/// Binary convention throughout: every unit spelling is a power of 1024, so
/// "1.5 GB" is 1_610_612_736. Returns 0 when nothing parseable is found,
/// which the parsers keep as the "unknown size" sentinel.
pub fn parse_size(size_str: &str) -> u64 {
    static SIZE_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"([\d.]+)\s*([KMGT]?I?B)").unwrap());

    let upper = size_str.trim().to_uppercase().replace('\u{a0}', " ");
    let caps = match SIZE_RE.captures(&upper) {
        Some(c) => c,
        None => return 0,
    };

    let value: f64 = match caps[1].parse() {
        Ok(v) => v,
        Err(_) => return 0,
    };

    let multiplier: u64 = match &caps[2] {
        "B" => 1,
        "KB" | "KIB" => 1024,
        "MB" | "MIB" => 1024u64.pow(2),
        "GB" | "GIB" => 1024u64.pow(3),
        "TB" | "TIB" => 1024u64.pow(4),
        _ => 1,
    };

    (value * multiplier as f64) as u64
}

/// Parse an absolute listing date ("2023-10-07 17:37:29") given in the
/// tracker's local timezone, returning UTC.
pub fn parse_absolute_date(date_str: &str, tz: Tz) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(date_str.trim(), "%Y-%m-%d %H:%M:%S").ok()?;
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse a relative date phrase into a timestamp, anchored at `now`.
///
/// Handles the Spanish phrasing Unit3D trackers use ("hace 2 días",
/// "hace 1 hora", "hoy", "ayer") plus the English equivalents
/// ("2 days ago", "today", "yesterday"). Unknown phrases resolve to `now`.
pub fn parse_relative_date(relative_str: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    static NUM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)").unwrap());

    let text = relative_str.trim().to_lowercase();

    if text.contains("hoy") || text.contains("today") {
        return now;
    }
    if text.contains("ayer") || text.contains("yesterday") {
        return now - Duration::days(1);
    }

    let amount: i64 = NUM_RE
        .captures(&text)
        .and_then(|c| c[1].parse().ok())
        .unwrap_or(0);

    if text.contains("minuto") || text.contains("minute") || text.contains("min") {
        now - Duration::minutes(amount)
    } else if text.contains("hora") || text.contains("hour") {
        now - Duration::hours(amount)
    } else if text.contains("día") || text.contains("dia") || text.contains("day") {
        now - Duration::days(amount)
    } else if text.contains("semana") || text.contains("week") {
        now - Duration::weeks(amount)
    } else if text.contains("mes") || text.contains("month") {
        now - Duration::days(amount * 30)
    } else if text.contains("año") || text.contains("ano") || text.contains("year") {
        now - Duration::days(amount * 365)
    } else {
        now
    }
}

/// Map a tracker category label to a Torznab category code, refining
/// movie/TV into SD/HD/UHD subcategories from quality markers in the title.
/// Labels that match nothing fall back to "8000" (Other) so the row is
/// still delivered.
pub fn map_category(category_text: &str, title: &str) -> String {
    static SD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(SD|480P|576P)\b").unwrap());
    static HD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(HD|720P|1080P)\b").unwrap());
    static UHD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(UHD|2160P|4K)\b").unwrap());

    let category = category_text.to_lowercase();
    let title_upper = title.to_uppercase();

    let is_sd = SD_RE.is_match(&title_upper);
    let is_hd = HD_RE.is_match(&title_upper);
    let is_uhd = UHD_RE.is_match(&title_upper);

    let movie_words = ["película", "pelicula", "movie", "film", "cine"];
    let tv_words = ["serie", "tv", "television", "temporada"];

    if movie_words.iter().any(|w| category.contains(w)) {
        if is_uhd {
            "2050".to_string()
        } else if is_hd {
            "2040".to_string()
        } else if is_sd {
            "2030".to_string()
        } else {
            "2000".to_string()
        }
    } else if tv_words.iter().any(|w| category.contains(w)) {
        if is_uhd {
            "5050".to_string()
        } else if is_hd {
            "5040".to_string()
        } else if is_sd {
            "5030".to_string()
        } else {
            "5000".to_string()
        }
    } else if category.contains("anime") {
        if category.contains("serie") || category.contains("tv") {
            "5070".to_string()
        } else {
            "2000".to_string()
        }
    } else {
        "8000".to_string()
    }
}

/// Detect language tags from title markers. Spanish trackers tag releases
/// with short upper-case tokens (ESP, CAST, LAT, DUAL...); a title with no
/// marker at all is assumed Spanish.
pub fn parse_languages(title: &str) -> Vec<String> {
    static DUAL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(DUAL|MULTI)\b").unwrap());

    static LANG_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
        vec![
            ("Spanish", Regex::new(r"\b(ESP|SPA|CAST|ESPAÑOL|SPANISH)\b").unwrap()),
            ("English", Regex::new(r"\b(ING|ENG|INGLES|INGLÉS|ENGLISH)\b").unwrap()),
            ("Latino", Regex::new(r"\b(LAT|LATINO)\b").unwrap()),
            ("French", Regex::new(r"\b(FRA|FRE|FRANCES|FRANCÉS)\b").unwrap()),
            ("German", Regex::new(r"\b(GER|ALE|ALEMAN|ALEMÁN)\b").unwrap()),
            ("Italian", Regex::new(r"\b(ITA|ITALIANO)\b").unwrap()),
            ("Portuguese", Regex::new(r"\b(POR|PORT|PORTUGUES|PORTUGUÉS)\b").unwrap()),
            ("Japanese", Regex::new(r"\b(JAP|JPN|JAPONES|JAPONÉS)\b").unwrap()),
            ("Korean", Regex::new(r"\b(KOR|COREANO)\b").unwrap()),
        ]
    });

    let upper = title.to_uppercase();

    if DUAL_RE.is_match(&upper) {
        return vec!["Spanish".to_string(), "English".to_string()];
    }

    let mut detected = Vec::new();
    for (name, re) in LANG_PATTERNS.iter() {
        if re.is_match(&upper) {
            detected.push(name.to_string());
        }
    }

    if detected.is_empty() {
        detected.push("Spanish".to_string());
    }
    detected
}

const ORDINALS: &[(&str, u32)] = &[
    ("primera", 1),
    ("segunda", 2),
    ("tercera", 3),
    ("cuarta", 4),
    ("quinta", 5),
    ("sexta", 6),
    ("séptima", 7),
    ("septima", 7),
    ("octava", 8),
    ("novena", 9),
    ("décima", 10),
    ("decima", 10),
];

fn ordinal_number(word: &str) -> u32 {
    let lower = word.to_lowercase();
    ORDINALS
        .iter()
        .find(|(w, _)| *w == lower)
        .map(|(_, n)| *n)
        .unwrap_or(1)
}

/// Rewrite the Spanish season phrasing Unit3D uploaders use into the
/// `S{NN}` token the *arr clients parse. Handles the full release shapes
/// ("Serie - Segunda temporada (2023/HMAX/WEB-DL)") and plain inline
/// occurrences ("Temporada 3", "Tercera temporada").
fn transform_season_format(title: &str) -> String {
    // "Serie - Segunda temporada (2023/HMAX/WEB-DL/...)"
    static FULL_ORDINAL: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)^(.+?)\s*-\s*(primera|segunda|tercera|cuarta|quinta|sexta|s[eé]ptima|octava|novena|d[eé]cima)\s+temporada\s*\((\d{4})/(.*?)\)$").unwrap()
    });
    // "Serie - Temporada 2 (2023/WEB-DL/...)"
    static FULL_NUMERIC: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)^(.+?)\s*-\s*temporada\s+(\d{1,2})\s*\((\d{4})/(.*?)\)$").unwrap()
    });
    // "Serie - Segunda temporada (2023) info sin slash"
    static TAIL_ORDINAL: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)^(.+?)\s*-\s*(primera|segunda|tercera|cuarta|quinta|sexta|s[eé]ptima|octava|novena|d[eé]cima)\s+temporada\s*\((\d{4})\)\s+(.+)$").unwrap()
    });
    // "Serie - Temporada 2 (2023) info sin slash"
    static TAIL_NUMERIC: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)^(.+?)\s*-\s*temporada\s+(\d{1,2})\s*\((\d{4})\)\s+(.+)$").unwrap()
    });
    // Inline fallbacks for titles that do not follow the release shape
    static INLINE_ORDINAL: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)\b(primera|segunda|tercera|cuarta|quinta|sexta|s[eé]ptima|octava|novena|d[eé]cima)\s+temporada\b").unwrap()
    });
    static INLINE_NUMERIC: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?i)\btemporada\s+(\d{1,2})\b").unwrap());

    if let Some(caps) = FULL_ORDINAL.captures(title) {
        let season = ordinal_number(&caps[2]);
        return format!("{} S{:02} [{}]", caps[1].trim(), season, caps[4].trim());
    }
    if let Some(caps) = FULL_NUMERIC.captures(title) {
        let season: u32 = caps[2].parse().unwrap_or(1);
        return format!("{} S{:02} [{}]", caps[1].trim(), season, caps[4].trim());
    }
    if let Some(caps) = TAIL_ORDINAL.captures(title) {
        let season = ordinal_number(&caps[2]);
        return format!("{} S{:02} [{}]", caps[1].trim(), season, caps[4].trim());
    }
    if let Some(caps) = TAIL_NUMERIC.captures(title) {
        let season: u32 = caps[2].parse().unwrap_or(1);
        return format!("{} S{:02} [{}]", caps[1].trim(), season, caps[4].trim());
    }

    let inline = INLINE_ORDINAL
        .replace_all(title, |caps: &regex::Captures| {
            format!("S{:02}", ordinal_number(&caps[1]))
        })
        .to_string();
    INLINE_NUMERIC
        .replace_all(&inline, |caps: &regex::Captures| {
            format!("S{:02}", caps[1].parse::<u32>().unwrap_or(1))
        })
        .to_string()
}

/// Remove every trailing "(YYYY)" group. Stripping all of them at once
/// keeps the operation idempotent even for titles that carry two years.
fn strip_trailing_year(title: &str) -> String {
    static TRAILING_YEAR: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?:\s*\(\d{4}\))+\s*$").unwrap());
    TRAILING_YEAR.replace(title, "").trim().to_string()
}

/// Normalize a listing title into the form the *arr clients match against.
///
/// `episodic` marks TV-search mode, where a trailing "(YYYY)" conflicts
/// with season/episode matching in the consuming client and is dropped;
/// movie titles keep their year.
pub fn normalize_title(title: &str, episodic: bool) -> String {
    static SPANISH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?i:ESP|SPA|CAST)\b").unwrap());
    static ENGLISH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"/?\b(?i:ING|ENG)\b/?").unwrap());
    static SPLIT_EPISODE_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?i)/S(\d{1,2})/E(\d{1,2})/").unwrap());
    static MULTI_SLASH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"/+").unwrap());
    static SLASH_CLOSE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"/+\)").unwrap());
    static OPEN_SLASH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(/+").unwrap());
    static SPACES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

    let mut t = transform_season_format(title);

    t = SPANISH_RE.replace_all(&t, "SPANiSH").to_string();
    t = ENGLISH_RE.replace_all(&t, "").to_string();

    // "/S01/E13/" -> "/S01E13/"
    t = SPLIT_EPISODE_RE.replace_all(&t, "/S${1}E${2}/").to_string();

    // Collapse slash runs left behind by the removals
    t = MULTI_SLASH_RE.replace_all(&t, "/").to_string();
    t = SLASH_CLOSE_RE.replace_all(&t, ")").to_string();
    t = OPEN_SLASH_RE.replace_all(&t, "(").to_string();

    if episodic {
        t = strip_trailing_year(&t);
    }

    SPACES_RE.replace_all(&t, " ").trim().to_string()
}

/// Extract season and episode numbers from a title, trying the formats the
/// trackers actually emit: "S01E02", "/S01/E02/", "1x02", and the spelled
/// out Spanish/English variants.
pub fn parse_season_episode(title: &str) -> (Option<u32>, Option<u32>) {
    static PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
        vec![
            Regex::new(r"/S(\d{1,2})/E(\d{1,2})/").unwrap(),
            Regex::new(r"S(\d{1,2})E(\d{1,2})").unwrap(),
            Regex::new(r"(\d{1,2})X(\d{1,2})").unwrap(),
            Regex::new(r"SEASON\s+(\d{1,2})\s+EPISODE\s+(\d{1,2})").unwrap(),
            Regex::new(r"TEMPORADA\s+(\d{1,2})\s+CAPITULO\s+(\d{1,2})").unwrap(),
        ]
    });

    let upper = title.to_uppercase();
    for re in PATTERNS.iter() {
        if let Some(caps) = re.captures(&upper) {
            let season = caps[1].parse().ok();
            let episode = caps[2].parse().ok();
            return (season, episode);
        }
    }
    (None, None)
}

/// Extract a bare season number (full season packs carry no episode)
pub fn parse_season_only(title: &str) -> Option<u32> {
    static PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
        vec![
            Regex::new(r"/S(\d{1,2})/").unwrap(),
            Regex::new(r"S(\d{1,2})(?:[^E\d]|$)").unwrap(),
            Regex::new(r"SEASON\s+(\d{1,2})").unwrap(),
            Regex::new(r"TEMPORADA\s+(\d{1,2})").unwrap(),
        ]
    });

    let upper = title.to_uppercase();

    for (word, num) in ORDINALS {
        if upper.contains(&format!("{} TEMPORADA", word.to_uppercase())) {
            return Some(*num);
        }
    }

    for re in PATTERNS.iter() {
        if let Some(caps) = re.captures(&upper) {
            if let Ok(season) = caps[1].parse() {
                return Some(season);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn size_binary_units() {
        assert_eq!(parse_size("1.5 GB"), 1_610_612_736);
        assert_eq!(parse_size("750 MB"), 786_432_000);
        assert_eq!(parse_size("2 GiB"), 2_147_483_648);
        assert_eq!(parse_size("512 B"), 512);
        assert_eq!(parse_size("1 TiB"), 1_099_511_627_776);
    }

    #[test]
    fn size_sentinel_on_garbage() {
        assert_eq!(parse_size(""), 0);
        assert_eq!(parse_size("N/A"), 0);
    }

    #[test]
    fn relative_dates_spanish() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
        assert_eq!(parse_relative_date("hace 2 días", now), now - Duration::days(2));
        assert_eq!(parse_relative_date("hace 3 horas", now), now - Duration::hours(3));
        assert_eq!(parse_relative_date("hace 1 semana", now), now - Duration::weeks(1));
        assert_eq!(parse_relative_date("hoy", now), now);
        assert_eq!(parse_relative_date("ayer", now), now - Duration::days(1));
    }

    #[test]
    fn relative_dates_english() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
        assert_eq!(parse_relative_date("2 days ago", now), now - Duration::days(2));
        assert_eq!(parse_relative_date("yesterday", now), now - Duration::days(1));
        assert_eq!(parse_relative_date("today", now), now);
    }

    #[test]
    fn absolute_date_is_tracker_local() {
        // Winter: Madrid is UTC+1
        let dt = parse_absolute_date("2023-12-07 17:37:29", chrono_tz::Europe::Madrid).unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2023, 12, 7, 16, 37, 29).unwrap());
    }

    #[test]
    fn category_mapping() {
        assert_eq!(map_category("Películas", "Movie 1080p"), "2040");
        assert_eq!(map_category("Series", "Show S01 2160p UHD"), "5050");
        assert_eq!(map_category("Serie", "Show S01"), "5000");
        assert_eq!(map_category("Anime Series", "Show"), "5070");
    }

    #[test]
    fn unmapped_category_falls_back_to_other() {
        assert_eq!(map_category("Ebooks", "Some Book"), "8000");
        assert_eq!(map_category("", "Anything"), "8000");
    }

    #[test]
    fn languages_from_markers() {
        assert_eq!(parse_languages("Show S01 ESP 1080p"), vec!["Spanish"]);
        assert_eq!(
            parse_languages("Show S01 DUAL 1080p"),
            vec!["Spanish", "English"]
        );
        assert_eq!(parse_languages("Show S01 LAT"), vec!["Latino"]);
        // no marker on a Spanish tracker means Spanish
        assert_eq!(parse_languages("Show S01 1080p"), vec!["Spanish"]);
    }

    #[test]
    fn season_phrases_rewritten() {
        assert_eq!(normalize_title("Temporada 3", true), "S03");
        assert_eq!(normalize_title("Tercera temporada", true), "S03");
        assert_eq!(normalize_title("Segunda Temporada", true), "S02");
    }

    #[test]
    fn full_release_shape_rewritten() {
        assert_eq!(
            normalize_title("30 Monedas - Segunda temporada (2023/HMAX/WEB-DL/1080p)", true),
            "30 Monedas S02 [HMAX/WEB-DL/1080p]"
        );
        assert_eq!(
            normalize_title("30 monedas - Temporada 2 (2020) Full BluRay 1080p", true),
            "30 monedas S02 [Full BluRay 1080p]"
        );
    }

    #[test]
    fn spanish_markers_canonicalized() {
        assert_eq!(
            normalize_title("Movie (2023) ESP 1080p", false),
            "Movie (2023) SPANiSH 1080p"
        );
        assert_eq!(
            normalize_title("Show S01E01 CAST/ING 1080p", false),
            "Show S01E01 SPANiSH 1080p"
        );
    }

    #[test]
    fn split_episode_token_joined() {
        assert_eq!(
            normalize_title("Show /S01/E13/ 1080p", false),
            "Show /S01E13/ 1080p"
        );
    }

    #[test]
    fn year_stripped_only_in_episodic_mode() {
        assert_eq!(normalize_title("Show S01 (2023)", true), "Show S01");
        assert_eq!(normalize_title("Movie (2023)", false), "Movie (2023)");
    }

    #[test]
    fn normalization_is_idempotent() {
        let samples = [
            "30 Monedas - Segunda temporada (2023/HMAX/WEB-DL/1080p)",
            "Temporada 3",
            "Movie (2023) ESP 1080p",
            "Show /S01/E13/ CAST/ING 1080p",
            "Show S01 (2023)",
            "Plain Title 720p",
            "The Office (2005) (2005)",
        ];
        for sample in samples {
            for episodic in [true, false] {
                let once = normalize_title(sample, episodic);
                let twice = normalize_title(&once, episodic);
                assert_eq!(once, twice, "not idempotent for {:?}", sample);
            }
        }
    }

    #[test]
    fn season_episode_extraction() {
        assert_eq!(parse_season_episode("Show S01E02 1080p"), (Some(1), Some(2)));
        assert_eq!(parse_season_episode("Show 1x02"), (Some(1), Some(2)));
        assert_eq!(parse_season_episode("Show /S03/E11/ 720p"), (Some(3), Some(11)));
        assert_eq!(parse_season_episode("Movie (2023)"), (None, None));
    }

    #[test]
    fn season_only_extraction() {
        assert_eq!(parse_season_only("Show S02 1080p"), Some(2));
        assert_eq!(parse_season_only("Show Tercera Temporada"), Some(3));
        assert_eq!(parse_season_only("Show Temporada 4"), Some(4));
        assert_eq!(parse_season_only("Movie (2023)"), None);
    }
}
