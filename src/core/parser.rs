//! Name parser module.
//!
//! Derives titles, years, season and disc numbers from disc folder names
//! such as `Heat (1995) [Director's Cut]` or `Deep Space Nine Season 1 Disc 2`.

use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

/// Folder names that never identify a title.
const GENERIC_LABELS: &[&str] = &[
    "video_ts", "bdmv", "disc", "disk", "dvd", "bluray", "blu-ray", "iso", "movie", "movies",
    "tv", "title", "untitled", "unknown", "certificate", "backup",
];

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static pattern"))
}

/// Make a string safe for use as a file name.
pub fn sanitize_filename(name: &str) -> String {
    static INVALID: OnceLock<Regex> = OnceLock::new();
    static SPACES: OnceLock<Regex> = OnceLock::new();

    let replaced = regex(&INVALID, r#"[\\/:*?"<>|\x00-\x1F]"#).replace_all(name.trim(), "_");
    let collapsed = regex(&SPACES, r"\s+").replace_all(&replaced, " ");
    collapsed
        .trim()
        .trim_end_matches(|c| matches!(c, '.' | '_' | '-' | ' '))
        .to_string()
}

/// Split `Title (1999) [Version]` into its parts.
pub fn parse_name_year(base: &str) -> (String, Option<u16>, Option<String>) {
    static VERSION: OnceLock<Regex> = OnceLock::new();
    static YEAR: OnceLock<Regex> = OnceLock::new();

    let mut name = base.to_string();
    let mut version = None;

    let version_re = regex(&VERSION, r"\s*\[(.+?)\]\s*");
    if let Some(caps) = version_re.captures(&name) {
        version = caps.get(1).map(|m| m.as_str().trim().to_string());
        name = version_re.replace_all(&name, " ").trim().to_string();
    }

    let year_re = regex(&YEAR, r"\s*\((\d{4})\)\s*");
    let year = year_re
        .captures(&name)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u16>().ok());
    if year.is_some() {
        name = year_re.replace_all(&name, " ").trim().to_string();
    }

    (sanitize_filename(&name), year, version)
}

/// Extract a season number (`Staffel 1`, `Season 02`, `S01`, `s1`).
pub fn extract_season(s: &str) -> Option<u16> {
    static STAFFEL: OnceLock<Regex> = OnceLock::new();
    static SEASON: OnceLock<Regex> = OnceLock::new();
    static SHORT: OnceLock<Regex> = OnceLock::new();

    let patterns = [
        regex(&STAFFEL, r"(?i)\bStaffel\s*(\d{1,2})\b"),
        regex(&SEASON, r"(?i)\bSeason\s*(\d{1,2})\b"),
        regex(&SHORT, r"(?i)\bS\s*[_\-.]?(\d{1,2})(?:\b|D\d)"),
    ];

    patterns.iter().find_map(|re| {
        re.captures(s)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
    })
}

/// Extract a disc number (`Disc 1`, `Disk 2`, `DVD 3`, `D4`, `S1D2`, `CD 1`).
pub fn extract_disc_no(s: &str) -> Option<u16> {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();

    let patterns = PATTERNS.get_or_init(|| {
        [
            r"(?i)\bDisc\s*(\d{1,2})\b",
            r"(?i)\bDisk\s*(\d{1,2})\b",
            r"(?i)\bDVD\s*(\d{1,2})\b",
            r"(?i)\bS\d{1,2}D(\d{1,2})\b",
            r"(?i)\bD\s*(\d{1,2})\b",
            r"(?i)\bCD\s*(\d{1,2})\b",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("static pattern"))
        .collect()
    });

    let s = s.replace('_', " ");
    patterns.iter().find_map(|re| {
        re.captures(&s)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
    })
}

/// Strip season and disc tokens from a series folder name.
pub fn clean_series_base(series_base: &str) -> String {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    static SEPARATORS: OnceLock<Regex> = OnceLock::new();

    let patterns = PATTERNS.get_or_init(|| {
        [
            r"(?i)\bS\d{1,2}D\d{1,2}\b",
            r"(?i)\bStaffel\s*\d{1,2}\b",
            r"(?i)\bSeason\s*\d{1,2}\b",
            r"(?i)\bS(?:eason)?\s*[_\-.]?\d{1,2}\b",
            r"(?i)\bDisc\s*\d{1,2}\b",
            r"(?i)\bDisk\s*\d{1,2}\b",
            r"(?i)\bDVD\s*\d{1,2}\b",
            r"(?i)\bD\s*\d{1,2}\b",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("static pattern"))
        .collect()
    });

    let mut s = series_base.replace('_', " ");
    for re in patterns {
        s = re.replace_all(&s, "").to_string();
    }
    let s = regex(&SEPARATORS, r"[ \t\-_.]+").replace_all(&s, " ");
    sanitize_filename(&s)
}

/// Series name, season and disc number for a TV disc folder.
///
/// Season and disc fall back to the parent folder name when the item
/// itself does not carry them, and so does the series name.
pub fn series_info(item_root: &Path) -> (String, Option<u16>, Option<u16>) {
    let base = item_name(item_root);
    let parent = item_root
        .parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let season = extract_season(&base).or_else(|| extract_season(&parent));
    let disc = extract_disc_no(&base).or_else(|| extract_disc_no(&parent));

    let mut cleaned = clean_series_base(&base);
    if recognizable_title(&cleaned).is_none() {
        cleaned = clean_series_base(&parent);
    }

    (cleaned, season, disc)
}

/// Display name of an item root: the file stem for ISO images, the folder
/// name otherwise.
pub fn item_name(item_root: &Path) -> String {
    let is_iso = item_root
        .extension()
        .map(|e| e.eq_ignore_ascii_case("iso"))
        .unwrap_or(false);
    let name = if is_iso {
        item_root.file_stem()
    } else {
        item_root.file_name()
    };
    name.map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// A title parsed from a folder name, if it looks like one.
pub fn recognizable_title(name: &str) -> Option<String> {
    let (title, _, _) = parse_name_year(name);
    if title.is_empty() || !title.chars().any(|c| c.is_alphabetic()) {
        return None;
    }

    let lower = title.to_lowercase();
    let stripped = lower.trim_end_matches(|c: char| c.is_ascii_digit() || c == ' ');
    if GENERIC_LABELS.contains(&lower.as_str()) || GENERIC_LABELS.contains(&stripped) {
        return None;
    }

    Some(title)
}
