//! Filename generator.

use crate::core::parser::sanitize_filename;
use crate::models::disc::TitleInfo;
use regex::Regex;
use std::sync::OnceLock;

/// Generate main feature filename.
///
/// Format: `${title} (${year})( [${version}]).${ext}`
pub fn main_feature_filename(title: &TitleInfo, extension: &str) -> String {
    let base = match &title.version {
        Some(version) => format!("{} [{}]", title.folder_name(), version),
        None => title.folder_name(),
    };
    format!("{}.{}", sanitize_filename(&base), extension)
}

/// Generate bonus filename.
///
/// Format: `${title} (${year}) - extra${NN}.${ext}`
pub fn bonus_filename(title: &TitleInfo, ordinal: u32, extension: &str) -> String {
    format!(
        "{} - extra{:02}.{}",
        sanitize_filename(&title.folder_name()),
        ordinal,
        extension
    )
}

/// Generate trailer filename.
///
/// Format: `${title} (${year}) - trailer${NN}.${ext}`
pub fn trailer_filename(title: &TitleInfo, ordinal: u32, extension: &str) -> String {
    format!(
        "{} - trailer{:02}.{}",
        sanitize_filename(&title.folder_name()),
        ordinal,
        extension
    )
}

/// Generate episode filename.
///
/// Format: `${series} - S${NN}E${MM}(-E${MM+1}).${ext}`
pub fn episode_filename(
    series: &str,
    season: u16,
    episode: u32,
    last_episode: Option<u32>,
    extension: &str,
) -> String {
    let span = match last_episode {
        Some(last) if last != episode => format!("S{:02}E{:02}-E{:02}", season, episode, last),
        _ => format!("S{:02}E{:02}", season, episode),
    };
    format!("{} - {}.{}", sanitize_filename(series), span, extension)
}

/// Generate play-all filename.
///
/// Format: `${series} - playall${NN}.${ext}`
pub fn play_all_filename(series: &str, ordinal: u32, extension: &str) -> String {
    format!("{} - playall{:02}.{}", sanitize_filename(series), ordinal, extension)
}

/// Generate fallback filename.
///
/// Format: `${name} track${NN}.${ext}`, or `track${NN}.${ext}` without a name.
pub fn fallback_filename(name: Option<&str>, ordinal: u32, extension: &str) -> String {
    match name.map(sanitize_filename).filter(|n| !n.is_empty()) {
        Some(name) => format!("{} track{:02}.{}", name, ordinal, extension),
        None => format!("track{:02}.{}", ordinal, extension),
    }
}

/// Episode span found in a file name: season, first and optional last episode.
pub fn parse_episode_span(file_name: &str) -> Option<(u16, u32, Option<u32>)> {
    static SPAN: OnceLock<Regex> = OnceLock::new();
    let re = SPAN.get_or_init(|| {
        Regex::new(r"(?i)S(\d{1,2})E(\d{1,3})(?:[-_ ]?E(\d{1,3}))?").expect("static pattern")
    });

    let caps = re.captures(file_name)?;
    let season = caps.get(1)?.as_str().parse().ok()?;
    let first = caps.get(2)?.as_str().parse().ok()?;
    let last = caps.get(3).and_then(|m| m.as_str().parse().ok());
    Some((season, first, last))
}

/// Rename an episode file produced by an external matcher to the library
/// schema, keeping any episode title it appended.
///
/// Returns `None` when the name carries no episode span.
pub fn normalize_episode_name(file_name: &str, series: &str) -> Option<String> {
    static SPAN: OnceLock<Regex> = OnceLock::new();
    static EDGES: OnceLock<Regex> = OnceLock::new();

    let (season, first, last) = parse_episode_span(file_name)?;
    let (stem, extension) = match file_name.rsplit_once('.') {
        Some((stem, ext)) => (stem, ext.to_lowercase()),
        None => (file_name, "mkv".to_string()),
    };

    let span_re = SPAN.get_or_init(|| {
        Regex::new(r"(?i)S\d{1,2}E\d{1,3}(?:[-_ ]?E\d{1,3})?").expect("static pattern")
    });
    let edges_re =
        EDGES.get_or_init(|| Regex::new(r"^[\s\-_.]+|[\s\-_.]+$").expect("static pattern"));

    let rest = span_re.replace(stem, "");
    let mut episode_title = edges_re.replace_all(&rest, "").replace(['_', '.'], " ");
    let series_prefix = sanitize_filename(series);
    if episode_title
        .to_lowercase()
        .starts_with(&series_prefix.to_lowercase())
    {
        if let Some(rest) = episode_title.get(series_prefix.len()..) {
            episode_title = rest.to_string();
        }
    }
    let episode_title = sanitize_filename(
        episode_title.trim_matches(|c: char| c.is_whitespace() || c == '-'),
    );

    let base = episode_filename(series, season, first, last, &extension);
    if episode_title.is_empty() {
        Some(base)
    } else {
        let (base_stem, _) = base.rsplit_once('.').unwrap_or((base.as_str(), ""));
        Some(format!("{} - {}.{}", base_stem, episode_title, extension))
    }
}
