//! FFprobe service for reading track metadata.

use crate::Result;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::process::Command;

/// Container metadata of one extracted track.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackMetadata {
    /// Duration in seconds.
    pub duration_secs: Option<f64>,
    /// Audio language tags in stream order, deduplicated.
    pub languages: Vec<String>,
    /// Any stream flagged default.
    pub default_flag: bool,
    /// Any stream flagged forced.
    pub forced_flag: bool,
}

/// Reads duration and stream flags from a media file.
///
/// Failure is reported as `None` so classification can degrade instead of
/// aborting.
pub trait MetadataProbe: Send + Sync {
    fn probe(&self, path: &Path) -> Option<TrackMetadata>;
}

/// FFprobe output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    format: Option<FfprobeFormat>,
}

/// FFprobe stream information.
#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    duration: Option<String>,
    #[serde(default)]
    tags: HashMap<String, String>,
    #[serde(default)]
    disposition: HashMap<String, i64>,
}

/// FFprobe format information.
#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    #[serde(default)]
    tags: HashMap<String, String>,
}

/// Probe backed by the `ffprobe` binary.
#[derive(Debug, Clone)]
pub struct FfprobeProbe {
    binary: String,
}

impl FfprobeProbe {
    pub fn new(binary: &str) -> Self {
        Self {
            binary: binary.to_string(),
        }
    }

    /// Check if ffprobe is installed.
    pub fn is_installed(&self) -> bool {
        Command::new(&self.binary)
            .arg("-version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    /// Get ffprobe version.
    pub fn version(&self) -> Result<String> {
        let output = Command::new(&self.binary).arg("-version").output()?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let first_line = stdout.lines().next().unwrap_or("unknown");

        Ok(first_line.to_string())
    }

    fn run(&self, path: &Path) -> Result<TrackMetadata> {
        let output = Command::new(&self.binary)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .output()?;

        if !output.status.success() {
            return Err(crate::Error::other(format!(
                "ffprobe failed for: {:?}",
                path
            )));
        }

        parse_output(&output.stdout)
    }
}

impl MetadataProbe for FfprobeProbe {
    fn probe(&self, path: &Path) -> Option<TrackMetadata> {
        match self.run(path) {
            Ok(meta) => Some(meta),
            Err(e) => {
                tracing::warn!("Probe failed for {}: {}", path.display(), e);
                None
            }
        }
    }
}

/// Parse `ffprobe -print_format json -show_format -show_streams` output.
pub fn parse_output(json: &[u8]) -> Result<TrackMetadata> {
    let ffprobe: FfprobeOutput = serde_json::from_slice(json)?;

    let format_duration = ffprobe.format.as_ref().and_then(|f| {
        f.duration
            .as_deref()
            .and_then(parse_seconds)
            .or_else(|| tag(&f.tags, "DURATION").and_then(parse_seconds))
    });

    // Matroska files from remux tools often only carry per-stream DURATION tags.
    let stream_duration = ffprobe
        .streams
        .iter()
        .filter_map(|s| {
            s.duration
                .as_deref()
                .and_then(parse_seconds)
                .or_else(|| tag(&s.tags, "DURATION").and_then(parse_seconds))
        })
        .fold(None::<f64>, |max, d| Some(max.map_or(d, |m| m.max(d))));

    let mut languages: Vec<String> = Vec::new();
    for stream in ffprobe
        .streams
        .iter()
        .filter(|s| s.codec_type.as_deref() == Some("audio"))
    {
        if let Some(lang) = tag(&stream.tags, "language") {
            let lang = lang.to_lowercase();
            if lang != "und" && !languages.contains(&lang) {
                languages.push(lang);
            }
        }
    }

    let flag = |name: &str| {
        ffprobe
            .streams
            .iter()
            .any(|s| s.disposition.get(name).copied().unwrap_or(0) != 0)
    };

    Ok(TrackMetadata {
        duration_secs: format_duration.or(stream_duration).filter(|d| *d > 0.0),
        languages,
        default_flag: flag("default"),
        forced_flag: flag("forced"),
    })
}

fn tag<'a>(tags: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    tags.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v.as_str())
}

/// Parse `5400.123` or `01:30:00.123000000` into seconds.
fn parse_seconds(s: &str) -> Option<f64> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<f64>() {
        return Some(secs);
    }

    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 3 {
        return None;
    }
    let hours: f64 = parts[0].parse().ok()?;
    let minutes: f64 = parts[1].parse().ok()?;
    let seconds: f64 = parts[2].parse().ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}
