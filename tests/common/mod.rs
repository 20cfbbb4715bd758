//! Shared helpers for integration tests.
#![allow(dead_code)]

use disc_organizer::core::remux::SpaceProbe;
use disc_organizer::models::config::Config;
use disc_organizer::services::ffprobe::{MetadataProbe, TrackMetadata};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Durations keyed by file name.
#[derive(Debug, Default)]
pub struct MapProbe {
    durations: HashMap<String, f64>,
}

impl MapProbe {
    pub fn new(durations: &[(&str, f64)]) -> Self {
        Self {
            durations: durations
                .iter()
                .map(|(name, secs)| (name.to_string(), *secs))
                .collect(),
        }
    }
}

impl MetadataProbe for MapProbe {
    fn probe(&self, path: &Path) -> Option<TrackMetadata> {
        let name = path.file_name()?.to_string_lossy().to_string();
        self.durations.get(&name).map(|secs| TrackMetadata {
            duration_secs: Some(*secs),
            languages: vec!["eng".to_string()],
            ..Default::default()
        })
    }
}

/// Free space that never changes.
#[derive(Debug, Clone, Copy)]
pub struct FixedSpace(pub Option<u64>);

impl SpaceProbe for FixedSpace {
    fn available(&self, _path: &Path) -> Option<u64> {
        self.0
    }
}

pub const MIN: f64 = 60.0;

/// Feature, extra and trailer as produced by `MOVIE_TOOL`.
pub fn movie_probe() -> MapProbe {
    MapProbe::new(&[
        ("title_t00.mkv", 138.0 * MIN),
        ("title_t01.mkv", 5.0 * MIN),
        ("title_t02.mkv", 3.0 * MIN),
    ])
}

/// Two single episodes and one double as produced by `TV_TOOL`.
pub fn tv_probe() -> MapProbe {
    MapProbe::new(&[
        ("title_t00.mkv", 44.0 * MIN),
        ("title_t01.mkv", 46.0 * MIN),
        ("title_t02.mkv", 91.0 * MIN),
    ])
}

/// Tool body writing a movie disc's tracks into `$dest`.
pub const MOVIE_TOOL: &str = r#"
echo 'MSG:1005,0,1,"MakeMKV v1.17.7 linux(x64-release) started","%1 started","MakeMKV v1.17.7"'
echo 'TCOUNT:3'
echo 'PRGT:5017,0,"Saving all titles to MKV files"'
echo 'PRGV:0,16384,65536'
echo 'PRGV:0,65536,65536'
head -c 4000 /dev/zero > "$dest/title_t00.mkv"
head -c 300 /dev/zero > "$dest/title_t01.mkv"
head -c 200 /dev/zero > "$dest/title_t02.mkv"
echo 'MSG:5036,0,1,"Copy complete. 3 titles saved.","Copy complete. %1 titles saved.","3"'
"#;

/// Tool body writing a TV disc's tracks into `$dest`.
pub const TV_TOOL: &str = r#"
echo 'TCOUNT:3'
head -c 1000 /dev/zero > "$dest/title_t00.mkv"
head -c 1100 /dev/zero > "$dest/title_t01.mkv"
head -c 2100 /dev/zero > "$dest/title_t02.mkv"
"#;

/// Write an executable fake remux tool.
///
/// Every launch appends its arguments to `launches.log` next to the script,
/// and `$dest` holds the last argument.
#[cfg(unix)]
pub fn write_tool(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-makemkvcon");
    let script = format!(
        "#!/bin/sh\necho \"$*\" >> \"{}\"\nfor dest; do :; done\n{}\n",
        dir.join("launches.log").display(),
        body
    );
    fs::write(&path, script).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Number of times the fake tool was launched.
pub fn launches(dir: &Path) -> usize {
    fs::read_to_string(dir.join("launches.log"))
        .map(|s| s.lines().count())
        .unwrap_or(0)
}

/// Create `<item>/BDMV/index.bdmv` plus a stream file; returns the BDMV folder.
pub fn make_bdmv(item: &Path) -> PathBuf {
    let bdmv = item.join("BDMV");
    fs::create_dir_all(bdmv.join("STREAM")).unwrap();
    fs::write(bdmv.join("index.bdmv"), b"INDX0200").unwrap();
    fs::write(bdmv.join("STREAM").join("00000.m2ts"), vec![0u8; 2048]).unwrap();
    bdmv
}

/// Create `<item>/VIDEO_TS`, with or without `VIDEO_TS.IFO`.
pub fn make_video_ts(item: &Path, with_ifo: bool) -> PathBuf {
    let video_ts = item.join("VIDEO_TS");
    fs::create_dir_all(&video_ts).unwrap();
    if with_ifo {
        fs::write(video_ts.join("VIDEO_TS.IFO"), b"DVDVIDEO-VMG").unwrap();
    }
    fs::write(video_ts.join("VTS_01_1.VOB"), vec![0u8; 1024]).unwrap();
    video_ts
}

/// Configuration rooted in a test directory.
pub fn test_config(base: &Path, tool: &Path) -> Config {
    let mut config = Config::default();
    config.paths.library_root = base.join("library");
    config.paths.work_dir = base.join("work");
    config.paths.state_dir = base.join("state");
    config.remux.binary = tool.display().to_string();
    config.remux.show_progress = false;
    config.remux.timeout_secs = 20;
    config.remux.max_retries = 1;
    config
}

/// Relative paths of every file below `dir`, sorted.
pub fn tree(dir: &Path) -> Vec<String> {
    let mut files: Vec<String> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            e.path()
                .strip_prefix(dir)
                .ok()
                .map(|p| p.display().to_string())
        })
        .collect();
    files.sort();
    files
}
