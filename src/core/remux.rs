//! Remux supervisor module.
//!
//! Runs the external remux tool (`makemkvcon` in robot mode) for one disc,
//! follows its line protocol for progress and messages, and turns the exit
//! code and produced files into tracks or a typed error.

use crate::core::orchestrator::RunControl;
use crate::models::config::RemuxConfig;
use crate::models::disc::{DiscKind, DiscSource};
use crate::models::track::Track;
use crate::services::ffprobe::MetadataProbe;
use crate::utils::fs as fsutil;
use crate::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

/// Lines of tool output kept for error reports.
const OUTPUT_TAIL_LINES: usize = 50;

/// How often an idle remux checks for an abort request.
const ABORT_POLL: Duration = Duration::from_millis(250);

/// Exit code for an unreadable source.
pub const EXIT_BAD_SOURCE: i32 = 10;
/// Exit code for an expired license or key.
pub const EXIT_LICENSE: i32 = 251;

/// Severity of a tool message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// One parsed line of robot output.
#[derive(Debug, Clone, PartialEq)]
pub enum RobotLine {
    /// `PRGV:current,total,max`
    Progress { current: u64, total: u64, max: u64 },
    /// `PRGC:` current operation title.
    CurrentOperation(String),
    /// `PRGT:` overall operation title.
    TotalOperation(String),
    /// `MSG:code,flags,count,"text",...`
    Message {
        code: u32,
        severity: Severity,
        text: String,
    },
    /// `TCOUNT:n`
    TitleCount(u32),
    Other,
}

impl RobotLine {
    /// Completion in percent for progress lines.
    pub fn percent(&self) -> Option<f64> {
        match *self {
            RobotLine::Progress { total, max, .. } if max > 0 => {
                Some((total as f64 / max as f64 * 100.0).clamp(0.0, 100.0))
            }
            _ => None,
        }
    }
}

/// Parse one line of robot output.
pub fn parse_line(line: &str) -> RobotLine {
    let line = line.trim_end_matches(['\r', '\n']);
    let Some((prefix, rest)) = line.split_once(':') else {
        return RobotLine::Other;
    };

    match prefix {
        "PRGV" => {
            let nums: Vec<u64> = rest
                .split(',')
                .filter_map(|p| p.trim().parse().ok())
                .collect();
            match nums.as_slice() {
                [current, total, max] => RobotLine::Progress {
                    current: *current,
                    total: *total,
                    max: *max,
                },
                _ => RobotLine::Other,
            }
        }
        "PRGC" | "PRGT" => {
            let name = rest
                .splitn(3, ',')
                .nth(2)
                .and_then(first_quoted)
                .unwrap_or_default();
            if prefix == "PRGC" {
                RobotLine::CurrentOperation(name)
            } else {
                RobotLine::TotalOperation(name)
            }
        }
        "MSG" => {
            let mut fields = rest.splitn(4, ',');
            let code = fields.next().and_then(|c| c.trim().parse().ok());
            let text = fields.nth(2).and_then(first_quoted);
            match (code, text) {
                (Some(code), Some(text)) => RobotLine::Message {
                    code,
                    severity: classify_message(&text),
                    text,
                },
                _ => RobotLine::Other,
            }
        }
        "TCOUNT" => rest
            .trim()
            .parse()
            .map(RobotLine::TitleCount)
            .unwrap_or(RobotLine::Other),
        _ => RobotLine::Other,
    }
}

/// First double-quoted field of a CSV remainder, with `\"` unescaped.
fn first_quoted(s: &str) -> Option<String> {
    let s = s.trim_start();
    let body = s.strip_prefix('"')?;

    let mut out = String::new();
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            '"' => return Some(out),
            _ => out.push(c),
        }
    }
    Some(out)
}

/// Severity of a message by its text prefix.
pub fn classify_message(text: &str) -> Severity {
    const ERRORS: &[&str] = &[
        "error",
        "failed",
        "fatal",
        "evaluation period",
        "this application version is too old",
    ];
    const WARNINGS: &[&str] = &["warning", "read error", "skipped"];

    let lower = text.trim().to_lowercase();
    if ERRORS.iter().any(|p| lower.starts_with(p)) {
        Severity::Error
    } else if WARNINGS.iter().any(|p| lower.starts_with(p))
        || (lower.starts_with("title #") && lower.contains("is below"))
    {
        Severity::Warning
    } else {
        Severity::Info
    }
}

/// Map a tool exit code to the pipeline outcome.
pub fn map_exit_code(code: i32, output_tail: Vec<String>) -> Result<()> {
    match code {
        0 => Ok(()),
        EXIT_BAD_SOURCE => Err(crate::Error::RetryableSource { code }),
        EXIT_LICENSE => Err(crate::Error::FatalLicense { code }),
        _ => Err(crate::Error::UnknownRemux { code, output_tail }),
    }
}

/// Keeps completion monotonic.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    percent: f64,
}

impl ProgressTracker {
    /// Record a new value; returns the new percentage if it advanced.
    pub fn update(&mut self, percent: f64) -> Option<f64> {
        if percent > self.percent {
            self.percent = percent;
            Some(percent)
        } else {
            None
        }
    }

    pub fn percent(&self) -> f64 {
        self.percent
    }
}

/// Free space lookup, injectable for tests.
pub trait SpaceProbe: Send + Sync {
    fn available(&self, path: &Path) -> Option<u64>;
}

/// Free space of the volume holding the path.
#[derive(Debug, Clone, Copy, Default)]
pub struct VolumeSpace;

impl SpaceProbe for VolumeSpace {
    fn available(&self, path: &Path) -> Option<u64> {
        fsutil::available_space(path)
    }
}

/// Produced tracks plus what the tool reported.
#[derive(Debug, Clone, Default)]
pub struct RemuxOutput {
    pub tracks: Vec<Track>,
    /// Warning and error messages seen during the run.
    pub messages: Vec<String>,
    /// Titles on the disc as reported by the tool.
    pub title_count: Option<u32>,
}

/// Intended remux, reported in dry-run mode.
#[derive(Debug, Clone)]
pub struct RemuxPlan {
    pub command: Vec<String>,
    pub destination: PathBuf,
    pub required_bytes: u64,
    pub available_bytes: Option<u64>,
}

impl RemuxPlan {
    pub fn has_space(&self) -> bool {
        self.available_bytes
            .map(|a| a >= self.required_bytes)
            .unwrap_or(true)
    }
}

/// Launches and watches one remux process per disc.
pub struct RemuxSupervisor {
    config: RemuxConfig,
    probe: Arc<dyn MetadataProbe>,
    space: Arc<dyn SpaceProbe>,
}

impl RemuxSupervisor {
    pub fn new(config: RemuxConfig, probe: Arc<dyn MetadataProbe>) -> Self {
        Self {
            config,
            probe,
            space: Arc::new(VolumeSpace),
        }
    }

    /// Replace the free-space lookup.
    pub fn with_space_probe(mut self, space: Arc<dyn SpaceProbe>) -> Self {
        self.space = space;
        self
    }

    /// Tool input argument: `iso:<path>` or `file:<entry>`.
    pub fn input_arg(disc: &DiscSource) -> String {
        match disc.kind {
            DiscKind::Iso => format!("iso:{}", disc.entry_path.display()),
            DiscKind::Bdmv | DiscKind::VideoTs => format!("file:{}", disc.entry_path.display()),
        }
    }

    /// Arguments passed to the tool.
    pub fn build_args(&self, disc: &DiscSource, dest: &Path) -> Vec<String> {
        let mut args = vec![
            "--robot".to_string(),
            "--noscan".to_string(),
            "--progress=-same".to_string(),
        ];
        args.extend(self.config.extra_args.iter().cloned());
        args.push("mkv".to_string());
        args.push(Self::input_arg(disc));
        args.push("all".to_string());
        args.push(dest.display().to_string());
        args
    }

    /// Bytes needed on the destination volume.
    pub fn required_space(&self, disc: &DiscSource) -> u64 {
        (disc.size_bytes as f64 * self.config.space_multiplier).ceil() as u64
    }

    /// Describe the remux without running anything.
    pub fn plan(&self, disc: &DiscSource, dest: &Path) -> RemuxPlan {
        let mut command = vec![self.config.binary.clone()];
        command.extend(self.build_args(disc, dest));
        RemuxPlan {
            command,
            destination: dest.to_path_buf(),
            required_bytes: self.required_space(disc),
            available_bytes: self.space.available(dest),
        }
    }

    /// Fail with `InsufficientSpace` before anything is launched.
    pub fn check_space(&self, disc: &DiscSource, dest: &Path) -> Result<()> {
        let required = self.required_space(disc);
        match self.space.available(dest) {
            Some(available) if available < required => {
                Err(crate::Error::InsufficientSpace {
                    required,
                    available,
                })
            }
            Some(_) => Ok(()),
            None => {
                tracing::warn!(
                    "Free space unknown for {}, continuing without check",
                    dest.display()
                );
                Ok(())
            }
        }
    }

    /// Remux a disc into `dest`.
    ///
    /// `dest` is emptied first; it must be a per-disc temporary directory.
    pub async fn remux(
        &self,
        disc: &DiscSource,
        dest: &Path,
        control: &RunControl,
    ) -> Result<RemuxOutput> {
        self.check_space(disc, dest)?;

        if dest.exists() {
            tokio::fs::remove_dir_all(dest).await?;
        }
        tokio::fs::create_dir_all(dest).await?;

        let args = self.build_args(disc, dest);
        tracing::info!("Remux: {} {}", self.config.binary, args.join(" "));

        let mut child = Command::new(&self.config.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    crate::Error::ToolNotFound(self.config.binary.clone())
                }
                _ => crate::Error::Io(e),
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| crate::Error::other("remux stdout not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| crate::Error::other("remux stderr not captured"))?;

        let stderr_task = tokio::spawn(async move {
            let mut tail = VecDeque::with_capacity(OUTPUT_TAIL_LINES);
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                tracing::debug!("remux stderr: {}", line);
                push_tail(&mut tail, line);
            }
            tail
        });

        let pb = self.progress_bar(&disc.display);
        let deadline = tokio::time::Instant::now() + Duration::from_secs(self.config.timeout_secs);
        let mut lines = BufReader::new(stdout).lines();
        let mut tail = VecDeque::with_capacity(OUTPUT_TAIL_LINES);
        let mut tracker = ProgressTracker::default();
        let mut output = RemuxOutput::default();

        loop {
            if control.is_aborted() {
                let _ = child.kill().await;
                pb.abandon_with_message("cancelled");
                return Err(crate::Error::Cancelled);
            }

            tokio::select! {
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        self.handle_line(&line, &mut tracker, &mut output, &pb);
                        push_tail(&mut tail, line);
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!("Reading remux output failed: {}", e);
                        break;
                    }
                },
                _ = tokio::time::sleep_until(deadline) => {
                    let _ = child.kill().await;
                    pb.abandon_with_message("timed out");
                    return Err(crate::Error::RemuxTimeout {
                        secs: self.config.timeout_secs,
                    });
                }
                _ = tokio::time::sleep(ABORT_POLL) => {}
            }
        }

        let status = match tokio::time::timeout_at(deadline, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                let _ = child.kill().await;
                pb.abandon_with_message("timed out");
                return Err(crate::Error::RemuxTimeout {
                    secs: self.config.timeout_secs,
                });
            }
        };

        if let Ok(stderr_tail) = stderr_task.await {
            for line in stderr_tail {
                push_tail(&mut tail, line);
            }
        }

        let code = status.code().unwrap_or(-1);
        if let Err(e) = map_exit_code(code, tail.into_iter().collect()) {
            pb.abandon_with_message(format!("exit code {}", code));
            if let crate::Error::UnknownRemux { output_tail, .. } = &e {
                for line in output_tail {
                    tracing::error!("remux output: {}", line);
                }
            }
            return Err(e);
        }
        pb.finish_with_message("done");

        output.tracks = self.collect_tracks(dest).await?;
        if output.tracks.is_empty() {
            return Err(crate::Error::EmptyOutput {
                dir: dest.display().to_string(),
            });
        }

        tracing::info!(
            "Remuxed {}: {} tracks",
            disc.display,
            output.tracks.len()
        );
        Ok(output)
    }

    fn handle_line(
        &self,
        line: &str,
        tracker: &mut ProgressTracker,
        output: &mut RemuxOutput,
        pb: &ProgressBar,
    ) {
        let parsed = parse_line(line);
        if let Some(percent) = parsed.percent() {
            if let Some(percent) = tracker.update(percent) {
                pb.set_position(percent as u64);
            }
            return;
        }

        match parsed {
            RobotLine::CurrentOperation(name) => {
                tracing::debug!("remux operation: {}", name);
                pb.set_message(name);
            }
            RobotLine::TotalOperation(name) => tracing::debug!("remux stage: {}", name),
            RobotLine::TitleCount(n) => {
                tracing::debug!("remux titles on disc: {}", n);
                output.title_count = Some(n);
            }
            RobotLine::Message {
                code,
                severity,
                text,
            } => match severity {
                Severity::Info => tracing::debug!("remux [{}] {}", code, text),
                Severity::Warning => {
                    tracing::warn!("remux [{}] {}", code, text);
                    output.messages.push(text);
                }
                Severity::Error => {
                    tracing::error!("remux [{}] {}", code, text);
                    output.messages.push(text);
                }
            },
            RobotLine::Progress { .. } | RobotLine::Other => {}
        }
    }

    fn progress_bar(&self, label: &str) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(100);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} {prefix} [{bar:40.cyan/blue}] {pos}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        pb.set_prefix(label.to_string());
        pb
    }

    /// Build tracks from the files in `dest`, probing each one.
    async fn collect_tracks(&self, dest: &Path) -> Result<Vec<Track>> {
        let mut files = Vec::new();
        let mut entries = tokio::fs::read_dir(dest).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.is_file() && fsutil::is_video_file(&path) {
                let size = entry.metadata().await?.len();
                files.push((path, size));
            }
        }
        files.sort_by(|(a, _), (b, _)| a.cmp(b));

        let mut tracks = Vec::with_capacity(files.len());
        for (position, (path, size_bytes)) in files.into_iter().enumerate() {
            let index = title_index(&path).unwrap_or(position as u32);
            let probe = Arc::clone(&self.probe);
            let probe_path = path.clone();
            let meta = tokio::task::spawn_blocking(move || probe.probe(&probe_path))
                .await
                .ok()
                .flatten()
                .unwrap_or_default();

            tracks.push(Track {
                path,
                index,
                duration_secs: meta.duration_secs,
                size_bytes,
                languages: meta.languages,
                default_flag: meta.default_flag,
                forced_flag: meta.forced_flag,
            });
        }

        tracks.sort_by(|a, b| a.index.cmp(&b.index).then_with(|| a.path.cmp(&b.path)));
        Ok(tracks)
    }
}

fn push_tail(tail: &mut VecDeque<String>, line: String) {
    if tail.len() == OUTPUT_TAIL_LINES {
        tail.pop_front();
    }
    tail.push_back(line);
}

/// Title index from a tool file name such as `Heat_t03.mkv` or `title07.mkv`.
pub fn title_index(path: &Path) -> Option<u32> {
    let stem = path.file_stem()?.to_string_lossy().to_string();
    let digits: String = stem
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_progress() {
        let line = parse_line("PRGV:120,32768,65536");
        assert_eq!(
            line,
            RobotLine::Progress {
                current: 120,
                total: 32768,
                max: 65536
            }
        );
        assert_eq!(line.percent(), Some(50.0));
        assert_eq!(parse_line("PRGV:1,2,0").percent(), None);
        assert_eq!(parse_line("PRGV:garbage"), RobotLine::Other);
    }

    #[test]
    fn test_parse_message() {
        let line = parse_line(r#"MSG:5010,0,1,"Failed to open disc","Failed to open disc""#);
        assert_eq!(
            line,
            RobotLine::Message {
                code: 5010,
                severity: Severity::Error,
                text: "Failed to open disc".to_string()
            }
        );

        let line = parse_line(r#"MSG:1005,0,1,"MakeMKV v1.17.7 linux(x64-release) started","%1 started","MakeMKV v1.17.7""#);
        assert!(matches!(line, RobotLine::Message { severity: Severity::Info, .. }));

        let line = parse_line(r#"MSG:3025,0,3,"Title #1 has length of 12 seconds which is below minimum title length of 120 seconds and was therefore skipped","",""#);
        assert!(matches!(line, RobotLine::Message { severity: Severity::Warning, .. }));
    }

    #[test]
    fn test_parse_quoted_escape() {
        let line = parse_line(r#"MSG:1,0,0,"Saving \"title\" to disk","""#);
        assert!(matches!(line, RobotLine::Message { ref text, .. } if text == "Saving \"title\" to disk"));
    }

    #[test]
    fn test_parse_operations_and_count() {
        assert_eq!(
            parse_line(r#"PRGC:5018,0,"Saving to MKV file""#),
            RobotLine::CurrentOperation("Saving to MKV file".to_string())
        );
        assert_eq!(
            parse_line(r#"PRGT:5017,0,"Saving all titles to MKV files""#),
            RobotLine::TotalOperation("Saving all titles to MKV files".to_string())
        );
        assert_eq!(parse_line("TCOUNT:7"), RobotLine::TitleCount(7));
        assert_eq!(parse_line("DRV:0,256,999,0,\"\",\"\",\"\""), RobotLine::Other);
        assert_eq!(parse_line("plain text"), RobotLine::Other);
    }

    #[test]
    fn test_classify_message() {
        assert_eq!(classify_message("Evaluation period has expired"), Severity::Error);
        assert_eq!(classify_message("Read error in file"), Severity::Warning);
        assert_eq!(classify_message("Operation successfully completed"), Severity::Info);
    }

    #[test]
    fn test_progress_is_monotonic() {
        let mut tracker = ProgressTracker::default();
        assert_eq!(tracker.update(10.0), Some(10.0));
        assert_eq!(tracker.update(5.0), None);
        assert_eq!(tracker.update(10.0), None);
        assert_eq!(tracker.update(40.0), Some(40.0));
        assert_eq!(tracker.percent(), 40.0);
    }

    #[test]
    fn test_map_exit_code() {
        assert!(map_exit_code(0, Vec::new()).is_ok());
        assert!(matches!(
            map_exit_code(10, Vec::new()),
            Err(crate::Error::RetryableSource { code: 10 })
        ));
        assert!(matches!(
            map_exit_code(251, Vec::new()),
            Err(crate::Error::FatalLicense { code: 251 })
        ));
        assert!(matches!(
            map_exit_code(2, vec!["x".to_string()]),
            Err(crate::Error::UnknownRemux { code: 2, ref output_tail }) if output_tail.len() == 1
        ));
    }

    #[test]
    fn test_title_index() {
        assert_eq!(title_index(Path::new("/t/Heat_t03.mkv")), Some(3));
        assert_eq!(title_index(Path::new("/t/title12.mkv")), Some(12));
        assert_eq!(title_index(Path::new("/t/feature.mkv")), None);
    }

    #[test]
    fn test_push_tail_is_bounded() {
        let mut tail = VecDeque::new();
        for i in 0..(OUTPUT_TAIL_LINES + 10) {
            push_tail(&mut tail, i.to_string());
        }
        assert_eq!(tail.len(), OUTPUT_TAIL_LINES);
        assert_eq!(tail.front().map(String::as_str), Some("10"));
    }

    // Process-level tests with a scripted tool live in tests/remux_tests.rs
}
