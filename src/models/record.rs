//! Run record data model.
//!
//! A run record is the persisted status of one disc signature. It is the
//! single source of truth for deciding whether a disc is skipped or redone.

use super::disc::{Category, DiscSource};
use super::track::{ClassificationResult, Track};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Pipeline stage reached by a disc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Scanned,
    Remuxed,
    Classified,
    Placed,
    Done,
    Failed,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Scanned => write!(f, "scanned"),
            Stage::Remuxed => write!(f, "remuxed"),
            Stage::Classified => write!(f, "classified"),
            Stage::Placed => write!(f, "placed"),
            Stage::Done => write!(f, "done"),
            Stage::Failed => write!(f, "failed"),
        }
    }
}

/// Persisted error kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidDiscStructure,
    InsufficientSpace,
    RetryableSourceError,
    RemuxTimeout,
    UnknownRemuxError,
    EmptyOutputError,
    FatalLicenseError,
    PlacementIncomplete,
    Cancelled,
    ToolNotFound,
    Io,
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::InvalidDiscStructure => "InvalidDiscStructure",
            ErrorKind::InsufficientSpace => "InsufficientSpace",
            ErrorKind::RetryableSourceError => "RetryableSourceError",
            ErrorKind::RemuxTimeout => "RemuxTimeout",
            ErrorKind::UnknownRemuxError => "UnknownRemuxError",
            ErrorKind::EmptyOutputError => "EmptyOutputError",
            ErrorKind::FatalLicenseError => "FatalLicenseError",
            ErrorKind::PlacementIncomplete => "PlacementIncomplete",
            ErrorKind::Cancelled => "Cancelled",
            ErrorKind::ToolNotFound => "ToolNotFound",
            ErrorKind::Io => "Io",
            ErrorKind::Internal => "Internal",
        };
        write!(f, "{}", s)
    }
}

/// A file moved into the library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedFile {
    /// Temporary file the track was extracted to.
    pub from: PathBuf,
    /// Final library path.
    pub to: PathBuf,
    /// Expected size in bytes.
    pub size_bytes: u64,
    /// Expected duration, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
}

/// Persisted per-disc status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    /// Disc signature (store key).
    pub signature: String,
    /// Normalized entry path.
    pub entry_path: PathBuf,
    /// Located disc path (ISO file, `BDMV` or `VIDEO_TS` folder).
    #[serde(default)]
    pub root_path: PathBuf,
    /// Folder holding the disc, or the ISO file itself.
    pub item_root: PathBuf,
    /// Category hint.
    pub category: Category,
    /// Current stage.
    pub stage: Stage,
    /// Last stage completed successfully.
    pub last_completed: Stage,
    /// Kind of the last failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    /// Message of the last failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Number of remux attempts.
    #[serde(default)]
    pub attempts: u32,
    /// Temporary extraction directory.
    pub temp_dir: PathBuf,
    /// Tracks produced by remux.
    #[serde(default)]
    pub tracks: Vec<Track>,
    /// Classification results.
    #[serde(default)]
    pub classifications: Vec<ClassificationResult>,
    /// Files placed into the library.
    #[serde(default)]
    pub placements: Vec<PlacedFile>,
    /// Series grouping key (TV only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series_key: Option<String>,
    /// Season (TV only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub season: Option<u16>,
    /// Disc number hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disc_no: Option<u16>,
    /// Lowest episode number assigned on this disc.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_episode: Option<u32>,
    /// Highest episode number assigned on this disc.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_episode: Option<u32>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl RunRecord {
    /// Create a fresh record for a discovered disc.
    pub fn new(disc: &DiscSource, temp_dir: PathBuf) -> Self {
        let now = Utc::now();
        Self {
            signature: disc.signature.clone(),
            entry_path: disc.entry_path.clone(),
            root_path: disc.root_path.clone(),
            item_root: disc.item_root.clone(),
            category: disc.category,
            stage: Stage::Scanned,
            last_completed: Stage::Scanned,
            error_kind: None,
            error_message: None,
            attempts: 0,
            temp_dir,
            tracks: Vec::new(),
            classifications: Vec::new(),
            placements: Vec::new(),
            series_key: None,
            season: disc.season,
            disc_no: disc.disc_no,
            first_episode: None,
            last_episode: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to a completed stage and clear any previous error.
    pub fn advance(&mut self, stage: Stage) {
        self.stage = stage;
        self.last_completed = stage;
        self.error_kind = None;
        self.error_message = None;
        self.updated_at = Utc::now();
    }

    /// Mark as failed, keeping `last_completed` so a later run resumes there.
    pub fn fail(&mut self, kind: ErrorKind, message: &str) {
        self.stage = Stage::Failed;
        self.error_kind = Some(kind);
        self.error_message = Some(message.to_string());
        self.updated_at = Utc::now();
    }

    /// Stage the next run should resume from.
    pub fn resume_stage(&self) -> Stage {
        if self.stage == Stage::Failed {
            self.last_completed
        } else {
            self.stage
        }
    }

    pub fn is_done(&self) -> bool {
        self.stage == Stage::Done
    }

    /// Drop all progress so the disc is processed from scratch.
    pub fn reset(&mut self) {
        self.stage = Stage::Scanned;
        self.last_completed = Stage::Scanned;
        self.error_kind = None;
        self.error_message = None;
        self.attempts = 0;
        self.tracks.clear();
        self.classifications.clear();
        self.placements.clear();
        self.first_episode = None;
        self.last_episode = None;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_ordering() {
        assert!(Stage::Scanned < Stage::Remuxed);
        assert!(Stage::Remuxed < Stage::Classified);
        assert!(Stage::Placed < Stage::Done);
    }

    #[test]
    fn test_stage_serde_names() {
        assert_eq!(serde_json::to_string(&Stage::Remuxed).unwrap(), "\"remuxed\"");
        assert_eq!(
            serde_json::to_string(&ErrorKind::FatalLicenseError).unwrap(),
            "\"fatal_license_error\""
        );
    }
}
