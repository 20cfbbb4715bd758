//! Run record store.
//!
//! One JSON file per disc signature under the state directory, each written
//! atomically.

use crate::models::record::{RunRecord, Stage};
use crate::utils::fs as fsutil;
use crate::Result;
use std::path::{Path, PathBuf};

/// File-backed store of run records keyed by disc signature.
#[derive(Debug, Clone)]
pub struct RecordStore {
    dir: PathBuf,
}

impl RecordStore {
    /// Open (and create) a store in `dir`.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    /// Use a store in `dir` without creating anything. A missing directory
    /// reads as an empty store.
    pub fn open_existing(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, signature: &str) -> PathBuf {
        self.dir.join(format!("{}.json", signature))
    }

    /// Load the record for a signature, if one exists.
    pub fn get(&self, signature: &str) -> Result<Option<RunRecord>> {
        let path = self.path_for(signature);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Persist a record, replacing the previous version atomically.
    pub fn put(&self, record: &RunRecord) -> Result<()> {
        let json = serde_json::to_vec_pretty(record)?;
        fsutil::write_atomic(&self.path_for(&record.signature), &json)?;
        tracing::debug!(
            "Saved record {} at stage {}",
            &record.signature[..record.signature.len().min(12)],
            record.stage
        );
        Ok(())
    }

    /// Delete a record. Returns whether one existed.
    pub fn remove(&self, signature: &str) -> Result<bool> {
        let path = self.path_for(signature);
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(path)?;
        Ok(true)
    }

    /// All readable records, oldest first. Unreadable files are skipped.
    pub fn list(&self) -> Result<Vec<RunRecord>> {
        let mut records = Vec::new();
        if !self.dir.is_dir() {
            return Ok(records);
        }

        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();

            // Only process .json files
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            match std::fs::read_to_string(&path)
                .map_err(crate::Error::from)
                .and_then(|c| serde_json::from_str::<RunRecord>(&c).map_err(crate::Error::from))
            {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!("Skipping unreadable record {}: {}", path.display(), e),
            }
        }

        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(records)
    }

    /// Highest episode recorded for a TV group, excluding one signature.
    pub fn last_episode_for(
        &self,
        series_key: &str,
        season: u16,
        exclude_signature: &str,
        before_disc: Option<u16>,
    ) -> Result<Option<u32>> {
        let max = self
            .list()?
            .into_iter()
            .filter(|r| r.signature != exclude_signature)
            .filter(|r| r.series_key.as_deref() == Some(series_key) && r.season == Some(season))
            .filter(|r| r.stage != Stage::Failed || r.last_completed >= Stage::Classified)
            .filter(|r| match (before_disc, r.disc_no) {
                (Some(limit), Some(disc)) => disc < limit,
                _ => true,
            })
            .filter_map(|r| r.last_episode)
            .max();
        Ok(max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Store round-trip tests live in tests/store_tests.rs

    #[test]
    fn test_path_for_uses_signature() {
        let store = RecordStore {
            dir: PathBuf::from("/state"),
        };
        assert_eq!(store.path_for("abc"), PathBuf::from("/state/abc.json"));
    }
}
