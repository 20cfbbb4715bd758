//! Disc locator module.
//!
//! Walks a directory tree for disc sources (ISO images, `BDMV` and
//! `VIDEO_TS` folders) and resolves each one to the entry point handed to
//! the remux tool.

use crate::core::parser;
use crate::models::disc::{Category, DiscKind, DiscSource};
use crate::utils::{fs as fsutil, hash};
use crate::Result;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Directory names that are never descended into.
const SKIPPED_DIRS: &[&str] = &["_tmp", "$recycle.bin", "system volume information", "lost+found"];

/// A disc folder that could not be resolved to an entry point.
#[derive(Debug, Clone)]
pub struct InvalidDisc {
    pub path: PathBuf,
    pub reason: String,
}

/// Result of locating discs below a root.
#[derive(Debug, Default)]
pub struct LocateResult {
    /// Discs with a known category.
    pub discs: Vec<DiscSource>,
    /// Discs outside any `movies` / `tv` folder, left for manual review.
    pub review: Vec<DiscSource>,
    /// Disc folders without a usable entry point.
    pub invalid: Vec<InvalidDisc>,
    /// Candidates collapsed onto an earlier entry path.
    pub duplicates: usize,
}

impl LocateResult {
    pub fn total(&self) -> usize {
        self.discs.len() + self.review.len()
    }
}

/// Finds disc sources below a root directory.
#[derive(Debug, Clone)]
pub struct DiscLocator {
    root: PathBuf,
    excluded: Vec<PathBuf>,
}

impl DiscLocator {
    /// Create a locator for `root`. The root must be an existing directory.
    pub fn new(root: &Path) -> Result<Self> {
        fsutil::ensure_directory(root)?;
        let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        Ok(Self {
            root,
            excluded: Vec::new(),
        })
    }

    /// Never descend into `path` (e.g. the work directory).
    pub fn exclude(mut self, path: &Path) -> Self {
        let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        self.excluded.push(path);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lazily yield disc sources. Each call starts a fresh walk.
    pub fn discover(&self) -> Discover<'_> {
        Discover {
            locator: self,
            walker: WalkDir::new(&self.root)
                .follow_links(false)
                .sort_by_file_name()
                .into_iter(),
            seen: HashSet::new(),
            duplicates: 0,
        }
    }

    /// Walk the whole tree and split the results by outcome.
    pub fn locate(&self) -> LocateResult {
        let mut result = LocateResult::default();
        let mut discover = self.discover();

        for item in discover.by_ref() {
            match item {
                Ok(disc) if disc.category == Category::Unknown => {
                    tracing::warn!(
                        "Disc outside movies/tv, needs manual review: {}",
                        disc.entry_path.display()
                    );
                    result.review.push(disc);
                }
                Ok(disc) => result.discs.push(disc),
                Err((path, e)) => {
                    tracing::warn!("Skipping {}: {}", path.display(), e);
                    result.invalid.push(InvalidDisc {
                        path,
                        reason: e.to_string(),
                    });
                }
            }
        }
        result.duplicates = discover.duplicates;

        tracing::info!(
            "Located {} discs under {} ({} for review, {} invalid, {} duplicates)",
            result.discs.len(),
            self.root.display(),
            result.review.len(),
            result.invalid.len(),
            result.duplicates
        );

        result
    }

    fn is_skipped(&self, path: &Path) -> bool {
        if path == self.root {
            return false;
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        name.starts_with('.')
            || SKIPPED_DIRS.contains(&name.as_str())
            || self.excluded.iter().any(|ex| path == ex)
    }
}

/// Iterator over discovered discs, see [`DiscLocator::discover`].
pub struct Discover<'a> {
    locator: &'a DiscLocator,
    walker: walkdir::IntoIter,
    seen: HashSet<String>,
    duplicates: usize,
}

impl Iterator for Discover<'_> {
    type Item = std::result::Result<DiscSource, (PathBuf, crate::Error)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::debug!("Walk error: {}", e);
                    continue;
                }
            };
            let path = entry.path();

            let kind = if entry.file_type().is_dir() {
                if self.locator.is_skipped(path) {
                    self.walker.skip_current_dir();
                    continue;
                }
                match disc_folder_kind(path) {
                    Some(kind) => {
                        // Nothing below a disc folder is a separate disc.
                        self.walker.skip_current_dir();
                        kind
                    }
                    None => continue,
                }
            } else if entry.file_type().is_file() && is_iso(path) {
                DiscKind::Iso
            } else {
                continue;
            };

            let source = match build_source(kind, path) {
                Ok(source) => source,
                Err(e) => return Some(Err((path.to_path_buf(), e))),
            };

            if !self.seen.insert(hash::normalize_path(&source.entry_path)) {
                tracing::debug!("Duplicate disc entry: {}", source.entry_path.display());
                self.duplicates += 1;
                continue;
            }

            return Some(Ok(source));
        }
    }
}

fn is_iso(path: &Path) -> bool {
    fsutil::get_extension(path).as_deref() == Some("iso")
}

fn disc_folder_kind(path: &Path) -> Option<DiscKind> {
    let name = path.file_name()?.to_string_lossy().to_uppercase();
    match name.as_str() {
        "BDMV" => Some(DiscKind::Bdmv),
        "VIDEO_TS" => Some(DiscKind::VideoTs),
        _ => None,
    }
}

/// Case-insensitive lookup of a direct child file.
fn find_child(dir: &Path, names: &[&str]) -> Option<PathBuf> {
    for name in names {
        let exact = dir.join(name);
        if exact.is_file() {
            return Some(exact);
        }
    }

    let entries = std::fs::read_dir(dir).ok()?;
    let mut children: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    children.sort();

    names.iter().find_map(|name| {
        children
            .iter()
            .find(|p| {
                p.file_name()
                    .map(|n| n.to_string_lossy().eq_ignore_ascii_case(name))
                    .unwrap_or(false)
            })
            .cloned()
    })
}

/// Resolve the entry point the remux tool must be pointed at.
///
/// * `VIDEO_TS` → `VIDEO_TS/VIDEO_TS.IFO`, else the folder itself.
/// * `BDMV` → `BDMV/index.bdmv`, else `BDMV/INDEX.BDV`.
/// * ISO → the image file.
pub fn resolve_entry(kind: DiscKind, root_path: &Path) -> Result<PathBuf> {
    let invalid = || crate::Error::InvalidDiscStructure {
        path: root_path.display().to_string(),
    };

    match kind {
        DiscKind::Iso => {
            if root_path.is_file() {
                Ok(root_path.to_path_buf())
            } else {
                Err(invalid())
            }
        }
        DiscKind::VideoTs => {
            if let Some(ifo) = find_child(root_path, &["VIDEO_TS.IFO"]) {
                return Ok(ifo);
            }
            if root_path.is_dir() {
                Ok(root_path.to_path_buf())
            } else {
                Err(invalid())
            }
        }
        DiscKind::Bdmv => {
            if !root_path.is_dir() {
                return Err(invalid());
            }
            find_child(root_path, &["index.bdmv", "INDEX.BDV"]).ok_or_else(invalid)
        }
    }
}

/// Category from the nearest ancestor named `movies` or `tv`.
pub fn category_for(path: &Path) -> Category {
    for ancestor in path.ancestors().skip(1) {
        let name = match ancestor.file_name() {
            Some(name) => name.to_string_lossy().to_lowercase(),
            None => continue,
        };
        match name.as_str() {
            "movies" => return Category::Movies,
            "tv" => return Category::Tv,
            _ => {}
        }
    }
    Category::Unknown
}

/// Build a disc source from a located candidate.
pub fn build_source(kind: DiscKind, root_path: &Path) -> Result<DiscSource> {
    let entry_path = resolve_entry(kind, root_path)?;

    let item_root = match kind {
        DiscKind::Iso => root_path.to_path_buf(),
        DiscKind::Bdmv | DiscKind::VideoTs => root_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| root_path.to_path_buf()),
    };

    let category = category_for(root_path);
    let (season, disc_no) = match category {
        Category::Tv => {
            let (_, season, disc) = parser::series_info(&item_root);
            (season, disc)
        }
        _ => {
            let name = parser::item_name(&item_root);
            (None, parser::extract_disc_no(&name))
        }
    };

    let size_bytes = fsutil::path_size(root_path);
    let modified = std::fs::metadata(&entry_path)
        .and_then(|m| m.modified())
        .map(chrono::DateTime::<chrono::Utc>::from)
        .unwrap_or_else(|_| chrono::Utc::now());
    let signature = hash::disc_signature(&entry_path, size_bytes, modified.timestamp());

    Ok(DiscSource {
        root_path: root_path.to_path_buf(),
        kind,
        entry_path,
        display: parser::sanitize_filename(&parser::item_name(&item_root)),
        item_root,
        category,
        season,
        disc_no,
        size_bytes,
        modified,
        discovered_at: chrono::Utc::now(),
        signature,
    })
}
