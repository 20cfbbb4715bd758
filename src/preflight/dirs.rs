//! Working directory checks.

use super::CheckResult;
use crate::models::config::Config;
use crate::utils::fs as fsutil;
use std::path::Path;

/// Library, work and state directories must be creatable and writable.
///
/// In dry-run mode the paths are only inspected, nothing is created.
pub fn check(config: &Config, dry_run: bool) -> Vec<CheckResult> {
    [
        ("library", config.paths.library_root.as_path()),
        ("work dir", config.paths.work_dir.as_path()),
        ("state dir", config.paths.state_dir.as_path()),
    ]
    .into_iter()
    .map(|(name, path)| {
        if dry_run {
            check_usable(name, path)
        } else {
            check_writable(name, path)
        }
    })
    .collect()
}

fn check_usable(name: &str, path: &Path) -> CheckResult {
    if !path.exists() {
        CheckResult::ok(name, &format!("{} (would be created)", path.display()))
    } else if path.is_dir() {
        CheckResult::ok(name, &path.display().to_string())
    } else {
        CheckResult::fail(
            name,
            &format!("{} is not a directory", path.display()),
            "Check the [paths] section of the config file",
        )
    }
}

fn check_writable(name: &str, path: &Path) -> CheckResult {
    if let Err(e) = std::fs::create_dir_all(path)
        .map_err(crate::Error::from)
        .and_then(|_| fsutil::ensure_directory(path))
    {
        return CheckResult::fail(
            name,
            &format!("cannot create {}: {}", path.display(), e),
            "Check the [paths] section of the config file",
        );
    }

    let probe = path.join(format!(".write-test-{}", uuid::Uuid::new_v4()));
    match std::fs::write(&probe, b"") {
        Ok(()) => {
            let _ = std::fs::remove_file(&probe);
            CheckResult::ok(name, &path.display().to_string())
        }
        Err(e) => CheckResult::fail(
            name,
            &format!("{} is not writable: {}", path.display(), e),
            "Fix directory permissions",
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(base: &Path) -> Config {
        let mut config = Config::default();
        config.paths.library_root = base.join("library");
        config.paths.work_dir = base.join("work");
        config.paths.state_dir = base.join("state");
        config
    }

    #[test]
    fn test_dry_run_creates_nothing() {
        let dir = TempDir::new().unwrap();
        let results = check(&config(dir.path()), true);

        assert!(results.iter().all(|r| r.success));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_dry_run_rejects_file_in_place_of_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("work"), b"x").unwrap();
        let results = check(&config(dir.path()), true);

        assert!(!results[1].success);
        assert!(!dir.path().join("library").exists());
    }

    #[test]
    fn test_creates_and_leaves_no_write_test_files() {
        let dir = TempDir::new().unwrap();
        let results = check(&config(dir.path()), false);

        assert!(results.iter().all(|r| r.success));
        assert!(dir.path().join("state").is_dir());
        assert_eq!(std::fs::read_dir(dir.path().join("state")).unwrap().count(), 0);
    }
}
