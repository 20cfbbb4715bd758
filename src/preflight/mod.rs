//! Preflight checks module.

mod dirs;
mod ffprobe;
mod makemkv;
mod tmdb;

use crate::models::config::Config;
use crate::Result;
use colored::Colorize;

/// Result of a preflight check.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub success: bool,
    /// Optional checks never block a run.
    pub required: bool,
    pub message: String,
    pub hint: Option<String>,
}

impl CheckResult {
    pub fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            success: true,
            required: true,
            message: message.to_string(),
            hint: None,
        }
    }

    pub fn fail(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            success: false,
            required: true,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    /// Mark the check as non-blocking.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

/// Which commands the checks are run for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Needs {
    /// The remux tool will be launched.
    pub remux: bool,
    /// Tracks will be probed or placed.
    pub probe: bool,
    /// Nothing may be created or written.
    pub dry_run: bool,
}

/// Run all preflight checks.
pub async fn run_preflight_checks(config: &Config, needs: Needs) -> Result<Vec<CheckResult>> {
    let mut results = Vec::new();

    if needs.remux {
        results.push(makemkv::check(&config.remux.binary));
    }
    if needs.probe {
        results.push(ffprobe::check(&config.probe.ffprobe));
    }
    results.extend(dirs::check(config, needs.dry_run));
    results.push(tmdb::check(&config.tmdb).await.optional());

    Ok(results)
}

/// Print preflight check results.
pub fn print_results(results: &[CheckResult]) {
    for result in results {
        if result.success {
            println!(
                "{} {}: {}",
                "[OK]".green(),
                result.name.bold(),
                result.message
            );
        } else {
            let tag = if result.required {
                "[FAIL]".red()
            } else {
                "[SKIP]".yellow()
            };
            println!("{} {}: {}", tag, result.name.bold(), result.message);
            if let Some(ref hint) = result.hint {
                println!("  {} {}", "->".yellow(), hint);
            }
        }
    }
}

/// Check if all required preflight checks passed.
pub fn all_passed(results: &[CheckResult]) -> bool {
    results.iter().all(|r| r.success || !r.required)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_failures_do_not_block() {
        let results = vec![
            CheckResult::ok("ffprobe", "installed"),
            CheckResult::fail("TMDB API", "not configured", "Set TMDB_API_KEY").optional(),
        ];
        assert!(all_passed(&results));

        let results = vec![CheckResult::fail("makemkvcon", "not found", "Install MakeMKV")];
        assert!(!all_passed(&results));
    }
}
