//! Integration tests for the remux supervisor.
//!
//! Tests cover:
//! - Track collection and protocol parsing from a scripted tool
//! - Exit code mapping
//! - Timeout, abort and missing tool handling
//! - Space check before launch
#![cfg(unix)]

mod common;

use common::{launches, make_bdmv, movie_probe, write_tool, FixedSpace, MOVIE_TOOL};
use disc_organizer::core::locator::build_source;
use disc_organizer::core::orchestrator::RunControl;
use disc_organizer::core::remux::RemuxSupervisor;
use disc_organizer::models::config::RemuxConfig;
use disc_organizer::models::disc::{DiscKind, DiscSource};
use disc_organizer::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

fn setup(temp: &Path, body: &str) -> (DiscSource, RemuxSupervisor, PathBuf) {
    let tool = write_tool(temp, body);
    let bdmv = make_bdmv(&temp.join("src/movies/Heat (1995)"));
    let disc = build_source(DiscKind::Bdmv, &bdmv).unwrap();
    let config = RemuxConfig {
        binary: tool.display().to_string(),
        show_progress: false,
        timeout_secs: 20,
        ..Default::default()
    };
    let supervisor = RemuxSupervisor::new(config, Arc::new(movie_probe()))
        .with_space_probe(Arc::new(FixedSpace(Some(u64::MAX))));
    (disc, supervisor, temp.join("work/_tmp").join("disc"))
}

#[tokio::test]
async fn test_remux_collects_tracks_in_title_order() {
    let temp_dir = TempDir::new().unwrap();
    let (disc, supervisor, dest) = setup(temp_dir.path(), MOVIE_TOOL);

    let output = supervisor
        .remux(&disc, &dest, &RunControl::new())
        .await
        .unwrap();

    assert_eq!(output.title_count, Some(3));
    let indexes: Vec<u32> = output.tracks.iter().map(|t| t.index).collect();
    assert_eq!(indexes, vec![0, 1, 2]);
    assert_eq!(output.tracks[0].duration_secs, Some(138.0 * 60.0));
    assert_eq!(output.tracks[0].size_bytes, 4000);
    assert_eq!(output.tracks[0].languages, vec!["eng".to_string()]);
    assert!(output.tracks.iter().all(|t| t.path.starts_with(&dest)));
    assert_eq!(launches(temp_dir.path()), 1);
}

#[tokio::test]
async fn test_remux_passes_entry_path_and_destination() {
    let temp_dir = TempDir::new().unwrap();
    let (disc, supervisor, dest) = setup(temp_dir.path(), MOVIE_TOOL);

    supervisor
        .remux(&disc, &dest, &RunControl::new())
        .await
        .unwrap();

    let log = fs::read_to_string(temp_dir.path().join("launches.log")).unwrap();
    assert!(log.starts_with("--robot --noscan --progress=-same mkv file:"));
    assert!(log.contains("BDMV/index.bdmv all"));
    assert!(log.trim_end().ends_with(&dest.display().to_string()));
}

#[tokio::test]
async fn test_stale_destination_is_emptied() {
    let temp_dir = TempDir::new().unwrap();
    let (disc, supervisor, dest) = setup(temp_dir.path(), MOVIE_TOOL);
    fs::create_dir_all(&dest).unwrap();
    fs::write(dest.join("title_t09.mkv"), b"left over").unwrap();

    let output = supervisor
        .remux(&disc, &dest, &RunControl::new())
        .await
        .unwrap();
    assert_eq!(output.tracks.len(), 3);
    assert!(!dest.join("title_t09.mkv").exists());
}

#[tokio::test]
async fn test_exit_codes_map_to_errors() {
    let cases: [(&str, fn(&Error) -> bool); 3] = [
        ("exit 10", |e| matches!(e, Error::RetryableSource { code: 10 })),
        ("exit 251", |e| matches!(e, Error::FatalLicense { code: 251 })),
        ("exit 3", |e| matches!(e, Error::UnknownRemux { code: 3, .. })),
    ];

    for (body, check) in cases {
        let temp_dir = TempDir::new().unwrap();
        let (disc, supervisor, dest) = setup(temp_dir.path(), body);
        let err = supervisor
            .remux(&disc, &dest, &RunControl::new())
            .await
            .unwrap_err();
        assert!(check(&err), "{}: unexpected {:?}", body, err);
    }
}

#[tokio::test]
async fn test_unknown_exit_keeps_output_tail() {
    let temp_dir = TempDir::new().unwrap();
    let body = r#"
echo 'MSG:5010,0,1,"Failed to open disc","Failed to open disc"'
echo 'something odd' >&2
exit 2
"#;
    let (disc, supervisor, dest) = setup(temp_dir.path(), body);

    let err = supervisor
        .remux(&disc, &dest, &RunControl::new())
        .await
        .unwrap_err();
    match err {
        Error::UnknownRemux { code, output_tail } => {
            assert_eq!(code, 2);
            assert!(output_tail.iter().any(|l| l.contains("Failed to open disc")));
            assert!(output_tail.iter().any(|l| l == "something odd"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_success_without_files_is_empty_output() {
    let temp_dir = TempDir::new().unwrap();
    let (disc, supervisor, dest) = setup(temp_dir.path(), "echo 'TCOUNT:0'");

    let err = supervisor
        .remux(&disc, &dest, &RunControl::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::EmptyOutput { .. }));
}

#[tokio::test]
async fn test_timeout_kills_tool() {
    let temp_dir = TempDir::new().unwrap();
    let tool = write_tool(temp_dir.path(), "exec sleep 30");
    let bdmv = make_bdmv(&temp_dir.path().join("src/movies/Heat (1995)"));
    let disc = build_source(DiscKind::Bdmv, &bdmv).unwrap();
    let config = RemuxConfig {
        binary: tool.display().to_string(),
        show_progress: false,
        timeout_secs: 1,
        ..Default::default()
    };
    let supervisor = RemuxSupervisor::new(config, Arc::new(movie_probe()))
        .with_space_probe(Arc::new(FixedSpace(None)));

    let started = std::time::Instant::now();
    let err = supervisor
        .remux(&disc, &temp_dir.path().join("dest"), &RunControl::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::RemuxTimeout { secs: 1 }));
    assert!(started.elapsed().as_secs() < 10);
}

#[tokio::test]
async fn test_abort_cancels_running_tool() {
    let temp_dir = TempDir::new().unwrap();
    let (disc, supervisor, dest) = setup(temp_dir.path(), "exec sleep 30");
    let control = Arc::new(RunControl::new());

    let aborter = Arc::clone(&control);
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(300)).await;
        aborter.request_abort();
    });

    let started = std::time::Instant::now();
    let err = supervisor.remux(&disc, &dest, &control).await.unwrap_err();
    assert!(matches!(err, Error::Cancelled));
    assert!(started.elapsed().as_secs() < 10);
}

#[tokio::test]
async fn test_missing_tool_is_reported() {
    let temp_dir = TempDir::new().unwrap();
    let bdmv = make_bdmv(&temp_dir.path().join("src/movies/Heat (1995)"));
    let disc = build_source(DiscKind::Bdmv, &bdmv).unwrap();
    let config = RemuxConfig {
        binary: temp_dir.path().join("no-such-tool").display().to_string(),
        show_progress: false,
        ..Default::default()
    };
    let supervisor = RemuxSupervisor::new(config, Arc::new(movie_probe()))
        .with_space_probe(Arc::new(FixedSpace(None)));

    let err = supervisor
        .remux(&disc, &temp_dir.path().join("dest"), &RunControl::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ToolNotFound(_)));
    assert!(!err.is_fatal());
}

#[tokio::test]
async fn test_insufficient_space_launches_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let (disc, supervisor, dest) = setup(temp_dir.path(), MOVIE_TOOL);
    let supervisor = supervisor.with_space_probe(Arc::new(FixedSpace(Some(10))));

    let err = supervisor
        .remux(&disc, &dest, &RunControl::new())
        .await
        .unwrap_err();

    match err {
        Error::InsufficientSpace {
            required,
            available,
        } => {
            assert_eq!(available, 10);
            assert!(required >= disc.size_bytes);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(launches(temp_dir.path()), 0);
    assert!(!dest.exists());
}

#[test]
fn test_plan_describes_command() {
    let temp_dir = TempDir::new().unwrap();
    let (disc, supervisor, dest) = setup(temp_dir.path(), MOVIE_TOOL);

    let plan = supervisor.plan(&disc, &dest);
    assert_eq!(plan.command[1], "--robot");
    assert!(plan.command.contains(&"all".to_string()));
    assert!(plan.has_space());
    assert_eq!(launches(temp_dir.path()), 0);
}
