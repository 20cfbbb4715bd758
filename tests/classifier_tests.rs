//! Integration tests for the track classifier.
//!
//! Tests cover:
//! - Worked examples for movie and TV discs
//! - Episode numbering with offsets across discs
//! - Threshold changes through configuration

use disc_organizer::core::classifier::{classify, classify_tv};
use disc_organizer::models::config::ClassifyConfig;
use disc_organizer::models::disc::Category;
use disc_organizer::models::track::{Confidence, Role, Track};
use std::path::PathBuf;

fn tracks(minutes: &[f64]) -> Vec<Track> {
    minutes
        .iter()
        .enumerate()
        .map(|(i, m)| Track {
            path: PathBuf::from(format!("/tmp/disc/title_t{:02}.mkv", i)),
            index: i as u32,
            duration_secs: Some(m * 60.0),
            size_bytes: 1000,
            languages: Vec::new(),
            default_flag: false,
            forced_flag: false,
        })
        .collect()
}

fn roles(minutes: &[f64], category: Category) -> Vec<Role> {
    classify(category, &tracks(minutes), &ClassifyConfig::default())
        .results
        .into_iter()
        .map(|r| r.role)
        .collect()
}

#[test]
fn test_movie_example_main_feature() {
    assert_eq!(
        roles(&[138.0, 5.0, 3.0], Category::Movies),
        vec![
            Role::MainFeature,
            Role::Bonus { ordinal: 1 },
            Role::Bonus { ordinal: 2 }
        ]
    );
}

#[test]
fn test_movie_main_feature_need_not_be_first() {
    assert_eq!(
        roles(&[2.0, 95.0, 41.0], Category::Movies),
        vec![
            Role::Bonus { ordinal: 1 },
            Role::MainFeature,
            Role::Bonus { ordinal: 2 }
        ]
    );
}

#[test]
fn test_movie_short_disc_is_fallback_with_warning() {
    let result = classify(
        Category::Movies,
        &tracks(&[22.0, 10.0]),
        &ClassifyConfig::default(),
    );
    assert_eq!(result.count("fallback"), 2);
    assert!(result
        .results
        .iter()
        .all(|r| r.confidence == Confidence::Fallback));
    assert_eq!(result.warnings.len(), 1);
}

#[test]
fn test_tv_example_singles_and_double() {
    let result = classify(
        Category::Tv,
        &tracks(&[44.0, 45.0, 46.0, 91.0]),
        &ClassifyConfig::default(),
    );

    assert_eq!(result.median_secs, Some(45.0 * 60.0));
    assert_eq!(
        result.results.iter().map(|r| r.role).collect::<Vec<_>>(),
        vec![
            Role::EpisodeSingle { episode: 1 },
            Role::EpisodeSingle { episode: 2 },
            Role::EpisodeSingle { episode: 3 },
            Role::EpisodeDouble { first: 4 },
        ]
    );
    assert_eq!(result.last_episode(), Some(5));
}

#[test]
fn test_tv_play_all_and_extras() {
    let result = classify(
        Category::Tv,
        &tracks(&[45.0, 45.0, 3.0, 135.0, 45.0]),
        &ClassifyConfig::default(),
    );
    assert_eq!(
        result.results.iter().map(|r| r.role).collect::<Vec<_>>(),
        vec![
            Role::EpisodeSingle { episode: 1 },
            Role::EpisodeSingle { episode: 2 },
            Role::Fallback { ordinal: 1 },
            Role::PlayAll { ordinal: 1 },
            Role::EpisodeSingle { episode: 3 },
        ]
    );
}

#[test]
fn test_tv_offset_continues_numbering() {
    let result = classify_tv(
        &tracks(&[44.0, 46.0, 91.0]),
        &ClassifyConfig::default(),
        5,
    );
    assert_eq!(
        result.results.iter().map(|r| r.role).collect::<Vec<_>>(),
        vec![
            Role::EpisodeSingle { episode: 5 },
            Role::EpisodeSingle { episode: 6 },
            Role::EpisodeDouble { first: 7 },
        ]
    );
}

#[test]
fn test_tv_bonus_tracks_do_not_move_median() {
    let cfg = ClassifyConfig::default();
    let base = classify(Category::Tv, &tracks(&[44.0, 45.0, 46.0]), &cfg);
    let with_bonus = classify(Category::Tv, &tracks(&[44.0, 45.0, 46.0, 2.0, 7.5, 12.0]), &cfg);
    assert_eq!(base.median_secs, with_bonus.median_secs);
}

#[test]
fn test_tv_thresholds_are_configurable() {
    let mut cfg = ClassifyConfig::default();
    cfg.min_episode_secs = 10.0 * 60.0;
    cfg.max_episode_secs = 30.0 * 60.0;

    let result = classify(Category::Tv, &tracks(&[22.0, 23.0, 24.0]), &cfg);
    assert_eq!(result.count("episode_single"), 3);

    let result = classify(Category::Tv, &tracks(&[22.0, 23.0, 24.0]), &ClassifyConfig::default());
    assert_eq!(result.count("episode_single"), 3);

    cfg.single_tolerance = 0.01;
    let result = classify(Category::Tv, &tracks(&[22.0, 23.0, 24.0]), &cfg);
    assert_eq!(result.count("episode_single"), 1);
    assert_eq!(result.count("fallback"), 2);
}

#[test]
fn test_classification_is_deterministic() {
    let cfg = ClassifyConfig::default();
    let input = tracks(&[44.0, 45.0, 46.0, 91.0, 3.0]);
    let first = classify(Category::Tv, &input, &cfg);
    let second = classify(Category::Tv, &input, &cfg);
    assert_eq!(first.results, second.results);
}
