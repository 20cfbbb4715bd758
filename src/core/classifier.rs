//! Track classifier module.
//!
//! Decides what each extracted track is from its duration alone. Pure and
//! deterministic: the same tracks and thresholds always give the same roles.

use crate::models::config::ClassifyConfig;
use crate::models::disc::Category;
use crate::models::track::{ClassificationResult, Confidence, Role, Track};

/// Classification of one disc.
#[derive(Debug, Clone, Default)]
pub struct Classification {
    /// One result per track, in ascending track index order.
    pub results: Vec<ClassificationResult>,
    /// Median episode duration in seconds (TV only).
    pub median_secs: Option<f64>,
    /// Conditions worth surfacing to the user.
    pub warnings: Vec<String>,
}

impl Classification {
    /// Lowest episode number assigned, if any.
    pub fn first_episode(&self) -> Option<u32> {
        self.results.iter().filter_map(|r| r.role.first_episode()).min()
    }

    /// Highest episode number assigned, if any.
    pub fn last_episode(&self) -> Option<u32> {
        self.results.iter().filter_map(|r| r.role.last_episode()).max()
    }

    /// Number of results with the given role label.
    pub fn count(&self, label: &str) -> usize {
        self.results.iter().filter(|r| r.role.label() == label).count()
    }
}

/// Classify a disc's tracks for its category.
///
/// TV episode numbers start at `cfg.episode_offset`.
pub fn classify(category: Category, tracks: &[Track], cfg: &ClassifyConfig) -> Classification {
    match category {
        Category::Movies => classify_movie(tracks, cfg),
        Category::Tv => classify_tv(tracks, cfg, cfg.episode_offset),
        Category::Unknown => {
            let mut c = all_fallback(tracks);
            c.warnings
                .push("category unknown; every track left unclassified".to_string());
            c
        }
    }
}

/// Longest track at or above the movie minimum is the main feature, ties
/// going to the lowest index; everything else is bonus.
pub fn classify_movie(tracks: &[Track], cfg: &ClassifyConfig) -> Classification {
    let sorted = sorted_by_index(tracks);

    let main_index = sorted
        .iter()
        .filter_map(|t| t.duration_secs.map(|d| (t.index, d)))
        .filter(|(_, d)| *d >= cfg.min_movie_secs)
        .fold(None::<(u32, f64)>, |best, (index, d)| match best {
            Some((_, best_d)) if best_d >= d => best,
            _ => Some((index, d)),
        })
        .map(|(index, _)| index);

    let Some(main_index) = main_index else {
        let mut c = all_fallback(tracks);
        c.warnings.push(format!(
            "no track reaches the minimum movie duration of {:.0} min",
            cfg.min_movie_secs / 60.0
        ));
        return c;
    };

    let mut ordinal = 0;
    let results = sorted
        .into_iter()
        .map(|track| {
            let role = if track.index == main_index {
                Role::MainFeature
            } else {
                ordinal += 1;
                Role::Bonus { ordinal }
            };
            ClassificationResult {
                track: track.clone(),
                role,
                confidence: Confidence::Heuristic,
            }
        })
        .collect();

    Classification {
        results,
        median_secs: None,
        warnings: Vec::new(),
    }
}

/// Classify TV tracks by their ratio to the median episode length.
pub fn classify_tv(tracks: &[Track], cfg: &ClassifyConfig, offset: u32) -> Classification {
    let qualifying: Vec<f64> = tracks
        .iter()
        .filter_map(|t| t.duration_secs)
        .filter(|d| *d >= cfg.min_episode_secs && *d <= cfg.max_episode_secs)
        .collect();

    let Some(median) = median(&qualifying) else {
        let mut c = all_fallback(tracks);
        c.warnings.push(format!(
            "no track between {:.0} and {:.0} min; episode length unknown",
            cfg.min_episode_secs / 60.0,
            cfg.max_episode_secs / 60.0
        ));
        return c;
    };

    let mut next_episode = offset;
    let mut play_all = 0;
    let mut fallback = 0;
    let mut warnings = Vec::new();

    let results = sorted_by_index(tracks)
        .into_iter()
        .map(|track| {
            let role = match track.duration_secs {
                Some(d) => {
                    let r = d / median;
                    if (r - 1.0).abs() <= cfg.single_tolerance {
                        let episode = next_episode;
                        next_episode += 1;
                        Some(Role::EpisodeSingle { episode })
                    } else if (r - 2.0).abs() <= cfg.double_tolerance {
                        let first = next_episode;
                        next_episode += 2;
                        Some(Role::EpisodeDouble { first })
                    } else if r >= cfg.play_all_factor {
                        play_all += 1;
                        Some(Role::PlayAll { ordinal: play_all })
                    } else {
                        None
                    }
                }
                None => {
                    warnings.push(format!("track {} has unknown duration", track.index));
                    None
                }
            };

            match role {
                Some(role) => ClassificationResult {
                    track: track.clone(),
                    role,
                    confidence: Confidence::Heuristic,
                },
                None => {
                    fallback += 1;
                    ClassificationResult {
                        track: track.clone(),
                        role: Role::Fallback { ordinal: fallback },
                        confidence: Confidence::Fallback,
                    }
                }
            }
        })
        .collect();

    Classification {
        results,
        median_secs: Some(median),
        warnings,
    }
}

/// Median of the values; the mean of the two middle values for even counts.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

fn sorted_by_index(tracks: &[Track]) -> Vec<&Track> {
    let mut sorted: Vec<&Track> = tracks.iter().collect();
    sorted.sort_by_key(|t| t.index);
    sorted
}

fn all_fallback(tracks: &[Track]) -> Classification {
    let results = sorted_by_index(tracks)
        .into_iter()
        .enumerate()
        .map(|(i, track)| ClassificationResult {
            track: track.clone(),
            role: Role::Fallback {
                ordinal: i as u32 + 1,
            },
            confidence: Confidence::Fallback,
        })
        .collect();

    Classification {
        results,
        median_secs: None,
        warnings: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::path::PathBuf;

    fn track(index: u32, minutes: Option<f64>) -> Track {
        Track {
            path: PathBuf::from(format!("/tmp/title_t{:02}.mkv", index)),
            index,
            duration_secs: minutes.map(|m| m * 60.0),
            size_bytes: 1024,
            languages: Vec::new(),
            default_flag: false,
            forced_flag: false,
        }
    }

    fn tracks(minutes: &[f64]) -> Vec<Track> {
        minutes
            .iter()
            .enumerate()
            .map(|(i, m)| track(i as u32, Some(*m)))
            .collect()
    }

    fn roles(c: &Classification) -> Vec<Role> {
        c.results.iter().map(|r| r.role).collect()
    }

    #[test]
    fn test_movie_longest_track_is_main_feature() {
        let c = classify(Category::Movies, &tracks(&[138.0, 5.0, 3.0]), &ClassifyConfig::default());
        assert_eq!(
            roles(&c),
            vec![
                Role::MainFeature,
                Role::Bonus { ordinal: 1 },
                Role::Bonus { ordinal: 2 }
            ]
        );
        assert!(c.warnings.is_empty());
    }

    #[test]
    fn test_movie_tie_goes_to_lowest_index() {
        let c = classify_movie(&tracks(&[10.0, 120.0, 120.0]), &ClassifyConfig::default());
        assert_eq!(c.results[1].role, Role::MainFeature);
        assert_eq!(c.results[2].role, Role::Bonus { ordinal: 2 });
    }

    #[test]
    fn test_movie_without_long_track_falls_back() {
        let c = classify_movie(&tracks(&[30.0, 12.0]), &ClassifyConfig::default());
        assert!(c
            .results
            .iter()
            .all(|r| matches!(r.role, Role::Fallback { .. }) && r.confidence == Confidence::Fallback));
        assert_eq!(c.warnings.len(), 1);
    }

    #[test]
    fn test_movie_unknown_duration_is_bonus() {
        let list = vec![track(0, None), track(1, Some(100.0))];
        let c = classify_movie(&list, &ClassifyConfig::default());
        assert_eq!(roles(&c), vec![Role::Bonus { ordinal: 1 }, Role::MainFeature]);
    }

    #[test]
    fn test_tv_singles_and_double() {
        let c = classify(Category::Tv, &tracks(&[44.0, 45.0, 46.0, 91.0]), &ClassifyConfig::default());
        assert_eq!(c.median_secs, Some(45.0 * 60.0));
        assert_eq!(
            roles(&c),
            vec![
                Role::EpisodeSingle { episode: 1 },
                Role::EpisodeSingle { episode: 2 },
                Role::EpisodeSingle { episode: 3 },
                Role::EpisodeDouble { first: 4 },
            ]
        );
        assert_eq!(c.last_episode(), Some(5));
    }

    #[test]
    fn test_tv_play_all_and_fallback() {
        let c = classify_tv(&tracks(&[180.0, 44.0, 45.0, 46.0, 70.0, 2.0]), &ClassifyConfig::default(), 7);
        assert_eq!(
            roles(&c),
            vec![
                Role::PlayAll { ordinal: 1 },
                Role::EpisodeSingle { episode: 7 },
                Role::EpisodeSingle { episode: 8 },
                Role::EpisodeSingle { episode: 9 },
                Role::Fallback { ordinal: 1 },
                Role::Fallback { ordinal: 2 },
            ]
        );
    }

    #[test]
    fn test_tv_unknown_duration_is_fallback() {
        let list = vec![track(0, Some(44.0)), track(1, None)];
        let c = classify_tv(&list, &ClassifyConfig::default(), 1);
        assert_eq!(c.results[1].role, Role::Fallback { ordinal: 1 });
        assert_eq!(c.warnings.len(), 1);
    }

    #[test]
    fn test_tv_without_median_is_all_fallback() {
        let c = classify_tv(&tracks(&[3.0, 5.0, 120.0]), &ClassifyConfig::default(), 1);
        assert_eq!(c.median_secs, None);
        assert_eq!(c.count("fallback"), 3);
        assert!(!c.warnings.is_empty());
    }

    #[test]
    fn test_tv_ranks_follow_track_index_not_input_order() {
        let list = vec![track(2, Some(45.0)), track(0, Some(44.0)), track(1, Some(46.0))];
        let c = classify_tv(&list, &ClassifyConfig::default(), 1);
        let by_index: Vec<(u32, Role)> = c.results.iter().map(|r| (r.track.index, r.role)).collect();
        assert_eq!(
            by_index,
            vec![
                (0, Role::EpisodeSingle { episode: 1 }),
                (1, Role::EpisodeSingle { episode: 2 }),
                (2, Role::EpisodeSingle { episode: 3 }),
            ]
        );
    }

    #[test]
    fn test_unknown_category_is_fallback() {
        let c = classify(Category::Unknown, &tracks(&[120.0]), &ClassifyConfig::default());
        assert_eq!(c.count("fallback"), 1);
        assert_eq!(c.warnings.len(), 1);
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&[]), None);
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_single_long_track_is_main_feature(
            main in 2500.0f64..20000.0,
            others in proptest::collection::vec(1.0f64..2300.0, 0..8),
            position in 0usize..8,
        ) {
            let mut durations = others.clone();
            let position = position.min(durations.len());
            durations.insert(position, main);
            let list: Vec<Track> = durations
                .iter()
                .enumerate()
                .map(|(i, d)| track(i as u32, Some(d / 60.0)))
                .collect();

            let c = classify_movie(&list, &ClassifyConfig::default());
            for r in &c.results {
                if r.track.index as usize == position {
                    prop_assert_eq!(r.role, Role::MainFeature);
                } else {
                    let is_bonus = matches!(r.role, Role::Bonus { .. });
                    prop_assert!(is_bonus);
                }
            }
        }

        #[test]
        fn prop_single_episodes_are_within_tolerance(
            minutes in proptest::collection::vec(1.0f64..300.0, 1..12),
        ) {
            let cfg = ClassifyConfig::default();
            let c = classify_tv(&tracks(&minutes), &cfg, 1);
            if let Some(median) = c.median_secs {
                for r in &c.results {
                    if let Role::EpisodeSingle { .. } = r.role {
                        let d = r.track.duration_secs.unwrap_or_default();
                        prop_assert!((d / median - 1.0).abs() <= cfg.single_tolerance);
                    }
                }
            }
        }

        #[test]
        fn prop_short_tracks_do_not_move_the_median(
            episodes in proptest::collection::vec(20.0f64..65.0, 1..8),
            shorts in proptest::collection::vec(0.5f64..19.9, 0..6),
        ) {
            let cfg = ClassifyConfig::default();
            let base = classify_tv(&tracks(&episodes), &cfg, 1).median_secs;

            let mut mixed = shorts.clone();
            mixed.extend(episodes.iter().copied());
            let with_shorts = classify_tv(&tracks(&mixed), &cfg, 1).median_secs;

            prop_assert_eq!(base, with_shorts);
        }

        #[test]
        fn prop_episode_numbers_are_contiguous(
            minutes in proptest::collection::vec(20.0f64..140.0, 1..12),
            offset in 1u32..30,
        ) {
            let c = classify_tv(&tracks(&minutes), &ClassifyConfig::default(), offset);
            let mut expected = offset;
            for r in &c.results {
                match r.role {
                    Role::EpisodeSingle { episode } => {
                        prop_assert_eq!(episode, expected);
                        expected += 1;
                    }
                    Role::EpisodeDouble { first } => {
                        prop_assert_eq!(first, expected);
                        expected += 2;
                    }
                    _ => {}
                }
            }
        }
    }
}
