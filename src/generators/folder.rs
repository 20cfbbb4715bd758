//! Folder name generator.

use crate::core::parser::sanitize_filename;
use crate::models::disc::TitleInfo;

/// Generate movie folder name.
///
/// Format: `${title} (${year})`
pub fn movie_folder(title: &TitleInfo) -> String {
    sanitize_filename(&title.folder_name())
}

/// Generate TV show folder name.
///
/// Format: `${series} (${year})`
pub fn series_folder(title: &TitleInfo) -> String {
    sanitize_filename(&title.folder_name())
}

/// Generate season folder name.
///
/// Format: `season ${NN}`
pub fn season_folder(season: u16) -> String {
    format!("season {:02}", season)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn title(name: &str, year: Option<u16>) -> TitleInfo {
        TitleInfo {
            title: name.to_string(),
            year,
            ..Default::default()
        }
    }

    #[test]
    fn test_movie_folder() {
        assert_eq!(movie_folder(&title("Heat", Some(1995))), "Heat (1995)");
        assert_eq!(movie_folder(&title("Alien: Resurrection", None)), "Alien_ Resurrection");
    }

    #[test]
    fn test_series_folder() {
        assert_eq!(series_folder(&title("Lost", Some(2004))), "Lost (2004)");
    }

    #[test]
    fn test_season_folder() {
        assert_eq!(season_folder(1), "season 01");
        assert_eq!(season_folder(12), "season 12");
    }
}
