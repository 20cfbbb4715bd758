//! TMDB API client and season episode-count lookup.

use crate::models::config::TmdbConfig;
use crate::Result;
use futures::future::BoxFuture;
use serde::Deserialize;
use std::time::Duration;

const TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";

/// Expected episode counts, used only to sanity-check numbering.
///
/// Absence or failure yields `None` and never blocks placement.
pub trait TitleLookup: Send + Sync {
    fn season_episode_count<'a>(
        &'a self,
        series: &'a str,
        year: Option<u16>,
        season: u16,
    ) -> BoxFuture<'a, Option<u32>>;
}

/// Lookup that never knows anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLookup;

impl TitleLookup for NoLookup {
    fn season_episode_count<'a>(
        &'a self,
        _series: &'a str,
        _year: Option<u16>,
        _season: u16,
    ) -> BoxFuture<'a, Option<u32>> {
        Box::pin(async { None })
    }
}

/// TV show search result.
#[derive(Debug, Deserialize)]
pub struct TvSearchResult {
    pub results: Vec<TvSearchItem>,
}

/// TV show search item.
#[derive(Debug, Deserialize)]
pub struct TvSearchItem {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub original_name: Option<String>,
    pub first_air_date: Option<String>,
}

/// Season details.
#[derive(Debug, Deserialize)]
pub struct SeasonDetails {
    pub season_number: u16,
    #[serde(default)]
    pub episodes: Vec<EpisodeInfo>,
}

/// Episode info within a season.
#[derive(Debug, Deserialize)]
pub struct EpisodeInfo {
    pub episode_number: u16,
    pub name: Option<String>,
}

/// TMDB API client.
pub struct TmdbClient {
    api_key: String,
    language: String,
    /// Whether to use Bearer token authentication (API v4 style)
    use_bearer: bool,
    client: reqwest::Client,
}

impl TmdbClient {
    /// Create a client; fails when no key is configured.
    pub fn new(config: &TmdbConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or(crate::Error::TmdbApiKeyMissing)?;

        // Bearer tokens start with "eyJ" (base64 encoded JWT header)
        let use_bearer = api_key.starts_with("eyJ");

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            api_key,
            language: config.language.clone(),
            use_bearer,
            client,
        })
    }

    /// Build a request with proper authentication.
    fn build_request(&self, url: &str) -> reqwest::RequestBuilder {
        let request = self.client.get(url).header("Accept", "application/json");
        if self.use_bearer {
            request.header("Authorization", format!("Bearer {}", self.api_key))
        } else {
            request
        }
    }

    /// Build URL with optional api_key parameter (only for v3 style).
    fn build_url(&self, path: &str, extra_params: &str) -> String {
        if self.use_bearer {
            format!(
                "{}/{}?language={}{}",
                TMDB_BASE_URL, path, self.language, extra_params
            )
        } else {
            format!(
                "{}/{}?api_key={}&language={}{}",
                TMDB_BASE_URL, path, self.api_key, self.language, extra_params
            )
        }
    }

    /// Verify API key is valid.
    pub async fn verify_api_key(&self) -> Result<bool> {
        let url = if self.use_bearer {
            format!("{}/authentication", TMDB_BASE_URL)
        } else {
            format!("{}/authentication?api_key={}", TMDB_BASE_URL, self.api_key)
        };

        match self.build_request(&url).send().await {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    /// Search for TV shows.
    pub async fn search_tv(&self, query: &str, year: Option<u16>) -> Result<Vec<TvSearchItem>> {
        let year_param = year
            .map(|y| format!("&first_air_date_year={}", y))
            .unwrap_or_default();
        let url = self.build_url(
            "search/tv",
            &format!("&query={}{}", urlencoding::encode(query), year_param),
        );

        let resp: TvSearchResult = self
            .build_request(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(resp.results)
    }

    /// Get season details.
    pub async fn get_season_details(&self, tv_id: u64, season_number: u16) -> Result<SeasonDetails> {
        let url = self.build_url(&format!("tv/{}/season/{}", tv_id, season_number), "");
        let resp = self
            .build_request(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(resp)
    }
}

/// Prefer an exact (case-insensitive) name match, else the first result.
pub fn pick_series(results: &[TvSearchItem], series: &str) -> Option<u64> {
    results
        .iter()
        .find(|r| {
            r.name.eq_ignore_ascii_case(series)
                || r.original_name
                    .as_deref()
                    .map(|n| n.eq_ignore_ascii_case(series))
                    .unwrap_or(false)
        })
        .or_else(|| results.first())
        .map(|r| r.id)
}

/// Episode-count lookup backed by TMDB.
pub struct TmdbLookup {
    client: TmdbClient,
}

impl TmdbLookup {
    pub fn new(client: TmdbClient) -> Self {
        Self { client }
    }

    async fn lookup(&self, series: &str, year: Option<u16>, season: u16) -> Result<Option<u32>> {
        let results = self.client.search_tv(series, year).await?;
        let Some(id) = pick_series(&results, series) else {
            return Ok(None);
        };
        let details = self.client.get_season_details(id, season).await?;
        Ok(Some(details.episodes.len() as u32))
    }
}

impl TitleLookup for TmdbLookup {
    fn season_episode_count<'a>(
        &'a self,
        series: &'a str,
        year: Option<u16>,
        season: u16,
    ) -> BoxFuture<'a, Option<u32>> {
        Box::pin(async move {
            match self.lookup(series, year, season).await {
                Ok(count) => count,
                Err(e) => {
                    tracing::debug!("TMDB lookup for {} season {} failed: {}", series, season, e);
                    None
                }
            }
        })
    }
}
