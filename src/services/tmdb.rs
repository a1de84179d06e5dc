/// TMDB v3 client
///
/// Only two endpoints are used:
/// 1. Title search: /search/movie → paged hits
/// 2. Details: /movie/{id}?append_to_response=videos → metadata plus trailers
///
/// Responses are cached in Redis when a cache is configured.
use crate::{
    cached,
    db::{Cache, CacheKey},
    error::{AppError, AppResult},
    models::{MovieDetails, MovieSearchPage, TmdbMovieDetails, TmdbSearchResponse},
};
use reqwest::{Client as HttpClient, StatusCode};

const SEARCH_CACHE_TTL: u64 = 3600; // 1 hour
const DETAILS_CACHE_TTL: u64 = 86400; // 1 day

/// Source of movie metadata
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MovieProvider: Send + Sync {
    /// Searches titles; `page` starts at 1
    async fn search(&self, query: &str, page: u32) -> AppResult<MovieSearchPage>;

    /// Full metadata for one TMDB id
    async fn details(&self, tmdb_id: i64) -> AppResult<MovieDetails>;
}

#[derive(Clone)]
pub struct TmdbProvider {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
    cache: Option<Cache>,
}

impl TmdbProvider {
    pub fn new(api_key: String, api_url: String, cache: Option<Cache>) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_key,
            api_url: api_url.trim_end_matches('/').to_string(),
            cache,
        }
    }

    async fn fetch_search(&self, query: &str, page: u32) -> AppResult<MovieSearchPage> {
        let url = format!("{}/search/movie", self.api_url);
        let page_param = page.to_string();

        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("query", query),
                ("page", page_param.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "TMDB search failed");
            return Err(AppError::ExternalApi("Failed to search movies".to_string()));
        }

        let raw: TmdbSearchResponse = response.json().await?;
        let results: Vec<_> = raw.results.into_iter().map(Into::into).collect();

        tracing::info!(
            query = %query,
            page = page,
            result_count = results.len(),
            "Searched TMDB"
        );

        Ok(MovieSearchPage {
            results,
            total_results: raw.total_results,
            total_pages: raw.total_pages,
            page,
        })
    }

    async fn fetch_details(&self, tmdb_id: i64) -> AppResult<MovieDetails> {
        let url = format!("{}/movie/{}", self.api_url, tmdb_id);

        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("append_to_response", "videos"),
            ])
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND => {
                return Err(AppError::NotFound("Movie not found on TMDB".to_string()));
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                tracing::error!(status = %status, body = %body, tmdb_id, "TMDB details failed");
                return Err(AppError::ExternalApi(
                    "Failed to fetch movie details".to_string(),
                ));
            }
        }

        let raw: TmdbMovieDetails = response.json().await?;
        tracing::info!(tmdb_id, title = %raw.title, "Fetched TMDB details");
        Ok(raw.into())
    }
}

#[async_trait::async_trait]
impl MovieProvider for TmdbProvider {
    async fn search(&self, query: &str, page: u32) -> AppResult<MovieSearchPage> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::InvalidInput(
                "Search query is required".to_string(),
            ));
        }
        let page = page.max(1);

        match &self.cache {
            Some(cache) => cached!(
                cache,
                CacheKey::MovieSearch {
                    query: query.to_string(),
                    page,
                },
                SEARCH_CACHE_TTL,
                self.fetch_search(query, page)
            ),
            None => self.fetch_search(query, page).await,
        }
    }

    async fn details(&self, tmdb_id: i64) -> AppResult<MovieDetails> {
        match &self.cache {
            Some(cache) => cached!(
                cache,
                CacheKey::MovieDetails(tmdb_id),
                DETAILS_CACHE_TTL,
                self.fetch_details(tmdb_id)
            ),
            None => self.fetch_details(tmdb_id).await,
        }
    }
}
