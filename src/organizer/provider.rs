//! Metadata provider clients.
//!
//! Each provider answers one question: given a search title and an optional year,
//! what is the canonical record for it?
//! `Ok(None)` means the provider found nothing, `Err` means the request itself failed.
//!
//! API documentation:
//! <https://developer.themoviedb.org/reference/search-movie>
//! <https://www.omdbapi.com/>

use std::time::Duration;

use anyhow::{Context, Result, bail};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::Deserialize;

use crate::organizer::config::Config;
use crate::organizer::metadata::{MetadataRecord, MetadataSource};

const TMDB_SEARCH_URL: &str = "https://api.themoviedb.org/3/search/movie";
const OMDB_URL: &str = "http://www.omdbapi.com/";

/// A source of canonical title metadata.
pub trait MetadataProvider {
    /// Which source this provider reports in its records.
    fn source(&self) -> MetadataSource;

    /// Look up the best match for a title and optional release year.
    ///
    /// # Errors
    /// Returns an error for network failures, non-success responses or malformed bodies.
    fn lookup(&self, title: &str, year: Option<&str>) -> Result<Option<MetadataRecord>>;
}

/// The Movie Database search client.
#[derive(Debug)]
pub struct TmdbProvider {
    client: Client,
    api_key: String,
}

/// Open Movie Database client.
#[derive(Debug)]
pub struct OmdbProvider {
    client: Client,
    api_key: String,
}

/// Response from the TMDB `/search/movie` endpoint.
#[derive(Debug, Deserialize)]
struct TmdbSearchResponse {
    #[serde(default)]
    results: Vec<TmdbMovie>,
}

#[derive(Debug, Deserialize)]
struct TmdbMovie {
    id: u64,
    title: String,
    #[serde(default)]
    release_date: Option<String>,
}

/// Response from the OMDb title endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OmdbResponse {
    response: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    year: Option<String>,
    #[serde(default, rename = "imdbID")]
    imdb_id: Option<String>,
}

/// Build the ordered provider list from the configured API keys.
/// TMDB comes first when both are available.
///
/// # Errors
/// Returns an error if the HTTP client cannot be created.
pub fn providers_from_config(config: &Config) -> Result<Vec<Box<dyn MetadataProvider>>> {
    let mut providers: Vec<Box<dyn MetadataProvider>> = Vec::new();
    if let Some(key) = &config.tmdb_api_key {
        providers.push(Box::new(TmdbProvider::new(key, config.request_timeout)?));
    }
    if let Some(key) = &config.omdb_api_key {
        providers.push(Box::new(OmdbProvider::new(key, config.request_timeout)?));
    }
    Ok(providers)
}

fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")
}

impl TmdbProvider {
    /// Create a new TMDB client with the given request timeout.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(api_key: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            api_key: api_key.to_string(),
        })
    }

    fn parse(body: &str) -> Result<Option<MetadataRecord>> {
        let response: TmdbSearchResponse =
            serde_json::from_str(body).context("Failed to parse TMDB search response")?;
        Ok(response.results.into_iter().next().map(|movie| MetadataRecord {
            source: MetadataSource::Tmdb,
            id: movie.id.into(),
            title: movie.title,
            year: movie
                .release_date
                .and_then(|date| date.get(..4).map(ToString::to_string))
                .filter(|year| !year.is_empty()),
        }))
    }
}

impl MetadataProvider for TmdbProvider {
    fn source(&self) -> MetadataSource {
        MetadataSource::Tmdb
    }

    fn lookup(&self, title: &str, year: Option<&str>) -> Result<Option<MetadataRecord>> {
        let mut params = vec![("api_key", self.api_key.as_str()), ("query", title)];
        if let Some(year) = year {
            params.push(("year", year));
        }

        let response = self
            .client
            .get(TMDB_SEARCH_URL)
            .query(&params)
            .send()
            .context("Failed to send TMDB search request")?;

        let status = response.status();
        if status != StatusCode::OK {
            bail!("TMDB search failed: HTTP {status}");
        }

        let body = response.text().context("Failed to read TMDB response body")?;
        Self::parse(&body)
    }
}

impl OmdbProvider {
    /// Create a new OMDb client with the given request timeout.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(api_key: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            api_key: api_key.to_string(),
        })
    }

    fn parse(body: &str) -> Result<Option<MetadataRecord>> {
        let response: OmdbResponse = serde_json::from_str(body).context("Failed to parse OMDb response")?;
        if response.response != "True" {
            return Ok(None);
        }
        let Some(imdb_id) = response.imdb_id else {
            bail!("OMDb response is missing imdbID");
        };
        let Some(title) = response.title else {
            bail!("OMDb response is missing Title");
        };
        Ok(Some(MetadataRecord {
            source: MetadataSource::Omdb,
            id: imdb_id.as_str().into(),
            title,
            year: response.year.filter(|year| !year.is_empty()),
        }))
    }
}

impl MetadataProvider for OmdbProvider {
    fn source(&self) -> MetadataSource {
        MetadataSource::Omdb
    }

    fn lookup(&self, title: &str, year: Option<&str>) -> Result<Option<MetadataRecord>> {
        let mut params = vec![("apikey", self.api_key.as_str()), ("t", title)];
        if let Some(year) = year {
            params.push(("y", year));
        }

        let response = self
            .client
            .get(OMDB_URL)
            .query(&params)
            .send()
            .context("Failed to send OMDb request")?;

        // OMDb reports misses with a JSON body, so the status alone is not enough
        let status = response.status();
        let body = response.text().context("Failed to read OMDb response body")?;
        match Self::parse(&body) {
            Ok(record) => Ok(record),
            Err(error) if !status.is_success() => Err(error.context(format!("OMDb request failed: HTTP {status}"))),
            Err(error) => Err(error),
        }
    }
}

#[cfg(test)]
mod tmdb_tests {
    use super::*;

    use crate::organizer::metadata::MetadataId;

    #[test]
    fn parses_first_search_result() {
        let body = r#"{
            "page": 1,
            "results": [
                {"id": 603, "title": "The Matrix", "release_date": "1999-03-30"},
                {"id": 604, "title": "The Matrix Reloaded", "release_date": "2003-05-15"}
            ]
        }"#;
        let record = TmdbProvider::parse(body).expect("should parse").expect("should find a movie");
        assert_eq!(record.source, MetadataSource::Tmdb);
        assert_eq!(record.id, MetadataId::Numeric(603));
        assert_eq!(record.title, "The Matrix");
        assert_eq!(record.year.as_deref(), Some("1999"));
    }

    #[test]
    fn empty_results_is_not_found() {
        let body = r#"{"page": 1, "results": [], "total_results": 0}"#;
        assert!(TmdbProvider::parse(body).expect("should parse").is_none());
    }

    #[test]
    fn missing_release_date_gives_no_year() {
        let body = r#"{"results": [{"id": 1, "title": "Untitled", "release_date": ""}]}"#;
        let record = TmdbProvider::parse(body).expect("should parse").expect("should find a movie");
        assert_eq!(record.year, None);
    }

    #[test]
    fn malformed_body_is_an_error() {
        assert!(TmdbProvider::parse("<html>Bad gateway</html>").is_err());
        assert!(TmdbProvider::parse(r#"{"results": [{"title": "No id"}]}"#).is_err());
    }
}
