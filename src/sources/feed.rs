//! Release feed access.
//!
//! The feed speaks the GitHub releases JSON dialect. It sits behind a trait
//! so resolution logic can be tested against a stub without a network.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("network error talking to the release feed")]
    Network(#[source] reqwest::Error),

    #[error("repository {owner}/{repo} not found on the release feed")]
    RepositoryNotFound { owner: String, repo: String },

    #[error("release feed rate limit exceeded")]
    RateLimited,
}

/// One downloadable file attached to a release.
#[derive(Debug, Clone, Deserialize)]
pub struct Asset {
    pub name: String,
    #[serde(rename = "browser_download_url")]
    pub url: String,
}

/// One published release.
#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    #[serde(rename = "tag_name")]
    pub tag: String,
    #[serde(default)]
    pub prerelease: bool,
    #[serde(default)]
    pub assets: Vec<Asset>,
}

/// Abstraction over the release host. `Sync` so listings can fan out over
/// a rayon pool.
pub trait ReleaseFeed: Sync {
    /// All releases of a repository, newest first as the feed reports them.
    fn list_releases(
        &self,
        owner: &str,
        repo: &str,
        token: Option<&str>,
    ) -> Result<Vec<Release>, FeedError>;

    /// Download one release asset into memory.
    fn download_asset(&self, asset: &Asset, token: Option<&str>) -> Result<Vec<u8>, FeedError>;
}

/// Blocking HTTP implementation of [`ReleaseFeed`].
pub struct HttpReleaseFeed {
    client: reqwest::blocking::Client,
    api_base: String,
}

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

impl HttpReleaseFeed {
    pub fn new() -> Result<Self, FeedError> {
        Self::with_api_base("https://api.github.com")
    }

    pub fn with_api_base(api_base: &str) -> Result<Self, FeedError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("caravel/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(FeedError::Network)?;
        Ok(HttpReleaseFeed {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    fn check_status(
        response: reqwest::blocking::Response,
        owner: &str,
        repo: &str,
    ) -> Result<reqwest::blocking::Response, FeedError> {
        match response.status() {
            reqwest::StatusCode::NOT_FOUND => Err(FeedError::RepositoryNotFound {
                owner: owner.to_string(),
                repo: repo.to_string(),
            }),
            reqwest::StatusCode::FORBIDDEN | reqwest::StatusCode::TOO_MANY_REQUESTS => {
                Err(FeedError::RateLimited)
            }
            _ => response.error_for_status().map_err(FeedError::Network),
        }
    }
}


impl ReleaseFeed for HttpReleaseFeed {
    fn list_releases(
        &self,
        owner: &str,
        repo: &str,
        token: Option<&str>,
    ) -> Result<Vec<Release>, FeedError> {
        let url = format!(
            "{}/repos/{owner}/{repo}/releases?per_page=100",
            self.api_base
        );
        let mut request = self.client.get(&url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        let response = request.send().map_err(FeedError::Network)?;
        let response = Self::check_status(response, owner, repo)?;
        response.json().map_err(FeedError::Network)
    }

    fn download_asset(&self, asset: &Asset, token: Option<&str>) -> Result<Vec<u8>, FeedError> {
        let mut request = self
            .client
            .get(&asset.url)
            .header(reqwest::header::ACCEPT, "application/octet-stream");
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .map_err(FeedError::Network)?
            .error_for_status()
            .map_err(FeedError::Network)?;
        let bytes = response.bytes().map_err(FeedError::Network)?;
        Ok(bytes.to_vec())
    }
}
