//! HTTP client implementation for GitHub repository content
//!
//! [`RepositoryContentClient`] is what the orchestrator depends on: it lists a
//! repository tree and fetches the bytes of one file. [`GitHubClient`] is the
//! production implementation over the GitHub REST API and raw content host.
//!
//! The module is organized into specialized components:
//! - `config`: HTTP client configuration and building
//! - `http`: Core HTTP operations with rate limiting and retries
//! - `rate_limit`: API quota information

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use url::Url;

use crate::app::models::{EntryKind, RefKind, RemoteFile, Repository, RepositoryReference};
use crate::constants::github;
use crate::errors::{ConfigError, ConfigResult, FetchError, FetchResult, ListingError, ListingResult};

pub mod config;
pub mod http;
pub mod rate_limit;

pub use config::ClientConfig;
pub use rate_limit::RateLimitInfo;

use http::{HttpFailure, HttpHandler};
use rate_limit::RateLimitResponse;

/// Source of repository listings and file content
#[async_trait]
pub trait RepositoryContentClient: Send + Sync {
    /// List every entry of the tree `reference` points at
    ///
    /// # Errors
    ///
    /// Returns [`ListingError`] if the repository or reference cannot be listed.
    async fn list_tree(&self, reference: &RepositoryReference) -> ListingResult<Vec<RemoteFile>>;

    /// Fetch the full content of one file
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] if the content cannot be retrieved.
    async fn fetch_content(&self, file: &RemoteFile) -> FetchResult<Vec<u8>>;
}

#[derive(Debug, Deserialize)]
struct TreeResponse {
    #[serde(default)]
    truncated: bool,
    tree: Vec<TreeEntry>,
}

#[derive(Debug, Deserialize)]
struct TreeEntry {
    path: String,
    mode: String,
    #[serde(rename = "type")]
    kind: String,
    sha: String,
    #[serde(default)]
    size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RepositoryResponse {
    default_branch: String,
}

/// GitHub client
///
/// Lists trees through the git trees API and downloads file content from the
/// raw content host, with a local request quota and retries on transient
/// failures.
#[derive(Debug)]
pub struct GitHubClient {
    http_handler: HttpHandler,
    api_base: Url,
    raw_base: Url,
}

impl GitHubClient {
    /// Creates a client with default configuration (anonymous access)
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if HTTP client creation fails
    pub fn new() -> ConfigResult<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Creates a client with custom configuration
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration is invalid or the HTTP
    /// client cannot be built
    pub fn with_config(config: ClientConfig) -> ConfigResult<Self> {
        config.validate()?;

        let client = config.build_http_client()?;
        let http_handler = HttpHandler::new(client, &config)?;
        let api_base = parse_base(&config.api_base_url, "api_base_url")?;
        let raw_base = parse_base(&config.raw_base_url, "raw_base_url")?;

        tracing::info!(
            "Created GitHub client for {} ({})",
            api_base,
            if config.token.is_some() {
                "authenticated"
            } else {
                "anonymous"
            }
        );

        Ok(Self {
            http_handler,
            api_base,
            raw_base,
        })
    }

    /// Base URL joined with `/`-separated segments, each percent-encoded
    fn endpoint<'a, I>(base: &Url, segments: I) -> Url
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut url = base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn tree_url(&self, reference: &RepositoryReference) -> Url {
        let mut url = Self::endpoint(
            &self.api_base,
            ["repos", reference.owner(), reference.repo_name(), "git", "trees"]
                .into_iter()
                .chain(reference.tree_ish().split('/')),
        );
        url.query_pairs_mut().append_pair("recursive", "1");
        url
    }

    fn raw_url(&self, reference: &RepositoryReference, path: &str) -> Url {
        Self::endpoint(
            &self.raw_base,
            [reference.owner(), reference.repo_name()]
                .into_iter()
                .chain(reference.tree_ish().split('/'))
                .chain(path.split('/')),
        )
    }

    fn convert_entry(&self, reference: &RepositoryReference, entry: TreeEntry) -> Option<RemoteFile> {
        let kind = match entry.kind.as_str() {
            "blob" if entry.mode == github::SYMLINK_MODE => EntryKind::Symlink,
            "blob" => EntryKind::Regular,
            "tree" => EntryKind::Directory,
            // Submodule commits live in another repository
            _ => return None,
        };

        let download_url = match kind {
            EntryKind::Directory => None,
            _ => Some(self.raw_url(reference, &entry.path).to_string()),
        };

        Some(RemoteFile {
            path: entry.path,
            size: entry.size.unwrap_or(0),
            sha: entry.sha,
            download_url,
            kind,
        })
    }

    fn listing_error(failure: HttpFailure, resource: &str) -> ListingError {
        match failure {
            HttpFailure::Transport { source, .. } => ListingError::Http(source),
            HttpFailure::Status {
                status, rate_limit, ..
            } => match status {
                StatusCode::NOT_FOUND | StatusCode::UNPROCESSABLE_ENTITY => ListingError::NotFound {
                    resource: resource.to_string(),
                },
                StatusCode::TOO_MANY_REQUESTS => ListingError::RateLimited {
                    reset_in_secs: rate_limit.map(|r| r.reset_in().as_secs()).unwrap_or(0),
                },
                StatusCode::FORBIDDEN if rate_limit.as_ref().is_some_and(|r| r.remaining == 0) => {
                    ListingError::RateLimited {
                        reset_in_secs: rate_limit.map(|r| r.reset_in().as_secs()).unwrap_or(0),
                    }
                }
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ListingError::Unauthorized {
                    status: status.as_u16(),
                },
                s if s.is_server_error() => ListingError::Server {
                    status: s.as_u16(),
                },
                s => ListingError::Other(format!("Unexpected HTTP {} for {}", s, resource)),
            },
        }
    }

    fn fetch_error(&self, failure: HttpFailure, url: &Url) -> FetchError {
        let retried = failure.retried();
        match failure {
            HttpFailure::Transport { .. } if retried => FetchError::MaxRetriesExceeded {
                max_retries: self.http_handler.max_retries(),
            },
            HttpFailure::Transport { source, .. } => FetchError::Http(source),
            HttpFailure::Status {
                status, rate_limit, ..
            } => match status {
                StatusCode::NOT_FOUND => FetchError::NotFound {
                    url: url.to_string(),
                },
                StatusCode::TOO_MANY_REQUESTS => FetchError::RateLimited,
                StatusCode::FORBIDDEN if rate_limit.as_ref().is_some_and(|r| r.remaining == 0) => {
                    FetchError::RateLimited
                }
                StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED => FetchError::Forbidden {
                    url: url.to_string(),
                },
                s if s.is_server_error() => FetchError::Server { status: s.as_u16() },
                s => FetchError::Other(format!("Unexpected HTTP {} for {}", s, url)),
            },
        }
    }

    /// Query the remaining API quota
    ///
    /// # Errors
    ///
    /// Returns [`ListingError`] if the quota endpoint cannot be read
    pub async fn rate_limit_info(&self) -> ListingResult<RateLimitInfo> {
        let url = Self::endpoint(&self.api_base, ["rate_limit"]);
        let response = self
            .http_handler
            .get(&url)
            .await
            .map_err(|f| Self::listing_error(f, "rate_limit"))?;

        let body: RateLimitResponse =
            response
                .json()
                .await
                .map_err(|e| ListingError::InvalidResponse {
                    reason: e.to_string(),
                })?;

        Ok(body.rate.into())
    }

    /// Quota information from the most recent response, if any carried it
    pub async fn last_rate_limit(&self) -> Option<RateLimitInfo> {
        self.http_handler.last_rate_limit().await
    }

    /// Classify a user-supplied reference name
    ///
    /// A 40 character hexadecimal name is taken as a commit SHA without a
    /// network call. Otherwise the name is looked up as a branch, then as a
    /// tag. With no name the repository's default branch is used.
    ///
    /// # Errors
    ///
    /// Returns [`ListingError::NotFound`] if the name is neither a branch nor
    /// a tag, or another [`ListingError`] if the API cannot be reached.
    pub async fn resolve_reference(
        &self,
        repository: &Repository,
        name: Option<&str>,
    ) -> ListingResult<RepositoryReference> {
        let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) else {
            let url = Self::endpoint(
                &self.api_base,
                ["repos", repository.owner.as_str(), repository.name.as_str()],
            );
            let response = self
                .http_handler
                .get(&url)
                .await
                .map_err(|f| Self::listing_error(f, &repository.full_name()))?;
            let body: RepositoryResponse =
                response
                    .json()
                    .await
                    .map_err(|e| ListingError::InvalidResponse {
                        reason: e.to_string(),
                    })?;
            return Ok(RepositoryReference::branch(
                repository.clone(),
                body.default_branch,
            ));
        };

        if looks_like_sha(name) {
            return RepositoryReference::new(
                repository.clone(),
                name,
                RefKind::Commit,
                Some(name.to_string()),
            )
            .map_err(|e| ListingError::Other(e.to_string()));
        }

        let resource = format!("{}@{}", repository, name);
        let candidates = [
            (
                RefKind::Branch,
                [
                    "repos",
                    repository.owner.as_str(),
                    repository.name.as_str(),
                    "branches",
                ],
            ),
            (
                RefKind::Tag,
                [
                    "repos",
                    repository.owner.as_str(),
                    repository.name.as_str(),
                    "git/ref/tags",
                ],
            ),
        ];

        for (kind, prefix) in candidates {
            let url = Self::endpoint(
                &self.api_base,
                prefix
                    .into_iter()
                    .flat_map(|s| s.split('/'))
                    .chain(name.split('/')),
            );
            match self.http_handler.get(&url).await {
                Ok(_) => {
                    tracing::debug!("Resolved {} as a {}", resource, kind);
                    return RepositoryReference::new(repository.clone(), name, kind, None)
                        .map_err(|e| ListingError::Other(e.to_string()));
                }
                Err(HttpFailure::Status { status, .. }) if status == StatusCode::NOT_FOUND => {
                    continue
                }
                Err(failure) => return Err(Self::listing_error(failure, &resource)),
            }
        }

        Err(ListingError::NotFound { resource })
    }
}

fn parse_base(value: &str, field: &str) -> ConfigResult<Url> {
    Url::parse(value).map_err(|e| ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn looks_like_sha(name: &str) -> bool {
    name.len() == 40 && name.chars().all(|c| c.is_ascii_hexdigit())
}

#[async_trait]
impl RepositoryContentClient for GitHubClient {
    async fn list_tree(&self, reference: &RepositoryReference) -> ListingResult<Vec<RemoteFile>> {
        let url = self.tree_url(reference);
        let resource = reference.to_string();
        tracing::debug!("Listing tree of {}", resource);

        let response = self
            .http_handler
            .get(&url)
            .await
            .map_err(|f| Self::listing_error(f, &resource))?;

        let body: TreeResponse =
            response
                .json()
                .await
                .map_err(|e| ListingError::InvalidResponse {
                    reason: e.to_string(),
                })?;

        if body.truncated {
            tracing::warn!(
                "Tree listing for {} was truncated by the server; some files will be missing",
                resource
            );
        }

        let files: Vec<RemoteFile> = body
            .tree
            .into_iter()
            .filter_map(|entry| self.convert_entry(reference, entry))
            .collect();

        tracing::info!("Listed {} entries in {}", files.len(), resource);
        Ok(files)
    }

    async fn fetch_content(&self, file: &RemoteFile) -> FetchResult<Vec<u8>> {
        let raw = file
            .download_url
            .as_deref()
            .ok_or_else(|| FetchError::InvalidUrl {
                url: String::new(),
                error: format!("{} has no download URL", file.path),
            })?;
        let url = Url::parse(raw).map_err(|e| FetchError::InvalidUrl {
            url: raw.to_string(),
            error: e.to_string(),
        })?;

        let response = self
            .http_handler
            .get(&url)
            .await
            .map_err(|f| self.fetch_error(f, &url))?;

        let bytes = response.bytes().await?;
        tracing::debug!("Fetched {} bytes for {}", bytes.len(), file.path);
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests;
