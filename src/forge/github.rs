//! GitHub REST client used by the sync pipeline.
//!
//! Pagination is driven by the `Link` response header; `rel="last"` carries
//! the final page number, which makes commit counting a single request in the
//! common case. Transient failures (network errors, 5xx) are retried three
//! times with a fixed 5 second backoff before surfacing.

use crate::forge::ForgeClient;
use crate::forge::types::{
    CommitDetail, CommitSummary, ContributorEntry, IssueEntry, PullEntry,
};
use chrono::{DateTime, Utc};
use regex::Regex;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

const API_BASE: &str = "https://api.github.com";
const PER_PAGE: u32 = 100;
const MAX_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_secs(5);
const PROBE_TIMEOUT: Duration = Duration::from_secs(30);
const FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Pagination fallback bound when the `Link` header is absent
/// (100 pages x 100 commits).
const COUNT_FALLBACK_MAX_PAGES: u32 = 100;

/// Errors surfaced by the forge client.
#[derive(Debug, Error)]
pub enum ForgeError {
    #[error("forge API token not configured")]
    MissingToken,
    #[error("forge HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("forge returned status {status} for {endpoint}")]
    Status { status: StatusCode, endpoint: String },
    #[error("failed to decode forge response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        source: serde_json::Error,
    },
}

impl ForgeError {
    /// Configuration errors must not be retried or swallowed per-commit.
    pub fn is_configuration(&self) -> bool {
        matches!(self, ForgeError::MissingToken)
    }
}

/// GitHub implementation of the provider capability.
#[derive(Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    base_url: String,
}

impl GithubClient {
    /// Build a client authenticated with the given personal access token.
    /// A missing token is a fatal configuration error, not a retryable one.
    pub fn new(token: Option<String>) -> Result<Self, ForgeError> {
        let token = token
            .or_else(|| std::env::var("GITHUB_TOKEN").ok())
            .filter(|t| !t.is_empty())
            .ok_or(ForgeError::MissingToken)?;

        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("token {token}"))
            .map_err(|_| ForgeError::MissingToken)?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github.v3+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(10))
            .user_agent("forgepulse-sync/0.1")
            .build()?;

        Ok(Self {
            http,
            base_url: API_BASE.to_string(),
        })
    }

    /// Point the client at a different API root (tests, GitHub Enterprise).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Issue a GET with retry on transient failures: network errors and 5xx
    /// responses are retried up to three times with a fixed backoff, other
    /// error statuses fail immediately.
    async fn get_with_retry(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
        timeout: Duration,
    ) -> Result<reqwest::Response, ForgeError> {
        let url = format!("{}{}", self.base_url, endpoint);

        let mut attempt = 0;
        loop {
            attempt += 1;

            let outcome = self
                .http
                .get(&url)
                .query(query)
                .timeout(timeout)
                .send()
                .await;

            match outcome {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) if response.status().is_server_error() && attempt < MAX_ATTEMPTS => {
                    log::warn!(
                        "forge returned {} for {} (attempt {}/{}), retrying",
                        response.status(),
                        endpoint,
                        attempt,
                        MAX_ATTEMPTS
                    );
                    tokio::time::sleep(RETRY_BACKOFF).await;
                }
                Ok(response) => {
                    return Err(ForgeError::Status {
                        status: response.status(),
                        endpoint: endpoint.to_string(),
                    });
                }
                Err(err) if attempt < MAX_ATTEMPTS => {
                    log::warn!(
                        "forge request to {} failed (attempt {}/{}): {}, retrying",
                        endpoint,
                        attempt,
                        MAX_ATTEMPTS,
                        err
                    );
                    tokio::time::sleep(RETRY_BACKOFF).await;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    async fn decode_body<T: DeserializeOwned>(
        endpoint: &str,
        response: reqwest::Response,
    ) -> Result<T, ForgeError> {
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|source| ForgeError::Decode {
            endpoint: endpoint.to_string(),
            source,
        })
    }
}

#[rocket::async_trait]
impl ForgeClient for GithubClient {
    async fn list_commits(
        &self,
        owner: &str,
        repo: &str,
        since: Option<DateTime<Utc>>,
        max_commits: Option<usize>,
    ) -> Result<Vec<CommitSummary>, ForgeError> {
        let endpoint = format!("/repos/{owner}/{repo}/commits");
        let mut all_commits = Vec::new();
        let mut page: u32 = 1;

        loop {
            let mut query = vec![
                ("per_page", PER_PAGE.to_string()),
                ("page", page.to_string()),
            ];
            if let Some(since) = since {
                query.push(("since", since.to_rfc3339()));
            }

            let response = self.get_with_retry(&endpoint, &query, FETCH_TIMEOUT).await?;
            let has_next = link_has_next(link_header(&response).as_deref());
            let commits: Vec<CommitSummary> = Self::decode_body(&endpoint, response).await?;

            if commits.is_empty() {
                break;
            }

            for commit in commits {
                all_commits.push(commit);
                if let Some(max) = max_commits {
                    if all_commits.len() >= max {
                        return Ok(all_commits);
                    }
                }
            }

            log::debug!("retrieved commits page {} for {}/{}", page, owner, repo);

            if !has_next {
                break;
            }
            page += 1;
        }

        log::info!(
            "retrieved {} commits for {}/{}",
            all_commits.len(),
            owner,
            repo
        );
        Ok(all_commits)
    }

    async fn get_commit(
        &self,
        owner: &str,
        repo: &str,
        reference: &str,
    ) -> Result<CommitDetail, ForgeError> {
        let endpoint = format!("/repos/{owner}/{repo}/commits/{reference}");
        let response = self.get_with_retry(&endpoint, &[], FETCH_TIMEOUT).await?;
        Self::decode_body(&endpoint, response).await
    }

    async fn count_commits(&self, owner: &str, repo: &str) -> Result<u64, ForgeError> {
        let endpoint = format!("/repos/{owner}/{repo}/commits");

        // One commit per page: the last-page number in the Link header IS the
        // commit count.
        let query = vec![("per_page", "1".to_string()), ("page", "1".to_string())];
        let response = self.get_with_retry(&endpoint, &query, PROBE_TIMEOUT).await?;
        let link = link_header(&response);

        if let Some(count) = link.as_deref().and_then(parse_last_page) {
            return Ok(count);
        }

        // No Link header (small repos return everything on one page): count
        // by paginating from scratch, bounded to keep the probe cheap.
        let first_page: Vec<serde_json::Value> = Self::decode_body(&endpoint, response).await?;
        if first_page.is_empty() {
            return Ok(0);
        }

        let mut total: u64 = 0;
        let mut page: u32 = 1;
        while page <= COUNT_FALLBACK_MAX_PAGES {
            let query = vec![
                ("per_page", PER_PAGE.to_string()),
                ("page", page.to_string()),
            ];
            let response = self.get_with_retry(&endpoint, &query, PROBE_TIMEOUT).await?;
            let commits: Vec<serde_json::Value> = Self::decode_body(&endpoint, response).await?;

            if commits.is_empty() {
                break;
            }

            total += commits.len() as u64;

            if commits.len() < PER_PAGE as usize {
                break;
            }
            page += 1;
        }

        Ok(total)
    }

    async fn list_contributors(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<ContributorEntry>, ForgeError> {
        let endpoint = format!("/repos/{owner}/{repo}/contributors");
        let response = self.get_with_retry(&endpoint, &[], FETCH_TIMEOUT).await?;
        Self::decode_body(&endpoint, response).await
    }

    async fn list_pulls(
        &self,
        owner: &str,
        repo: &str,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<Vec<PullEntry>, ForgeError> {
        let endpoint = format!("/repos/{owner}/{repo}/pulls");
        let mut all_pulls = Vec::new();
        let mut page: u32 = 1;

        loop {
            let query = vec![
                ("state", "all".to_string()),
                ("per_page", PER_PAGE.to_string()),
                ("page", page.to_string()),
            ];

            let response = self.get_with_retry(&endpoint, &query, FETCH_TIMEOUT).await?;
            let has_next = link_has_next(link_header(&response).as_deref());
            let pulls: Vec<PullEntry> = Self::decode_body(&endpoint, response).await?;

            if pulls.is_empty() {
                break;
            }

            for pull in pulls {
                if let Some(created_at) = pull.created_at {
                    // The list is newest-first: once a PR predates the
                    // window, every later one does too.
                    if let Some(since) = since {
                        if created_at < since {
                            return Ok(all_pulls);
                        }
                    }
                    if let Some(until) = until {
                        if created_at > until {
                            continue;
                        }
                    }
                }
                all_pulls.push(pull);
            }

            if !has_next {
                break;
            }
            page += 1;
        }

        Ok(all_pulls)
    }

    async fn list_issues(
        &self,
        owner: &str,
        repo: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<IssueEntry>, ForgeError> {
        let endpoint = format!("/repos/{owner}/{repo}/issues");
        let mut all_issues = Vec::new();
        let mut page: u32 = 1;

        loop {
            let mut query = vec![
                ("state", "all".to_string()),
                ("per_page", PER_PAGE.to_string()),
                ("page", page.to_string()),
            ];
            if let Some(since) = since {
                query.push(("since", since.to_rfc3339()));
            }

            let response = self.get_with_retry(&endpoint, &query, FETCH_TIMEOUT).await?;
            let has_next = link_has_next(link_header(&response).as_deref());
            let issues: Vec<IssueEntry> = Self::decode_body(&endpoint, response).await?;

            if issues.is_empty() {
                break;
            }

            // The issues feed also returns pull requests; those carry a
            // `pull_request` field.
            all_issues.extend(issues.into_iter().filter(|i| i.pull_request.is_none()));

            if !has_next {
                break;
            }
            page += 1;
        }

        Ok(all_issues)
    }
}

fn link_header(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get(reqwest::header::LINK)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

/// Whether a `Link` header advertises a further page.
fn link_has_next(link: Option<&str>) -> bool {
    link.is_some_and(|l| l.contains("rel=\"next\""))
}

/// Extract the final page number from a `Link` header,
/// e.g. `<https://...?page=42&per_page=1>; rel="last"` -> 42.
fn parse_last_page(link: &str) -> Option<u64> {
    static LAST_PAGE: OnceLock<Regex> = OnceLock::new();
    let re = LAST_PAGE.get_or_init(|| Regex::new(r#"[?&]page=(\d+)[^>]*>;\s*rel="last""#).unwrap());

    re.captures(link)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_last_page_from_link_header() {
        let link = r#"<https://api.github.com/repositories/1/commits?per_page=1&page=2>; rel="next", <https://api.github.com/repositories/1/commits?per_page=1&page=347>; rel="last""#;
        assert_eq!(parse_last_page(link), Some(347));
    }

    #[test]
    fn parses_last_page_when_page_is_not_the_first_param() {
        let link = r#"<https://api.github.com/repos/o/r/commits?per_page=1&page=12>; rel="last""#;
        assert_eq!(parse_last_page(link), Some(12));
    }

    #[test]
    fn missing_last_rel_yields_none() {
        let link = r#"<https://api.github.com/repos/o/r/commits?page=2>; rel="next""#;
        assert_eq!(parse_last_page(link), None);
        assert_eq!(parse_last_page(""), None);
    }

    #[test]
    fn next_rel_detection() {
        assert!(link_has_next(Some(r#"<u?page=2>; rel="next""#)));
        assert!(!link_has_next(Some(r#"<u?page=9>; rel="last""#)));
        assert!(!link_has_next(None));
    }

    #[test]
    fn missing_token_is_a_configuration_error() {
        // Force an empty environment view by passing an empty token.
        let result = GithubClient::new(Some(String::new()));
        if std::env::var("GITHUB_TOKEN").is_err() {
            assert!(matches!(result, Err(ForgeError::MissingToken)));
            assert!(result.err().unwrap().is_configuration());
        }
    }
}
