use std::time::Duration;

use anyhow::{bail, Context, Result};
use ask_github_context::entity_key::EntityKey;
use ask_github_context::entity_source::EntitySource;
use ask_github_context::github_types::{
    GithubIssue, GithubIssueComment, GithubReviewComment, RawComment,
};
use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;

use crate::retry_policy::{RetryDecision, RetryPolicy};

pub const DEFAULT_GITHUB_API_BASE: &str = "https://api.github.com";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_RETRY_MAX_ATTEMPTS: usize = 4;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 500;

const PAGE_SIZE: usize = 100;
const DIFF_MEDIA_TYPE: &str = "application/vnd.github.diff";
const RAW_MEDIA_TYPE: &str = "application/vnd.github.raw";
const ERROR_BODY_LIMIT: usize = 800;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Transport settings for [`GithubApiClient`].
pub struct GithubClientConfig {
    pub api_base: String,
    /// Sent as a bearer token when present; anonymous requests otherwise.
    pub token: Option<String>,
    pub request_timeout_ms: u64,
    pub retry_max_attempts: usize,
    pub retry_base_delay_ms: u64,
}

impl Default for GithubClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_GITHUB_API_BASE.to_string(),
            token: None,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            retry_max_attempts: DEFAULT_RETRY_MAX_ATTEMPTS,
            retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
        }
    }
}

#[derive(Clone)]
pub struct GithubApiClient {
    http: reqwest::Client,
    api_base: String,
    retry: RetryPolicy,
}

impl GithubApiClient {
    pub fn new(config: GithubClientConfig) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("ask-github-context"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            reqwest::header::HeaderValue::from_static("2022-11-28"),
        );
        if let Some(token) = config
            .token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
        {
            let auth_header = format!("Bearer {token}");
            let mut value = reqwest::header::HeaderValue::from_str(&auth_header)
                .context("invalid github authorization header")?;
            value.set_sensitive(true);
            headers.insert(reqwest::header::AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()
            .context("failed to create github api client")?;
        Ok(Self {
            http: client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            retry: RetryPolicy::new(config.retry_max_attempts, config.retry_base_delay_ms),
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub async fn get_issue(&self, owner: &str, repo: &str, number: u64) -> Result<GithubIssue> {
        let url = format!("{}/repos/{owner}/{repo}/issues/{number}", self.api_base);
        self.request_json("get issue", || self.http.get(&url)).await
    }

    pub async fn list_issue_comments(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<Vec<GithubIssueComment>> {
        let url = format!(
            "{}/repos/{owner}/{repo}/issues/{number}/comments",
            self.api_base
        );
        self.paginate("list issue comments", &url).await
    }

    pub async fn list_review_comments(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<Vec<GithubReviewComment>> {
        let url = format!(
            "{}/repos/{owner}/{repo}/pulls/{number}/comments",
            self.api_base
        );
        self.paginate("list review comments", &url).await
    }

    /// Unified diff of a pull request; `None` when GitHub answers 404.
    pub async fn get_pull_diff(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<Option<String>> {
        let url = format!("{}/repos/{owner}/{repo}/pulls/{number}", self.api_base);
        self.request_optional_text("get pull diff", || {
            self.http
                .get(&url)
                .header(reqwest::header::ACCEPT, DIFF_MEDIA_TYPE)
        })
        .await
    }

    /// Raw file content; `None` when the path or ref does not exist.
    pub async fn get_file_content(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<Option<String>> {
        let url = format!(
            "{}/repos/{owner}/{repo}/contents/{}",
            self.api_base,
            path.trim_start_matches('/')
        );
        self.request_optional_text("get file content", || {
            let mut request = self
                .http
                .get(&url)
                .header(reqwest::header::ACCEPT, RAW_MEDIA_TYPE);
            if let Some(git_ref) = git_ref {
                request = request.query(&[("ref", git_ref)]);
            }
            request
        })
        .await
    }

    async fn paginate<T>(&self, operation: &str, url: &str) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let mut page = 1_u32;
        let mut rows = Vec::new();
        loop {
            let page_value = page.to_string();
            let chunk: Vec<T> = self
                .request_json(operation, || {
                    self.http.get(url).query(&[
                        ("per_page", "100"),
                        ("page", page_value.as_str()),
                    ])
                })
                .await?;
            let chunk_len = chunk.len();
            rows.extend(chunk);
            if chunk_len < PAGE_SIZE {
                break;
            }
            page = page.saturating_add(1);
        }
        tracing::debug!(operation, rows = rows.len(), pages = page, "drained github pages");
        Ok(rows)
    }

    async fn request_json<T, F>(&self, operation: &str, request_builder: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let Some(response) = self.send_with_retry(operation, request_builder, false).await? else {
            bail!("github api {operation} returned no content");
        };
        response
            .json::<T>()
            .await
            .with_context(|| format!("failed to decode github {operation}"))
    }

    async fn request_optional_text<F>(
        &self,
        operation: &str,
        request_builder: F,
    ) -> Result<Option<String>>
    where
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let Some(response) = self.send_with_retry(operation, request_builder, true).await? else {
            return Ok(None);
        };
        let text = response
            .text()
            .await
            .with_context(|| format!("failed to read github {operation} body"))?;
        Ok(Some(text))
    }

    /// Send with retries on transport errors, 5xx and rate limiting. Returns
    /// `None` for a 404 when `allow_not_found` is set.
    async fn send_with_retry<F>(
        &self,
        operation: &str,
        mut request_builder: F,
        allow_not_found: bool,
    ) -> Result<Option<reqwest::Response>>
    where
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0_usize;
        loop {
            attempt = attempt.saturating_add(1);
            let response = request_builder()
                .header("x-ask-retry-attempt", attempt.saturating_sub(1).to_string())
                .send()
                .await;
            match response {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(Some(response));
                    }
                    if allow_not_found && status == reqwest::StatusCode::NOT_FOUND {
                        return Ok(None);
                    }

                    let decision = self
                        .retry
                        .on_status(status, response.headers(), attempt, Utc::now());
                    let body = response.text().await.unwrap_or_default();
                    if let RetryDecision::RetryAfter(delay) = decision {
                        tracing::debug!(
                            operation,
                            status = status.as_u16(),
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            "retrying github request"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    bail!(
                        "github api {operation} failed with status {}: {}",
                        status.as_u16(),
                        error_excerpt(&body)
                    );
                }
                Err(error) => {
                    if let RetryDecision::RetryAfter(delay) =
                        self.retry.on_transport_error(&error, attempt)
                    {
                        tracing::debug!(operation, attempt, %error, "retrying github transport");
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(error)
                        .with_context(|| format!("github api {operation} request failed"));
                }
            }
        }
    }
}

fn error_excerpt(body: &str) -> String {
    if body.chars().count() <= ERROR_BODY_LIMIT {
        return body.to_string();
    }
    let mut excerpt = body.chars().take(ERROR_BODY_LIMIT).collect::<String>();
    excerpt.push_str("...");
    excerpt
}

#[async_trait]
impl EntitySource for GithubApiClient {
    async fn get_entity(&self, key: &EntityKey) -> Result<GithubIssue> {
        self.get_issue(key.owner(), key.repo(), key.number()).await
    }

    async fn list_comments(
        &self,
        key: &EntityKey,
        is_pull_request: bool,
    ) -> Result<Vec<RawComment>> {
        let comments: Vec<RawComment> = if is_pull_request {
            self.list_review_comments(key.owner(), key.repo(), key.number())
                .await?
                .into_iter()
                .map(RawComment::from)
                .collect()
        } else {
            self.list_issue_comments(key.owner(), key.repo(), key.number())
                .await?
                .into_iter()
                .map(RawComment::from)
                .collect()
        };
        Ok(comments)
    }

    async fn get_diff(&self, key: &EntityKey) -> Result<Option<String>> {
        self.get_pull_diff(key.owner(), key.repo(), key.number()).await
    }

    async fn get_file_content(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<Option<String>> {
        GithubApiClient::get_file_content(self, owner, repo, path, git_ref).await
    }
}
