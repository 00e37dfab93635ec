use std::path::PathBuf;
use std::time::Duration;

use ask_github_client::github_api_client::{
    GithubClientConfig, DEFAULT_GITHUB_API_BASE, DEFAULT_REQUEST_TIMEOUT_MS,
    DEFAULT_RETRY_BASE_DELAY_MS, DEFAULT_RETRY_MAX_ATTEMPTS,
};
use ask_github_context::throttle::DEFAULT_THROTTLE_LIMIT;
use ask_github_context::traversal::{TraversalConfig, DEFAULT_FETCH_TIMEOUT_MS, DEFAULT_MAX_HOPS};
use clap::{ArgAction, ArgGroup, Parser, ValueEnum};

fn parse_positive_usize(value: &str) -> Result<usize, String> {
    let parsed = value
        .parse::<usize>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_extension(value: &str) -> Result<String, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("extension must not be empty".to_string());
    }
    if trimmed.starts_with('.') {
        Ok(trimmed.to_ascii_lowercase())
    } else {
        Ok(format!(".{}", trimmed.to_ascii_lowercase()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliOutputFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "ask-context",
    about = "Resolve the linked issue and pull request context behind a GitHub question",
    version
)]
#[command(group(ArgGroup::new("seed").required(true).args(["url", "event_payload"])))]
pub struct Cli {
    #[arg(
        long = "url",
        env = "ASK_URL",
        help = "Issue or pull request to start from (html url, api url or owner/repo/number)"
    )]
    pub url: Option<String>,

    #[arg(
        long = "event-payload",
        env = "ASK_EVENT_PAYLOAD",
        help = "Path to an issue_comment.created webhook payload used as the seed"
    )]
    pub event_payload: Option<PathBuf>,

    #[arg(
        long = "question",
        env = "ASK_QUESTION",
        help = "Question to pair with the context; overrides the question found in --event-payload"
    )]
    pub question: Option<String>,

    #[arg(
        long = "app-slug",
        env = "ASK_APP_SLUG",
        help = "App name whose @mention marks a payload comment as a question; /gpt is used when unset"
    )]
    pub app_slug: Option<String>,

    #[arg(
        long = "github-api-base",
        env = "ASK_GITHUB_API_BASE",
        default_value = DEFAULT_GITHUB_API_BASE,
        help = "GitHub API base URL"
    )]
    pub github_api_base: String,

    #[arg(
        long = "github-token",
        env = "GITHUB_TOKEN",
        hide_env_values = true,
        help = "GitHub token used for API access; anonymous requests when unset"
    )]
    pub github_token: Option<String>,

    #[arg(
        long = "github-request-timeout-ms",
        env = "ASK_GITHUB_REQUEST_TIMEOUT_MS",
        default_value_t = DEFAULT_REQUEST_TIMEOUT_MS,
        value_parser = parse_positive_u64,
        help = "HTTP timeout for GitHub API requests in milliseconds"
    )]
    pub github_request_timeout_ms: u64,

    #[arg(
        long = "github-retry-max-attempts",
        env = "ASK_GITHUB_RETRY_MAX_ATTEMPTS",
        default_value_t = DEFAULT_RETRY_MAX_ATTEMPTS,
        value_parser = parse_positive_usize,
        help = "Maximum attempts for retryable GitHub API failures (429/5xx/transport)"
    )]
    pub github_retry_max_attempts: usize,

    #[arg(
        long = "github-retry-base-delay-ms",
        env = "ASK_GITHUB_RETRY_BASE_DELAY_MS",
        default_value_t = DEFAULT_RETRY_BASE_DELAY_MS,
        value_parser = parse_positive_u64,
        help = "Base backoff delay in milliseconds for GitHub API retries"
    )]
    pub github_retry_base_delay_ms: u64,

    #[arg(
        long = "max-hops",
        env = "ASK_MAX_HOPS",
        default_value_t = DEFAULT_MAX_HOPS,
        help = "Maximum reference distance from the seed that is still expanded (0 fetches only the seed)"
    )]
    pub max_hops: usize,

    #[arg(
        long = "concurrency",
        env = "ASK_CONCURRENCY",
        default_value_t = DEFAULT_THROTTLE_LIMIT,
        value_parser = parse_positive_usize,
        help = "Maximum in-flight entity fetches"
    )]
    pub concurrency: usize,

    #[arg(
        long = "fetch-timeout-ms",
        env = "ASK_FETCH_TIMEOUT_MS",
        default_value_t = DEFAULT_FETCH_TIMEOUT_MS,
        value_parser = parse_positive_u64,
        help = "Upper bound for fetching one entity, its comments or its diff, including retries"
    )]
    pub fetch_timeout_ms: u64,

    #[arg(
        long = "same-owner-only",
        env = "ASK_SAME_OWNER_ONLY",
        default_value_t = true,
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        help = "Skip references owned by anyone other than the seed's owner"
    )]
    pub same_owner_only: bool,

    #[arg(
        long = "follow-hash-references",
        env = "ASK_FOLLOW_HASH_REFERENCES",
        default_value_t = true,
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        help = "Resolve #N shorthand against the repository of the text it appears in"
    )]
    pub follow_hash_references: bool,

    #[arg(
        long = "fetch-diffs",
        env = "ASK_FETCH_DIFFS",
        default_value_t = true,
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        help = "Fetch unified diffs for pull requests"
    )]
    pub fetch_diffs: bool,

    #[arg(
        long = "follow-code-links",
        env = "ASK_FOLLOW_CODE_LINKS",
        default_value_t = false,
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        help = "Fetch source files linked from issue text as additional context"
    )]
    pub follow_code_links: bool,

    #[arg(
        long = "code-link-extensions",
        env = "ASK_CODE_LINK_EXTENSIONS",
        value_delimiter = ',',
        default_value = ".ts,.json,.sol",
        value_parser = parse_extension,
        help = "File extensions eligible for --follow-code-links"
    )]
    pub code_link_extensions: Vec<String>,

    #[arg(
        long = "output",
        env = "ASK_OUTPUT",
        value_enum,
        default_value_t = CliOutputFormat::Text,
        help = "Render the context as delimited text or as a JSON document"
    )]
    pub output: CliOutputFormat,
}

impl Cli {
    pub fn traversal_config(&self) -> TraversalConfig {
        TraversalConfig {
            max_hops: self.max_hops,
            concurrency: self.concurrency,
            same_owner_only: self.same_owner_only,
            follow_hash_references: self.follow_hash_references,
            fetch_diffs: self.fetch_diffs,
            fetch_timeout: Duration::from_millis(self.fetch_timeout_ms),
            follow_code_links: self.follow_code_links,
            code_link_extensions: self.code_link_extensions.clone(),
        }
    }

    pub fn client_config(&self) -> GithubClientConfig {
        GithubClientConfig {
            api_base: self.github_api_base.clone(),
            token: self.github_token.clone(),
            request_timeout_ms: self.github_request_timeout_ms,
            retry_max_attempts: self.github_retry_max_attempts,
            retry_base_delay_ms: self.github_retry_base_delay_ms,
        }
    }
}
