use anyhow::Result;
use async_trait::async_trait;

use crate::entity_key::EntityKey;
use crate::github_types::{GithubIssue, RawComment};

#[async_trait]
/// Fetch boundary the context engine reads GitHub data through.
///
/// Implementations own transport, pagination and retries. Every method may
/// fail; the engine absorbs failures and keeps traversing.
pub trait EntitySource: Send + Sync {
    /// Issue or pull request metadata, including the `pull_request` flag.
    async fn get_entity(&self, key: &EntityKey) -> Result<GithubIssue>;

    /// Every comment on the entity: review comments for pull requests,
    /// issue comments otherwise. Pagination is drained before returning.
    async fn list_comments(&self, key: &EntityKey, is_pull_request: bool)
        -> Result<Vec<RawComment>>;

    /// Unified diff of a pull request, `None` when unavailable.
    async fn get_diff(&self, key: &EntityKey) -> Result<Option<String>>;

    /// Raw file content at `git_ref` (default branch when `None`).
    async fn get_file_content(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<Option<String>>;
}
