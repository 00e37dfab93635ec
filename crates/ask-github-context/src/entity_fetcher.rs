//! Failure-tolerant wrappers around [`EntitySource`].
//!
//! A missing, deleted or permission-restricted entity must not abort a
//! traversal, so every call here logs its failure and degrades to an absent
//! value instead of returning an error.

use std::future::Future;
use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::entity_key::{EntityKey, EntityRef};
use crate::entity_source::EntitySource;
use crate::github_types::RawComment;

#[derive(Debug, Clone)]
/// One entity as read from the fetch boundary.
pub struct FetchedEntity {
    pub key: EntityKey,
    pub url: String,
    pub title: String,
    pub body: Option<String>,
    pub is_pull_request: bool,
    /// Human-authored comments only.
    pub raw_comments: Vec<RawComment>,
    /// `None` for issues and for pull requests whose diff could not be read.
    pub diff: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    pub timeout: Duration,
    pub fetch_diffs: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            fetch_diffs: true,
        }
    }
}

/// Fetch metadata, comments and (for pull requests) the diff of one entity.
///
/// Returns `None` when the metadata itself cannot be read. Comment and diff
/// failures leave the entity resolved with empty comments or no diff.
pub async fn fetch_entity(
    source: &dyn EntitySource,
    entity_ref: &EntityRef,
    options: FetchOptions,
) -> Option<FetchedEntity> {
    let key = &entity_ref.key;
    let issue = match with_timeout(options.timeout, source.get_entity(key)).await {
        Ok(issue) => issue,
        Err(error) => {
            tracing::warn!(entity = %key, error = %format!("{error:#}"), "failed to fetch entity");
            return None;
        }
    };
    let is_pull_request = issue.is_pull_request();
    let raw_comments = fetch_comments(source, key, is_pull_request, options.timeout).await;
    let diff = if is_pull_request && options.fetch_diffs {
        fetch_diff(source, key, options.timeout).await
    } else {
        None
    };
    let url = if issue.html_url.trim().is_empty() {
        entity_ref.url.clone()
    } else {
        issue.html_url.clone()
    };
    tracing::debug!(
        entity = %key,
        is_pull_request,
        comments = raw_comments.len(),
        "fetched entity"
    );
    Some(FetchedEntity {
        key: key.clone(),
        url,
        title: issue.title,
        body: issue.body,
        is_pull_request,
        raw_comments,
        diff,
    })
}

/// List comments with the strategy matching the entity kind, minus Bot authors.
pub async fn fetch_comments(
    source: &dyn EntitySource,
    key: &EntityKey,
    is_pull_request: bool,
    timeout: Duration,
) -> Vec<RawComment> {
    match with_timeout(timeout, source.list_comments(key, is_pull_request)).await {
        Ok(comments) => comments
            .into_iter()
            .filter(|comment| !comment.is_bot())
            .collect(),
        Err(error) => {
            tracing::warn!(entity = %key, error = %format!("{error:#}"), "failed to list comments");
            Vec::new()
        }
    }
}

pub async fn fetch_diff(
    source: &dyn EntitySource,
    key: &EntityKey,
    timeout: Duration,
) -> Option<String> {
    match with_timeout(timeout, source.get_diff(key)).await {
        Ok(diff) => diff.filter(|diff| !diff.trim().is_empty()),
        Err(error) => {
            tracing::warn!(entity = %key, error = %format!("{error:#}"), "failed to fetch diff");
            None
        }
    }
}

pub(crate) async fn with_timeout<T>(
    timeout: Duration,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(anyhow!("timed out after {} ms", timeout.as_millis())),
    }
}
