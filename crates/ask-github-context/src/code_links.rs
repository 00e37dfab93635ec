//! Source-file links embedded in issue text
//! (`https://github.com/{owner}/{repo}/blob/{ref}/{path}#L1-L9`).

use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::Serialize;

use crate::entity_fetcher::with_timeout;
use crate::entity_key::{OWNER_PATTERN, REPO_PATTERN};
use crate::entity_source::EntitySource;
use crate::throttle::throttle;

pub const DEFAULT_CODE_LINK_EXTENSIONS: &[&str] = &[".ts", ".json", ".sol"];

static BLOB_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r#"(?i)https?://(?:www\.)?github\.com/({OWNER_PATTERN})/({REPO_PATTERN})/blob/([^/\s#?]+)/([^\s#?)\]>"'`]+)"#
    ))
    .expect("blob url pattern compiles")
});

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CodeLink {
    pub owner: String,
    pub repo: String,
    pub git_ref: String,
    pub path: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkedFile {
    pub link: CodeLink,
    pub content: String,
}

/// Extract blob links whose path ends with one of `extensions`
/// (case-insensitive). Line anchors are dropped; duplicates keep the first.
pub fn extract_code_links(text: &str, extensions: &[String]) -> Vec<CodeLink> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for captures in BLOB_URL_RE.captures_iter(text) {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        let path = captures[4].trim_end_matches(['.', ',', ';', ':']);
        if !has_allowed_extension(path, extensions) {
            continue;
        }
        let link = CodeLink {
            owner: captures[1].to_ascii_lowercase(),
            repo: captures[2].to_ascii_lowercase(),
            git_ref: captures[3].to_string(),
            path: path.to_string(),
            url: whole.as_str().trim_end_matches(['.', ',', ';', ':']).to_string(),
        };
        if seen.insert((
            link.owner.clone(),
            link.repo.clone(),
            link.git_ref.clone(),
            link.path.clone(),
        )) {
            links.push(link);
        }
    }
    links
}

fn has_allowed_extension(path: &str, extensions: &[String]) -> bool {
    let lowered = path.to_ascii_lowercase();
    extensions
        .iter()
        .any(|extension| lowered.ends_with(&extension.to_ascii_lowercase()))
}

/// Fetch every link's content; failures and missing files are skipped.
pub async fn fetch_linked_files(
    source: &dyn EntitySource,
    links: Vec<CodeLink>,
    limit: usize,
    timeout: Duration,
) -> Vec<LinkedFile> {
    let tasks = links.into_iter().map(|link| async move {
        let result = with_timeout(
            timeout,
            source.get_file_content(
                &link.owner,
                &link.repo,
                &link.path,
                Some(link.git_ref.as_str()),
            ),
        )
        .await;
        match result {
            Ok(Some(content)) => Some(LinkedFile { link, content }),
            Ok(None) => {
                tracing::debug!(url = %link.url, "linked file not found");
                None
            }
            Err(error) => {
                tracing::warn!(
                    url = %link.url,
                    error = %format!("{error:#}"),
                    "failed to fetch linked file"
                );
                None
            }
        }
    });
    throttle(tasks, limit).await.into_iter().flatten().collect()
}
