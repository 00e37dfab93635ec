use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::entity_key::EntityKey;
use crate::entity_source::EntitySource;
use crate::github_types::{
    AuthorType, GithubIssue, GithubIssueComment, GithubReviewComment, GithubUser, RawComment,
};

pub(crate) fn key(raw: &str) -> EntityKey {
    EntityKey::parse(raw).expect("test key")
}

#[derive(Default)]
/// In-memory GitHub used by engine tests.
pub(crate) struct FakeSource {
    issues: HashMap<EntityKey, GithubIssue>,
    comments: HashMap<EntityKey, Vec<RawComment>>,
    diffs: HashMap<EntityKey, String>,
    files: HashMap<String, String>,
    failing: HashSet<EntityKey>,
    failing_comments: HashSet<EntityKey>,
    failing_diffs: HashSet<EntityKey>,
    delays_ms: HashMap<EntityKey, u64>,
    entity_calls: Mutex<Vec<EntityKey>>,
}

impl FakeSource {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn insert_entity(mut self, raw_key: &str, body: Option<&str>, is_pull_request: bool) -> Self {
        let key = key(raw_key);
        let kind = if is_pull_request { "pull" } else { "issues" };
        let issue = GithubIssue {
            id: key.number() * 1_000,
            number: key.number(),
            title: format!("Entity {}", key.number()),
            body: body.map(str::to_string),
            html_url: format!(
                "https://github.com/{}/{}/{kind}/{}",
                key.owner(),
                key.repo(),
                key.number()
            ),
            user: Some(GithubUser {
                login: "author".to_string(),
                author_type: AuthorType::User,
            }),
            pull_request: is_pull_request.then(|| serde_json::json!({})),
        };
        self.issues.insert(key, issue);
        self
    }

    pub(crate) fn issue(self, raw_key: &str, body: &str) -> Self {
        self.insert_entity(raw_key, Some(body), false)
    }

    pub(crate) fn issue_without_body(self, raw_key: &str) -> Self {
        self.insert_entity(raw_key, None, false)
    }

    pub(crate) fn pull(self, raw_key: &str, body: &str) -> Self {
        self.insert_entity(raw_key, Some(body), true)
    }

    pub(crate) fn comment(self, raw_key: &str, id: u64, login: &str, body: &str) -> Self {
        self.push_comment(raw_key, id, login, AuthorType::User, body)
    }

    pub(crate) fn bot_comment(self, raw_key: &str, id: u64, login: &str, body: &str) -> Self {
        self.push_comment(raw_key, id, login, AuthorType::Bot, body)
    }

    fn push_comment(
        mut self,
        raw_key: &str,
        id: u64,
        login: &str,
        author_type: AuthorType,
        body: &str,
    ) -> Self {
        let key = key(raw_key);
        let is_pull_request = self
            .issues
            .get(&key)
            .is_some_and(GithubIssue::is_pull_request);
        let user = Some(GithubUser {
            login: login.to_string(),
            author_type,
        });
        let comment = if is_pull_request {
            RawComment::Review(GithubReviewComment {
                id,
                body: Some(body.to_string()),
                user,
                html_url: String::new(),
                pull_request_url: format!(
                    "https://api.github.com/repos/{}/{}/pulls/{}",
                    key.owner(),
                    key.repo(),
                    key.number()
                ),
                path: None,
            })
        } else {
            RawComment::Issue(GithubIssueComment {
                id,
                body: Some(body.to_string()),
                user,
                html_url: String::new(),
                issue_url: format!(
                    "https://api.github.com/repos/{}/{}/issues/{}",
                    key.owner(),
                    key.repo(),
                    key.number()
                ),
            })
        };
        self.comments.entry(key).or_default().push(comment);
        self
    }

    pub(crate) fn diff(mut self, raw_key: &str, diff: &str) -> Self {
        self.diffs.insert(key(raw_key), diff.to_string());
        self
    }

    pub(crate) fn file(
        mut self,
        owner: &str,
        repo: &str,
        path: &str,
        git_ref: &str,
        content: &str,
    ) -> Self {
        self.files
            .insert(format!("{owner}/{repo}/{path}@{git_ref}"), content.to_string());
        self
    }

    pub(crate) fn failing(mut self, raw_key: &str) -> Self {
        self.failing.insert(key(raw_key));
        self
    }

    pub(crate) fn failing_comments(mut self, raw_key: &str) -> Self {
        self.failing_comments.insert(key(raw_key));
        self
    }

    pub(crate) fn failing_diff(mut self, raw_key: &str) -> Self {
        self.failing_diffs.insert(key(raw_key));
        self
    }

    pub(crate) fn delay(mut self, raw_key: &str, delay_ms: u64) -> Self {
        self.delays_ms.insert(key(raw_key), delay_ms);
        self
    }

    pub(crate) fn entity_calls(&self) -> Vec<String> {
        self.entity_calls
            .lock()
            .map(|calls| calls.iter().map(ToString::to_string).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl EntitySource for FakeSource {
    async fn get_entity(&self, key: &EntityKey) -> Result<GithubIssue> {
        if let Ok(mut calls) = self.entity_calls.lock() {
            calls.push(key.clone());
        }
        if let Some(delay_ms) = self.delays_ms.get(key) {
            tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
        }
        if self.failing.contains(key) {
            return Err(anyhow!("simulated network error for {key}"));
        }
        self.issues
            .get(key)
            .cloned()
            .ok_or_else(|| anyhow!("github api get issue failed with status 404"))
    }

    async fn list_comments(
        &self,
        key: &EntityKey,
        _is_pull_request: bool,
    ) -> Result<Vec<RawComment>> {
        if self.failing_comments.contains(key) {
            return Err(anyhow!("simulated comment failure for {key}"));
        }
        Ok(self.comments.get(key).cloned().unwrap_or_default())
    }

    async fn get_diff(&self, key: &EntityKey) -> Result<Option<String>> {
        if self.failing_diffs.contains(key) {
            return Err(anyhow!("simulated diff failure for {key}"));
        }
        Ok(self.diffs.get(key).cloned())
    }

    async fn get_file_content(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<Option<String>> {
        let git_ref = git_ref.unwrap_or("HEAD");
        Ok(self
            .files
            .get(&format!("{owner}/{repo}/{path}@{git_ref}"))
            .cloned())
    }
}
