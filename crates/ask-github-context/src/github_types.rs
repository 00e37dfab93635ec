use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
/// Account type reported by GitHub for comment and issue authors.
pub enum AuthorType {
    #[default]
    User,
    Bot,
    Organization,
    #[serde(other)]
    Other,
}

impl AuthorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Bot => "Bot",
            Self::Organization => "Organization",
            Self::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
/// Public struct `GithubUser` used across ask components.
pub struct GithubUser {
    pub login: String,
    #[serde(rename = "type", default)]
    pub author_type: AuthorType,
}

impl GithubUser {
    pub fn is_bot(&self) -> bool {
        self.author_type == AuthorType::Bot
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
/// Issue metadata as returned by `GET /repos/{owner}/{repo}/issues/{number}`.
///
/// Pull requests come back from the same endpoint; `pull_request` is present
/// only for them.
pub struct GithubIssue {
    pub id: u64,
    pub number: u64,
    #[serde(default)]
    pub title: String,
    pub body: Option<String>,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub user: Option<GithubUser>,
    #[serde(default)]
    pub pull_request: Option<Value>,
}

impl GithubIssue {
    pub fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
/// Conversation comment on an issue or pull request.
pub struct GithubIssueComment {
    pub id: u64,
    pub body: Option<String>,
    #[serde(default)]
    pub user: Option<GithubUser>,
    #[serde(default)]
    pub html_url: String,
    pub issue_url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
/// Line-level review comment on a pull request.
pub struct GithubReviewComment {
    pub id: u64,
    pub body: Option<String>,
    #[serde(default)]
    pub user: Option<GithubUser>,
    #[serde(default)]
    pub html_url: String,
    pub pull_request_url: String,
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
/// Either upstream comment shape, before streamlining erases the difference.
pub enum RawComment {
    Issue(GithubIssueComment),
    Review(GithubReviewComment),
}

impl RawComment {
    pub fn id(&self) -> u64 {
        match self {
            Self::Issue(comment) => comment.id,
            Self::Review(comment) => comment.id,
        }
    }

    pub fn user(&self) -> Option<&GithubUser> {
        match self {
            Self::Issue(comment) => comment.user.as_ref(),
            Self::Review(comment) => comment.user.as_ref(),
        }
    }

    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Issue(comment) => comment.body.as_deref(),
            Self::Review(comment) => comment.body.as_deref(),
        }
    }

    /// Api url of the issue or pull request the comment belongs to.
    pub fn owner_url(&self) -> &str {
        match self {
            Self::Issue(comment) => &comment.issue_url,
            Self::Review(comment) => &comment.pull_request_url,
        }
    }

    pub fn is_bot(&self) -> bool {
        self.user().is_some_and(GithubUser::is_bot)
    }
}

impl From<GithubIssueComment> for RawComment {
    fn from(comment: GithubIssueComment) -> Self {
        Self::Issue(comment)
    }
}

impl From<GithubReviewComment> for RawComment {
    fn from(comment: GithubReviewComment) -> Self {
        Self::Review(comment)
    }
}
